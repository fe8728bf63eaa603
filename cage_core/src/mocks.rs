//! In-memory registry and recorder for tests and dry runs.
//!
//! Both are `Clone`; clones share state so a test can keep a handle after
//! boxing one into the cage.
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use cage_traits::TagId;
use chrono::NaiveDateTime;

use crate::error::{CageError, Result};
use crate::record::AnimalRecord;
use crate::recorder::{DailySummary, EventKind, Recorder, WeightSample};
use crate::registry::AnimalStore;
use crate::zeroing::ZeroReport;

fn lock<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    m.lock()
        .map_err(|_| CageError::State("mock state poisoned".into()))
}

#[derive(Debug, Default)]
struct StoreState {
    rows: BTreeMap<u64, AnimalRecord>,
    saves: usize,
    failing: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    pub fn with_rows(rows: impl IntoIterator<Item = AnimalRecord>) -> Self {
        let store = Self::default();
        if let Ok(mut s) = store.inner.lock() {
            s.rows = rows.into_iter().map(|r| (r.tag.0, r)).collect();
        }
        store
    }

    pub fn get(&self, tag: TagId) -> Option<AnimalRecord> {
        lock(&self.inner).ok()?.rows.get(&tag.0).cloned()
    }

    /// Successful saves so far.
    pub fn saves(&self) -> usize {
        lock(&self.inner).map(|s| s.saves).unwrap_or(0)
    }

    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut s) = lock(&self.inner) {
            s.failing = failing;
        }
    }
}

impl AnimalStore for MemoryStore {
    fn load(&mut self, tag: TagId) -> Result<AnimalRecord> {
        let s = lock(&self.inner)?;
        if s.failing {
            return Err(CageError::Io("store offline".into()));
        }
        s.rows.get(&tag.0).cloned().ok_or(CageError::UnknownTag(tag))
    }

    fn save(&mut self, record: &AnimalRecord) -> Result<()> {
        let mut s = lock(&self.inner)?;
        if s.failing {
            return Err(CageError::Io("store offline".into()));
        }
        s.rows.insert(record.tag.0, record.clone());
        s.saves += 1;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct RecorderState {
    events: Vec<(String, NaiveDateTime, EventKind)>,
    summaries: Vec<(String, DailySummary)>,
    weights: HashMap<(String, u32), Vec<WeightSample>>,
    tares: Vec<ZeroReport>,
    failing: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryRecorder {
    inner: Arc<Mutex<RecorderState>>,
}

impl MemoryRecorder {
    pub fn events(&self) -> Vec<(String, NaiveDateTime, EventKind)> {
        lock(&self.inner).map(|s| s.events.clone()).unwrap_or_default()
    }

    /// Event kinds logged for one animal, in order.
    pub fn kinds(&self, animal: &str) -> Vec<EventKind> {
        self.events()
            .into_iter()
            .filter(|(a, _, _)| a == animal)
            .map(|(_, _, k)| k)
            .collect()
    }

    pub fn summaries(&self) -> Vec<(String, DailySummary)> {
        lock(&self.inner)
            .map(|s| s.summaries.clone())
            .unwrap_or_default()
    }

    pub fn tares(&self) -> Vec<ZeroReport> {
        lock(&self.inner).map(|s| s.tares.clone()).unwrap_or_default()
    }

    /// While set, every read and write fails as if the data disk were gone.
    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut s) = lock(&self.inner) {
            s.failing = failing;
        }
    }

    /// Seeds the weight log of one day.
    pub fn preload_weights(&self, animal: &str, day_index: u32, samples: Vec<WeightSample>) {
        if let Ok(mut s) = lock(&self.inner) {
            s.weights.insert((animal.to_string(), day_index), samples);
        }
    }
}

fn available(m: &Mutex<RecorderState>) -> Result<MutexGuard<'_, RecorderState>> {
    let s = lock(m)?;
    if s.failing {
        return Err(CageError::Io("data directory unavailable".into()));
    }
    Ok(s)
}

impl Recorder for MemoryRecorder {
    fn record_event(&mut self, animal: &str, at: NaiveDateTime, kind: EventKind) -> Result<()> {
        available(&self.inner)?
            .events
            .push((animal.to_string(), at, kind));
        Ok(())
    }

    fn record_summary(&mut self, animal: &str, summary: &DailySummary) -> Result<()> {
        available(&self.inner)?
            .summaries
            .push((animal.to_string(), summary.clone()));
        Ok(())
    }

    fn append_weight(&mut self, animal: &str, day_index: u32, sample: WeightSample) -> Result<()> {
        available(&self.inner)?
            .weights
            .entry((animal.to_string(), day_index))
            .or_default()
            .push(sample);
        Ok(())
    }

    fn read_weights(&self, animal: &str, day_index: u32) -> Result<Vec<WeightSample>> {
        Ok(available(&self.inner)?
            .weights
            .get(&(animal.to_string(), day_index))
            .cloned()
            .unwrap_or_default())
    }

    fn record_tare(&mut self, report: &ZeroReport) -> Result<()> {
        available(&self.inner)?.tares.push(report.clone());
        Ok(())
    }
}
