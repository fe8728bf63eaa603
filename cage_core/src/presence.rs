//! The cage: presence state machine, weighing and dispensing, driven by a
//! non-blocking `tick()`.
//!
//! ```text
//! Idle -> Identifying -> Active <-> GracePeriod -> Idle | Identifying
//!              \-> Unrecognized -> Idle
//! ```
//!
//! Touches reach the cage through a `TouchQueue`; the spout subscription is
//! only held while an animal is `Active`, and everything the touches change
//! is mutated here, on the poll loop.
use std::sync::Arc;
use std::time::{Duration, Instant};

use cage_traits::{
    Clock, Dispenser, MonotonicClock, PresenceSensor, Scale, TagId, TagReader, TouchSensor,
};
use chrono::{Datelike, NaiveDateTime};

use crate::config::CageConfig;
use crate::dosing::DoseController;
use crate::error::{BuildError, CageError, Result};
use crate::hw_error::hw;
use crate::record::AnimalRecord;
use crate::recorder::{DailySummary, EventKind, Recorder, WeightSample};
use crate::registry::AnimalStore;
use crate::rollover::rollover;
use crate::session::{PresenceState, SessionState};
use crate::touch::TouchQueue;
use crate::zeroing::{ZeroOutcome, ZeroReport, is_stable};

/// Touches buffered between two polls.
pub const TOUCH_QUEUE_CAPACITY: usize = 64;
/// Spacing of retries for deferred registry saves and summary rows.
pub const SAVE_RETRY_INTERVAL: Duration = Duration::from_secs(1);

pub struct Cage {
    presence: Box<dyn PresenceSensor>,
    reader: Box<dyn TagReader>,
    scale: Box<dyn Scale>,
    touch: Box<dyn TouchSensor>,
    water: Box<dyn Dispenser>,
    drug: Box<dyn Dispenser>,
    store: Box<dyn AnimalStore>,
    recorder: Box<dyn Recorder>,
    clock: Arc<dyn Clock + Send + Sync>,
    cfg: CageConfig,
    session: SessionState,
    dosing: DoseController,
    touches: TouchQueue,
    touch_subscribed: bool,
    pending_saves: Vec<AnimalRecord>,
    pending_summaries: Vec<(String, DailySummary)>,
    reference_day: u32,
    next_weigh_at: Option<Instant>,
    next_save_retry_at: Option<Instant>,
}

impl core::fmt::Debug for Cage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Cage")
            .field("state", &self.session.state)
            .field("animal", &self.session.active_animal.as_ref().map(|a| &a.name))
            .field("unknown_tags", &self.session.unknown_tag_count)
            .field("pending_saves", &self.pending_saves.len())
            .field("pending_summaries", &self.pending_summaries.len())
            .field("reboot_requested", &self.session.reboot_requested)
            .finish()
    }
}

fn log_failure(what: &str, r: Result<()>) {
    if let Err(e) = r {
        tracing::error!(error = %e, "{what} failed");
    }
}

impl Cage {
    pub fn builder() -> CageBuilder {
        CageBuilder::default()
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn state(&self) -> &PresenceState {
        &self.session.state
    }

    pub fn active_animal(&self) -> Option<&AnimalRecord> {
        self.session.active_animal.as_ref()
    }

    pub fn reboot_requested(&self) -> bool {
        self.session.reboot_requested
    }

    pub fn unknown_tag_count(&self) -> u32 {
        self.session.unknown_tag_count
    }

    /// Records whose registry save failed and will be retried.
    pub fn pending_saves(&self) -> &[AnimalRecord] {
        &self.pending_saves
    }

    /// Summary rows (animal, row) not yet written, oldest first.
    pub fn pending_summaries(&self) -> &[(String, DailySummary)] {
        &self.pending_summaries
    }

    pub fn config(&self) -> &CageConfig {
        &self.cfg
    }

    /// Day of month the process started on; a steady empty cage on any other
    /// day requests a reboot.
    pub fn reference_day(&self) -> u32 {
        self.reference_day
    }

    pub fn clock(&self) -> &Arc<dyn Clock + Send + Sync> {
        &self.clock
    }

    /// One poll of the state machine. Never blocks except for zeroing the
    /// scale after an animal leaves.
    pub fn tick(&mut self) -> Result<()> {
        match self.session.state.clone() {
            PresenceState::Idle => self.tick_idle(),
            PresenceState::Identifying(tag) => self.identify(Some(tag)),
            PresenceState::Unrecognized => {
                if !hw(self.presence.is_present())? {
                    tracing::info!("unrecognized tag out of range");
                    self.session.state = PresenceState::Idle;
                }
                Ok(())
            }
            PresenceState::Active => self.tick_active(),
            PresenceState::GracePeriod { since, last_seen } => self.tick_grace(since, last_seen),
        }
    }

    fn tick_idle(&mut self) -> Result<()> {
        let now = self.clock.now();
        let pending = !self.pending_saves.is_empty() || !self.pending_summaries.is_empty();
        if pending && self.next_save_retry_at.is_none_or(|t| now >= t) {
            self.next_save_retry_at = Some(now + SAVE_RETRY_INTERVAL);
            self.retry_pending();
        }
        if !hw(self.presence.is_present())? {
            return Ok(());
        }
        let tag = hw(self.reader.read_tag())?;
        self.identify(tag)
    }

    fn identify(&mut self, tag: Option<TagId>) -> Result<()> {
        let Some(tag) = tag else {
            self.unknown_tag(None);
            return Ok(());
        };
        self.session.state = PresenceState::Identifying(tag);

        let record = match self.pending_saves.iter().position(|r| r.tag == tag) {
            Some(i) => {
                tracing::debug!(%tag, "using unsaved record");
                self.pending_saves.remove(i)
            }
            None => match self.store.load(tag) {
                Ok(r) => r,
                Err(CageError::UnknownTag(_)) => {
                    self.unknown_tag(Some(tag));
                    return Ok(());
                }
                Err(e) => {
                    self.session.state = PresenceState::Unrecognized;
                    return Err(e);
                }
            },
        };
        self.admit(record)
    }

    fn unknown_tag(&mut self, tag: Option<TagId>) {
        let s = &mut self.session;
        s.unknown_tag_count = s.unknown_tag_count.saturating_add(1);
        s.state = PresenceState::Unrecognized;
        tracing::warn!(
            tag = ?tag.map(|t| t.0),
            count = s.unknown_tag_count,
            "unknown tag, waiting for it to leave"
        );
        if s.unknown_tag_count >= self.cfg.session.unknown_reboot_threshold && !s.reboot_requested
        {
            s.reboot_requested = true;
            tracing::warn!(count = s.unknown_tag_count, "too many unknown tags, reboot requested");
        }
    }

    fn admit(&mut self, mut record: AnimalRecord) -> Result<()> {
        let today = self.clock.wall_now().day();
        let closed = rollover(
            &mut record,
            today,
            self.cfg.dosing.drug_drops_per_gram,
            self.cfg.weighing.bounds,
            &*self.recorder,
        );
        if let Some(summary) = closed.summary {
            self.pending_summaries.push((record.name.clone(), summary));
            self.flush_summaries();
        }

        let at = self.clock.wall_now();
        log_failure(
            "event log",
            self.recorder.record_event(&record.name, at, EventKind::Entered),
        );
        tracing::info!(
            animal = %record.name,
            tag = %record.tag,
            day = record.day_index,
            water = record.water_drops_today,
            drug = record.drug_drops_today,
            required = record.required_drug_drops_today,
            "animal entered"
        );

        self.session.active_animal = Some(record);
        self.session.state = PresenceState::Active;
        self.next_weigh_at = None;
        self.touches.clear();
        self.subscribe_touch()
    }

    fn tick_active(&mut self) -> Result<()> {
        if !hw(self.presence.is_present())? {
            let since = self.clock.now();
            let last_seen = self.clock.wall_now();
            if let Err(e) = self.unsubscribe_touch() {
                tracing::warn!(error = %e, "touch unsubscribe failed");
            }
            self.session.state = PresenceState::GracePeriod { since, last_seen };
            tracing::info!(
                animal = ?self.session.active_animal.as_ref().map(|a| &a.name),
                "presence lost, grace period started"
            );
            return self.process_touches(Some(since));
        }

        if !self.touch_subscribed
            && let Err(e) = self.subscribe_touch()
        {
            tracing::warn!(error = %e, "touch subscribe retry failed");
        }
        let touches = self.process_touches(None);
        self.weigh_if_due()?;
        touches
    }

    fn tick_grace(&mut self, since: Instant, last_seen: NaiveDateTime) -> Result<()> {
        let present = hw(self.presence.is_present())?;
        let expired = self.clock.now().saturating_duration_since(since) >= self.cfg.session.grace_period;
        if !present && !expired {
            return Ok(());
        }

        let tag = hw(self.reader.read_tag())?;
        if tag.is_some() && tag == self.session.active_tag() {
            tracing::info!(
                animal = ?self.session.active_animal.as_ref().map(|a| &a.name),
                "returned within grace period"
            );
            self.session.state = PresenceState::Active;
            self.next_weigh_at = None;
            self.touches.clear();
            return self.subscribe_touch();
        }

        self.exit_active(last_seen);
        match tag {
            Some(tag) => {
                tracing::info!(%tag, "new tag during grace period");
                self.identify(Some(tag))
            }
            None => {
                self.session.state = PresenceState::Idle;
                self.zero_scale().map(|_| ())
            }
        }
    }

    /// Processes queued touches; with a cutoff, touches stamped after it are
    /// discarded. All touches are handled even if some fail; the first error
    /// is returned.
    fn process_touches(&mut self, cutoff: Option<Instant>) -> Result<()> {
        let mut first_err = None;
        let mut discarded = 0usize;
        for ev in self.touches.drain() {
            if cutoff.is_some_and(|c| ev.at > c) {
                discarded += 1;
                continue;
            }
            let out = self.dosing.on_touch(
                &ev,
                self.session.active_animal.as_mut(),
                self.water.as_mut(),
                self.drug.as_mut(),
                self.recorder.as_mut(),
            );
            if let Err(e) = out {
                tracing::error!(error = %e, "touch handling failed");
                first_err.get_or_insert(e);
            }
        }
        if discarded > 0 {
            tracing::debug!(discarded, "touches after presence loss dropped");
        }
        first_err.map_or(Ok(()), Err)
    }

    fn weigh_if_due(&mut self) -> Result<()> {
        let now = self.clock.now();
        if self.next_weigh_at.is_some_and(|t| now < t) {
            return Ok(());
        }
        self.next_weigh_at = Some(now + self.cfg.weighing.period);
        let Some(animal) = self.session.active_animal.as_ref() else {
            return Ok(());
        };
        match hw(self.scale.weigh_once(self.cfg.weighing.sensor_timeout)) {
            Ok(grams) => {
                let sample = WeightSample {
                    at: self.clock.wall_now(),
                    grams,
                };
                self.recorder
                    .append_weight(&animal.name, animal.day_index, sample)
            }
            Err(e) => {
                tracing::warn!(error = %e, animal = %animal.name, "weight sample skipped");
                Ok(())
            }
        }
    }

    fn subscribe_touch(&mut self) -> Result<()> {
        let cb = self.touches.callback(Arc::clone(&self.clock));
        let r = hw(self.touch.subscribe(cb));
        self.touch_subscribed = r.is_ok();
        r
    }

    fn unsubscribe_touch(&mut self) -> Result<()> {
        if !self.touch_subscribed {
            return Ok(());
        }
        self.touch_subscribed = false;
        hw(self.touch.unsubscribe())
    }

    /// Persists the outgoing animal and logs its exit at `exited_at`.
    fn exit_active(&mut self, exited_at: NaiveDateTime) {
        let Some(record) = self.session.active_animal.take() else {
            return;
        };
        self.touches.clear();
        log_failure(
            "event log",
            self.recorder.record_event(&record.name, exited_at, EventKind::Exited),
        );
        tracing::info!(
            animal = %record.name,
            water = record.water_drops_today,
            drug = record.drug_drops_today,
            "animal exited"
        );
        self.persist(record);
    }

    fn persist(&mut self, record: AnimalRecord) {
        if let Err(e) = self.store.save(&record) {
            tracing::error!(error = %e, animal = %record.name, "registry save failed, will retry");
            self.pending_saves.retain(|p| p.tag != record.tag);
            self.pending_saves.push(record);
            self.next_save_retry_at = Some(self.clock.now() + SAVE_RETRY_INTERVAL);
        }
    }

    /// Writes queued summary rows oldest first, stopping at the first failure
    /// so each animal's rows stay in day order.
    fn flush_summaries(&mut self) {
        while let Some((animal, summary)) = self.pending_summaries.first() {
            if let Err(e) = self.recorder.record_summary(animal, summary) {
                tracing::error!(
                    error = %e,
                    animal = %animal,
                    day = summary.day_index,
                    "summary row not written, will retry"
                );
                if self.next_save_retry_at.is_none() {
                    self.next_save_retry_at = Some(self.clock.now() + SAVE_RETRY_INTERVAL);
                }
                return;
            }
            self.pending_summaries.remove(0);
        }
    }

    fn retry_pending(&mut self) {
        self.retry_pending_saves();
        self.flush_summaries();
    }

    fn retry_pending_saves(&mut self) {
        for record in std::mem::take(&mut self.pending_saves) {
            match self.store.save(&record) {
                Ok(()) => tracing::info!(animal = %record.name, "deferred registry save written"),
                Err(e) => {
                    tracing::debug!(error = %e, animal = %record.name, "registry still unavailable");
                    self.pending_saves.push(record);
                }
            }
        }
    }

    /// Samples the empty cage; tares when steady, or requests a reboot when
    /// steady on a later day than the process started.
    pub fn zero_scale(&mut self) -> Result<ZeroOutcome> {
        let w = &self.cfg.weighing;
        let attempts = w.retare_attempts.max(1) as usize;
        let at = self.clock.wall_now();
        let mut samples = Vec::with_capacity(attempts);
        for i in 0..attempts {
            if i > 0 {
                self.clock.sleep(w.period);
            }
            match hw(self.scale.weigh_once(w.sensor_timeout)) {
                Ok(g) => samples.push(g),
                Err(e) => tracing::warn!(error = %e, "zeroing sample failed"),
            }
        }
        let (steady, mean_g) = is_stable(&samples, w.retare_variability_g);
        let steady = steady && samples.len() == attempts;

        let mut tare_err = None;
        let outcome = if !steady {
            tracing::info!(mean_g, "scale not zeroed, readings unsteady");
            ZeroOutcome::Unstable
        } else if self.clock.wall_now().day() == self.reference_day {
            match hw(self.scale.tare()) {
                Ok(()) => {
                    tracing::info!(mean_g, "scale zeroed");
                    ZeroOutcome::Tared
                }
                Err(e) => {
                    tare_err = Some(e);
                    ZeroOutcome::Unstable
                }
            }
        } else {
            self.session.reboot_requested = true;
            tracing::warn!("new day with an empty, steady cage; reboot requested");
            ZeroOutcome::RebootRequested
        };

        log_failure(
            "tare log",
            self.recorder.record_tare(&ZeroReport {
                at,
                samples,
                mean_g,
                outcome,
            }),
        );
        match tare_err {
            Some(e) => Err(e),
            None => Ok(outcome),
        }
    }

    /// Orderly stop: handles queued touches, saves and logs out the animal in
    /// the cage, and flushes deferred saves and summary rows. Errors if any of
    /// them is still pending.
    pub fn shutdown(&mut self) -> Result<()> {
        if let Err(e) = self.unsubscribe_touch() {
            tracing::warn!(error = %e, "touch unsubscribe failed");
        }
        let exited_at = match self.session.state {
            PresenceState::Active => {
                log_failure("touch handling", self.process_touches(None));
                self.clock.wall_now()
            }
            PresenceState::GracePeriod { last_seen, .. } => last_seen,
            _ => self.clock.wall_now(),
        };
        self.exit_active(exited_at);
        self.session.state = PresenceState::Idle;

        self.retry_pending();
        let (saves, rows) = (self.pending_saves.len(), self.pending_summaries.len());
        if saves + rows == 0 {
            return Ok(());
        }
        Err(CageError::State(format!(
            "{saves} registry update(s) and {rows} summary row(s) could not be saved"
        )))
    }
}

#[derive(Default)]
pub struct CageBuilder {
    presence: Option<Box<dyn PresenceSensor>>,
    reader: Option<Box<dyn TagReader>>,
    scale: Option<Box<dyn Scale>>,
    touch: Option<Box<dyn TouchSensor>>,
    water: Option<Box<dyn Dispenser>>,
    drug: Option<Box<dyn Dispenser>>,
    store: Option<Box<dyn AnimalStore>>,
    recorder: Option<Box<dyn Recorder>>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    config: CageConfig,
}

impl CageBuilder {
    pub fn with_presence(mut self, p: impl PresenceSensor + 'static) -> Self {
        self.presence = Some(Box::new(p));
        self
    }

    pub fn with_reader(mut self, r: impl TagReader + 'static) -> Self {
        self.reader = Some(Box::new(r));
        self
    }

    pub fn with_scale(mut self, s: impl Scale + 'static) -> Self {
        self.scale = Some(Box::new(s));
        self
    }

    pub fn with_touch(mut self, t: impl TouchSensor + 'static) -> Self {
        self.touch = Some(Box::new(t));
        self
    }

    pub fn with_water(mut self, d: impl Dispenser + 'static) -> Self {
        self.water = Some(Box::new(d));
        self
    }

    pub fn with_drug(mut self, d: impl Dispenser + 'static) -> Self {
        self.drug = Some(Box::new(d));
        self
    }

    pub fn with_store(mut self, s: impl AnimalStore + 'static) -> Self {
        self.store = Some(Box::new(s));
        self
    }

    pub fn with_recorder(mut self, r: impl Recorder + 'static) -> Self {
        self.recorder = Some(Box::new(r));
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_config(mut self, cfg: CageConfig) -> Self {
        self.config = cfg;
        self
    }

    pub fn build(self) -> std::result::Result<Cage, BuildError> {
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()));
        let reference_day = clock.wall_now().day();
        Ok(Cage {
            presence: self.presence.ok_or(BuildError::MissingPresence)?,
            reader: self.reader.ok_or(BuildError::MissingReader)?,
            scale: self.scale.ok_or(BuildError::MissingScale)?,
            touch: self.touch.ok_or(BuildError::MissingTouch)?,
            water: self.water.ok_or(BuildError::MissingWater)?,
            drug: self.drug.ok_or(BuildError::MissingDrug)?,
            store: self.store.ok_or(BuildError::MissingRegistry)?,
            recorder: self.recorder.ok_or(BuildError::MissingRecorder)?,
            dosing: DoseController::new(&self.config.dosing),
            cfg: self.config,
            session: SessionState::default(),
            touches: TouchQueue::bounded(TOUCH_QUEUE_CAPACITY),
            touch_subscribed: false,
            pending_saves: Vec::new(),
            pending_summaries: Vec::new(),
            reference_day,
            next_weigh_at: None,
            next_save_retry_at: None,
            clock,
        })
    }
}
