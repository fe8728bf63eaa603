#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use cage_core::mocks::{MemoryRecorder, MemoryStore};
use cage_core::{AnimalRecord, Cage, CageConfig, Treatment};
use cage_hardware::{
    SimulatedDispenser, SimulatedPresence, SimulatedScale, SimulatedTagReader, SimulatedTouch,
};
use cage_traits::{Clock, ManualClock, TagId};
use chrono::{NaiveDate, NaiveDateTime};

pub const M1: TagId = TagId(2018121243);
pub const M2: TagId = TagId(2018121244);
pub const STRANGER: TagId = TagId(99);

pub fn wall(day: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, day)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}

pub fn mouse(tag: TagId, name: &str, required: u32) -> AnimalRecord {
    let mut r = AnimalRecord::new(tag, name, Treatment::Drug, 14);
    r.day_index = 3;
    r.required_drug_drops_today = required;
    r.reference_weight_g = 25.0;
    r
}

pub fn test_config() -> CageConfig {
    let mut cfg = CageConfig::default();
    cfg.session.unknown_reboot_threshold = 3;
    cfg.weighing.retare_attempts = 5;
    cfg
}

/// Cage on simulated devices plus a handle to each of them.
pub struct Rig {
    pub clock: ManualClock,
    pub presence: SimulatedPresence,
    pub reader: SimulatedTagReader,
    pub scale: SimulatedScale,
    pub touch: SimulatedTouch,
    pub water: SimulatedDispenser,
    pub drug: SimulatedDispenser,
    pub store: MemoryStore,
    pub rec: MemoryRecorder,
    pub cage: Cage,
}

impl Rig {
    pub fn new() -> Self {
        Self::with(wall(14, 9, 0, 0), test_config())
    }

    pub fn with(start: NaiveDateTime, cfg: CageConfig) -> Self {
        let clock = ManualClock::starting_at(start);
        let presence = SimulatedPresence::new();
        let reader = SimulatedTagReader::new();
        let scale = SimulatedScale::new();
        let touch = SimulatedTouch::new();
        let water = SimulatedDispenser::new();
        let drug = SimulatedDispenser::new();
        let store = MemoryStore::with_rows([mouse(M1, "M1", 3), mouse(M2, "M2", 3)]);
        let rec = MemoryRecorder::default();
        let cage = Cage::builder()
            .with_presence(presence.clone())
            .with_reader(reader.clone())
            .with_scale(scale.clone())
            .with_touch(touch.clone())
            .with_water(water.clone())
            .with_drug(drug.clone())
            .with_store(store.clone())
            .with_recorder(rec.clone())
            .with_clock(Arc::new(clock.clone()))
            .with_config(cfg)
            .build()
            .unwrap();
        Self {
            clock,
            presence,
            reader,
            scale,
            touch,
            water,
            drug,
            store,
            rec,
            cage,
        }
    }

    pub fn advance_ms(&self, ms: u64) {
        self.clock.advance(Duration::from_millis(ms));
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.wall_now()
    }

    pub fn tick(&mut self) {
        self.cage.tick().unwrap();
    }

    /// Tag comes into range and is identified on the next tick.
    pub fn enter(&mut self, tag: TagId) {
        self.presence.set(true);
        self.reader.set(Some(tag));
        self.tick();
    }

    /// Presence drops; the next tick starts the grace period.
    pub fn lose_presence(&mut self) {
        self.presence.set(false);
        self.tick();
    }

    /// Touch the spout and let the poll loop handle it.
    pub fn lick(&mut self) -> bool {
        let seen = self.touch.touch();
        self.tick();
        seen
    }
}
