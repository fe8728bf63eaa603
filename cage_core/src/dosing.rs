//! Per-touch dispensing decision.
use std::time::{Duration, Instant};

use cage_traits::Dispenser;

use crate::config::DosingCfg;
use crate::error::Result;
use crate::hw_error::hw;
use crate::record::AnimalRecord;
use crate::recorder::{EventKind, Recorder};
use crate::touch::TouchEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropKind {
    Water,
    Drug,
}

impl DropKind {
    pub fn event(self) -> EventKind {
        match self {
            DropKind::Water => EventKind::WaterDrop,
            DropKind::Drug => EventKind::DrugDrop,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchOutcome {
    /// No animal in the cage; nothing logged.
    NoAnimal,
    /// Inside the minimum interval since the last drop; touch logged only.
    Debounced,
    Dispensed(DropKind),
}

/// Drug iff the animal is on treatment, still owes drug drops today and the
/// day's drop total is a multiple of `frequency`.
pub fn choose_drop(record: &AnimalRecord, frequency: u32) -> DropKind {
    let owed = record.on_treatment() && record.drug_drops_today < record.required_drug_drops_today;
    if owed && record.drops_today() % frequency.max(1) == 0 {
        DropKind::Drug
    } else {
        DropKind::Water
    }
}

#[derive(Debug, Clone)]
pub struct DoseController {
    min_interval: Duration,
    drug_drop_frequency: u32,
    last_drop: Option<Instant>,
}

impl DoseController {
    pub fn new(cfg: &DosingCfg) -> Self {
        Self {
            min_interval: cfg.min_interval,
            drug_drop_frequency: cfg.drug_drop_frequency,
            last_drop: None,
        }
    }

    pub fn last_drop(&self) -> Option<Instant> {
        self.last_drop
    }

    fn debounced(&self, at: Instant) -> bool {
        self.last_drop
            .is_some_and(|last| at.saturating_duration_since(last) < self.min_interval)
    }

    /// Handle one touch for the animal in the cage.
    ///
    /// The touch is always logged. A dispense failure leaves the counters
    /// untouched but keeps the debounce stamp. Log write errors are returned
    /// after the counters have been updated.
    pub fn on_touch(
        &mut self,
        ev: &TouchEvent,
        animal: Option<&mut AnimalRecord>,
        water: &mut dyn Dispenser,
        drug: &mut dyn Dispenser,
        recorder: &mut dyn Recorder,
    ) -> Result<TouchOutcome> {
        let Some(animal) = animal else {
            return Ok(TouchOutcome::NoAnimal);
        };

        let touch_logged = recorder.record_event(&animal.name, ev.wall, EventKind::Touch);

        if self.debounced(ev.at) {
            tracing::trace!(animal = %animal.name, "touch inside drop interval");
            touch_logged?;
            return Ok(TouchOutcome::Debounced);
        }
        self.last_drop = Some(ev.at);

        let kind = choose_drop(animal, self.drug_drop_frequency);
        match kind {
            DropKind::Drug => hw(drug.dispense())?,
            DropKind::Water => hw(water.dispense())?,
        }
        match kind {
            DropKind::Drug => animal.drug_drops_today += 1,
            DropKind::Water => animal.water_drops_today += 1,
        }
        tracing::debug!(
            animal = %animal.name,
            kind = ?kind,
            water = animal.water_drops_today,
            drug = animal.drug_drops_today,
            "drop dispensed"
        );

        let drop_logged = recorder.record_event(&animal.name, ev.wall, kind.event());
        touch_logged?;
        drop_logged?;
        Ok(TouchOutcome::Dispensed(kind))
    }
}
