//! Daily bookkeeping, run on every successful identification.
use crate::record::AnimalRecord;
use crate::recorder::{DailySummary, Recorder};
use crate::weight::{DailyWeight, WeightBounds, aggregate};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RolloverOutcome {
    /// Already rolled over today.
    SameDay,
    /// Troubleshooting tag; only the day marker moved.
    TestTag,
    Completed(DailyWeight),
    /// No plausible weight yesterday; the drug requirement was carried over.
    NoWeightData,
    /// Yesterday's weight log could not be read; the drug requirement was carried over.
    WeightsUnreadable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayClose {
    pub outcome: RolloverOutcome,
    /// Row for the summary log when a day was closed. Writing it is up to the
    /// caller so a failed write never holds back the new day.
    pub summary: Option<DailySummary>,
}

impl DayClose {
    fn unchanged(outcome: RolloverOutcome) -> Self {
        Self {
            outcome,
            summary: None,
        }
    }
}

/// Closes the previous experiment day for `record` if `today` (day of month)
/// differs from its `last_seen_day`. Calling it again on the same day is a no-op.
///
/// The record always moves to the new day, even when yesterday's weights
/// cannot be read.
pub fn rollover(
    record: &mut AnimalRecord,
    today: u32,
    drug_drops_per_gram: f32,
    bounds: WeightBounds,
    weights: &dyn Recorder,
) -> DayClose {
    if record.last_seen_day == today {
        return DayClose::unchanged(RolloverOutcome::SameDay);
    }
    if record.is_test_tag() {
        record.last_seen_day = today;
        return DayClose::unchanged(RolloverOutcome::TestTag);
    }

    let (weight, outcome) = match weights.read_weights(&record.name, record.day_index) {
        Ok(samples) => match aggregate(samples.iter().map(|s| s.grams), bounds) {
            Ok(w) => (Some(w), RolloverOutcome::Completed(w)),
            Err(e) => {
                tracing::warn!(
                    animal = %record.name,
                    day = record.day_index,
                    samples = samples.len(),
                    error = %e,
                    "no weight data for the day, keeping previous drug requirement"
                );
                (None, RolloverOutcome::NoWeightData)
            }
        },
        Err(e) => {
            tracing::error!(
                animal = %record.name,
                day = record.day_index,
                error = %e,
                "weight log unreadable, keeping previous drug requirement"
            );
            (None, RolloverOutcome::WeightsUnreadable)
        }
    };

    let summary = DailySummary {
        day_index: record.day_index,
        water_drops: record.water_drops_today,
        drug_drops: record.drug_drops_today,
        required_drug_drops: record.required_drug_drops_today,
        weight_g: weight.map(|w| w.grams),
    };

    record.water_drops_today = 0;
    if record.on_treatment() {
        record.drug_drops_today = 0;
        if let Some(w) = weight {
            record.required_drug_drops_today = required_drops(w.grams, drug_drops_per_gram);
        }
    }
    if let Some(w) = weight {
        record.reference_weight_g = w.grams;
    }
    record.day_index += 1;
    record.last_seen_day = today;

    tracing::info!(
        animal = %record.name,
        day = record.day_index,
        weight_g = ?weight.map(|w| w.grams),
        required = record.required_drug_drops_today,
        "day rolled over"
    );
    DayClose {
        outcome,
        summary: Some(summary),
    }
}

/// Drops owed for a body weight, rounded to the nearest whole drop.
#[inline]
pub fn required_drops(weight_g: f32, drops_per_gram: f32) -> u32 {
    let n = (f64::from(weight_g) * f64::from(drops_per_gram)).round();
    if n.is_finite() && n > 0.0 { n as u32 } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MemoryRecorder;
    use crate::record::Treatment;
    use crate::recorder::WeightSample;
    use cage_traits::TagId;
    use chrono::NaiveDateTime;

    fn mouse(treatment: Treatment) -> AnimalRecord {
        let mut r = AnimalRecord::new(TagId(7), "M7", treatment, 14);
        r.day_index = 2;
        r.drug_drops_today = 4;
        r.water_drops_today = 9;
        r.required_drug_drops_today = 40;
        r.reference_weight_g = 24.0;
        r
    }

    fn seed(rec: &MemoryRecorder, day: u32, grams: &[f32]) {
        let samples = grams
            .iter()
            .map(|&g| WeightSample {
                at: NaiveDateTime::default(),
                grams: g,
            })
            .collect();
        rec.preload_weights("M7", day, samples);
    }

    fn close(m: &mut AnimalRecord, today: u32, rec: &MemoryRecorder) -> DayClose {
        rollover(m, today, 2.0, WeightBounds::default(), rec)
    }

    #[test]
    fn same_day_is_untouched() {
        let mut m = mouse(Treatment::Drug);
        let before = m.clone();
        let rec = MemoryRecorder::default();
        let out = close(&mut m, 14, &rec);
        assert_eq!(out.outcome, RolloverOutcome::SameDay);
        assert_eq!(out.summary, None);
        assert_eq!(m, before);
    }

    #[test]
    fn new_day_resets_and_recomputes() {
        let mut m = mouse(Treatment::Drug);
        let rec = MemoryRecorder::default();
        seed(&rec, 2, &[25.0, 25.04, 24.96, 61.0]);

        let out = close(&mut m, 15, &rec);
        assert!(matches!(out.outcome, RolloverOutcome::Completed(w) if w.samples == 3));
        assert_eq!(m.day_index, 3);
        assert_eq!(m.last_seen_day, 15);
        assert_eq!((m.drug_drops_today, m.water_drops_today), (0, 0));
        assert_eq!(m.required_drug_drops_today, 50);
        assert!((m.reference_weight_g - 25.0).abs() < 1e-6);

        let s = out.summary.unwrap();
        assert_eq!((s.day_index, s.water_drops, s.drug_drops), (2, 9, 4));
        assert_eq!(s.required_drug_drops, 40);
        assert_eq!(s.weight_g, Some(25.0));
    }

    #[test]
    fn second_call_same_day_does_not_reset_again() {
        let mut m = mouse(Treatment::Drug);
        let rec = MemoryRecorder::default();
        seed(&rec, 2, &[25.0]);
        assert!(close(&mut m, 15, &rec).summary.is_some());
        m.water_drops_today = 3;
        let again = close(&mut m, 15, &rec);
        assert_eq!(again.outcome, RolloverOutcome::SameDay);
        assert_eq!(again.summary, None);
        assert_eq!(m.water_drops_today, 3);
        assert_eq!(m.day_index, 3);
    }

    #[test]
    fn control_animals_keep_drug_fields() {
        let mut m = mouse(Treatment::Control("WATER".into()));
        let rec = MemoryRecorder::default();
        seed(&rec, 2, &[30.0]);
        close(&mut m, 15, &rec);
        assert_eq!(m.water_drops_today, 0);
        assert_eq!(m.drug_drops_today, 4);
        assert_eq!(m.required_drug_drops_today, 40);
        assert!((m.reference_weight_g - 30.0).abs() < 1e-6);
    }

    #[test]
    fn missing_weights_keep_previous_requirement() {
        let mut m = mouse(Treatment::Drug);
        let rec = MemoryRecorder::default();
        seed(&rec, 2, &[3.0, 90.0]);
        let out = close(&mut m, 15, &rec);
        assert_eq!(out.outcome, RolloverOutcome::NoWeightData);
        assert_eq!(m.required_drug_drops_today, 40);
        assert_eq!(m.drug_drops_today, 0);
        assert!((m.reference_weight_g - 24.0).abs() < 1e-6);
        assert_eq!(m.day_index, 3);
        assert_eq!(out.summary.unwrap().weight_g, None);
    }

    #[test]
    fn unreadable_weights_still_open_the_new_day() {
        let mut m = mouse(Treatment::Drug);
        let rec = MemoryRecorder::default();
        seed(&rec, 2, &[25.0]);
        rec.set_failing(true);

        let out = close(&mut m, 15, &rec);
        assert_eq!(out.outcome, RolloverOutcome::WeightsUnreadable);
        assert_eq!((m.day_index, m.last_seen_day), (3, 15));
        assert_eq!((m.drug_drops_today, m.water_drops_today), (0, 0));
        assert_eq!(m.required_drug_drops_today, 40);
        let s = out.summary.unwrap();
        assert_eq!((s.day_index, s.drug_drops, s.weight_g), (2, 4, None));
    }

    #[test]
    fn test_tags_only_move_the_day() {
        let mut m = mouse(Treatment::Drug);
        m.name = "TEST1".into();
        let rec = MemoryRecorder::default();
        let out = close(&mut m, 15, &rec);
        assert_eq!(out.outcome, RolloverOutcome::TestTag);
        assert_eq!(out.summary, None);
        assert_eq!(m.last_seen_day, 15);
        assert_eq!(m.day_index, 2);
        assert_eq!(m.water_drops_today, 9);
    }

    #[test]
    fn required_drops_round_to_nearest() {
        assert_eq!(required_drops(25.3, 2.0), 51);
        assert_eq!(required_drops(25.2, 2.0), 50);
        assert_eq!(required_drops(0.0, 2.0), 0);
    }
}
