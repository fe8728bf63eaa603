//! Scale re-zeroing while the cage is empty.
use chrono::NaiveDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroOutcome {
    /// Readings were steady and the scale was tared.
    Tared,
    /// Readings were steady but the calendar day has changed since start-up.
    RebootRequested,
    /// Spread too wide; nothing done.
    Unstable,
}

/// One zeroing attempt as written to the tare log.
#[derive(Debug, Clone, PartialEq)]
pub struct ZeroReport {
    pub at: NaiveDateTime,
    pub samples: Vec<f32>,
    pub mean_g: f32,
    pub outcome: ZeroOutcome,
}

/// Steady when every sample lies within `variability_g` of the mean.
/// Returns the mean alongside; an empty set is never steady.
pub fn is_stable(samples: &[f32], variability_g: f32) -> (bool, f32) {
    if samples.is_empty() {
        return (false, 0.0);
    }
    let mean = samples.iter().map(|&s| f64::from(s)).sum::<f64>() / samples.len() as f64;
    let mean = mean as f32;
    let steady = samples
        .iter()
        .all(|&s| s.is_finite() && (s - mean).abs() <= variability_g);
    (steady, mean)
}
