//! Daily reference weight from a day's raw scale samples.
//!
//! Samples outside the plausible body-weight window are dropped, the rest are
//! quantized to 0.1 g and the most frequent value wins.
use std::collections::BTreeMap;

use crate::error::{CageError, Result};

/// Inclusive plausible range for a single sample, grams.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightBounds {
    pub lower_g: f32,
    pub upper_g: f32,
}

impl Default for WeightBounds {
    fn default() -> Self {
        Self {
            lower_g: 20.0,
            upper_g: 60.0,
        }
    }
}

impl WeightBounds {
    #[inline]
    pub fn contains(&self, g: f32) -> bool {
        g.is_finite() && g >= self.lower_g && g <= self.upper_g
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyWeight {
    pub grams: f32,
    /// Samples that passed the range filter.
    pub samples: usize,
}

/// Round to tenths of a gram, ties away from zero (25.25 -> 253 dg).
#[inline]
pub fn to_decigrams(g: f32) -> i64 {
    (f64::from(g) * 10.0).round() as i64
}

/// Mode of the in-range samples at 0.1 g resolution; ties go to the lighter value.
pub fn aggregate<I>(samples: I, bounds: WeightBounds) -> Result<DailyWeight>
where
    I: IntoIterator<Item = f32>,
{
    let mut bins: BTreeMap<i64, usize> = BTreeMap::new();
    let mut kept = 0usize;
    for g in samples.into_iter().filter(|g| bounds.contains(*g)) {
        *bins.entry(to_decigrams(g)).or_insert(0) += 1;
        kept += 1;
    }

    let mut best: Option<(i64, usize)> = None;
    for (&dg, &n) in &bins {
        if best.is_none_or(|(_, top)| n > top) {
            best = Some((dg, n));
        }
    }

    match best {
        Some((dg, _)) => Ok(DailyWeight {
            grams: dg as f32 / 10.0,
            samples: kept,
        }),
        None => Err(CageError::NoWeightData {
            lower_g: bounds.lower_g,
            upper_g: bounds.upper_g,
        }),
    }
}
