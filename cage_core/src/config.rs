//! Runtime configuration for the cage controller.
//!
//! Separate from the TOML schema in `cage_config`; see `conversions` for the
//! mapping. Durations are resolved here so the controller never does unit math.
use std::time::Duration;

use crate::weight::WeightBounds;

#[derive(Debug, Clone)]
pub struct SessionCfg {
    /// Absence tolerated before the occupant counts as gone.
    pub grace_period: Duration,
    /// Poll loop tick.
    pub poll: Duration,
    /// Unknown-tag identifications before a reboot is requested.
    pub unknown_reboot_threshold: u32,
}

impl Default for SessionCfg {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(30),
            poll: Duration::from_millis(10),
            unknown_reboot_threshold: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DosingCfg {
    /// Minimum spacing between two drops; touches inside it are logged only.
    pub min_interval: Duration,
    pub drug_drops_per_gram: f32,
    /// A drop may be a drug drop only when the day's drop total is a multiple of this.
    pub drug_drop_frequency: u32,
}

impl Default for DosingCfg {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(10),
            drug_drops_per_gram: 2.0,
            drug_drop_frequency: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WeighingCfg {
    pub period: Duration,
    pub bounds: WeightBounds,
    pub retare_attempts: u32,
    pub retare_variability_g: f32,
    pub sensor_timeout: Duration,
}

impl Default for WeighingCfg {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(200),
            bounds: WeightBounds::default(),
            retare_attempts: 20,
            retare_variability_g: 0.1,
            sensor_timeout: Duration::from_millis(150),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CageConfig {
    pub session: SessionCfg,
    pub dosing: DosingCfg,
    pub weighing: WeighingCfg,
}
