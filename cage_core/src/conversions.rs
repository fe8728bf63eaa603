//! `From` implementations bridging `cage_config` types to `cage_core` types.

use std::time::Duration;

use crate::config::{CageConfig, DosingCfg, SessionCfg, WeighingCfg};
use crate::util::period_ms;
use crate::weight::WeightBounds;

impl From<&cage_config::Config> for SessionCfg {
    fn from(c: &cage_config::Config) -> Self {
        Self {
            grace_period: Duration::from_millis(c.session.grace_period_ms),
            poll: Duration::from_millis(c.session.poll_ms),
            unknown_reboot_threshold: c.rfid.unknown_reboot_threshold,
        }
    }
}

impl From<&cage_config::DosingCfg> for DosingCfg {
    fn from(c: &cage_config::DosingCfg) -> Self {
        Self {
            min_interval: Duration::from_millis(c.water_timeout_ms),
            drug_drops_per_gram: c.drug_drops_per_gram,
            drug_drop_frequency: c.drug_drop_frequency,
        }
    }
}

impl From<&cage_config::WeighingCfg> for WeighingCfg {
    fn from(c: &cage_config::WeighingCfg) -> Self {
        Self {
            period: Duration::from_millis(period_ms(c.frequency_hz)),
            bounds: WeightBounds {
                lower_g: c.lower_g,
                upper_g: c.upper_g,
            },
            retare_attempts: c.retare_attempts,
            retare_variability_g: c.retare_variability_g,
            sensor_timeout: Duration::from_millis(c.sensor_read_timeout_ms),
        }
    }
}

impl From<&cage_config::Config> for CageConfig {
    fn from(c: &cage_config::Config) -> Self {
        Self {
            session: c.into(),
            dosing: (&c.dosing).into(),
            weighing: (&c.weighing).into(),
        }
    }
}
