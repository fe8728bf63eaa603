#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and scale calibration parsing for the home cage.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//! - Every section except `[pins]` has working defaults.
//! - Calibration CSV loader enforces headers and fits grams-per-count.
use serde::Deserialize;
use std::path::PathBuf;

pub mod calibration;

pub use calibration::{Calibration, CalibrationRow, load_calibration_csv};

/// BCM pin numbers.
#[derive(Debug, Deserialize, Clone)]
pub struct Pins {
    /// RFID tag-in-range output
    pub presence: u8,
    pub scale_dat: u8,
    pub scale_clk: u8,
    /// Touch controller IRQ (active low)
    pub touch_irq: u8,
    pub solenoid: u8,
    pub motor_step: u8,
    pub motor_dir: u8,
    pub motor_ms1: u8,
    pub motor_ms2: u8,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RfidCfg {
    pub port: String,
    pub baud: u32,
    pub read_timeout_ms: u64,
    pub verify_checksum: bool,
    /// Unknown-tag reads before the cage asks for a reboot
    pub unknown_reboot_threshold: u32,
}

impl Default for RfidCfg {
    fn default() -> Self {
        Self {
            port: "/dev/serial0".to_string(),
            baud: 9600,
            read_timeout_ms: 100,
            verify_checksum: false,
            unknown_reboot_threshold: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SessionCfg {
    /// How long a lost tag may be absent before the animal counts as gone
    pub grace_period_ms: u64,
    /// Poll loop tick
    pub poll_ms: u64,
}

impl Default for SessionCfg {
    fn default() -> Self {
        Self {
            grace_period_ms: 30_000,
            poll_ms: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DosingCfg {
    /// Minimum time between two drops (touch debounce)
    pub water_timeout_ms: u64,
    pub drug_drops_per_gram: f32,
    /// Every Nth drop may be a drug drop
    pub drug_drop_frequency: u32,
    pub solenoid_open_ms: u64,
    pub syringe_steps: u32,
}

impl Default for DosingCfg {
    fn default() -> Self {
        Self {
            water_timeout_ms: 10_000,
            drug_drops_per_gram: 2.0,
            drug_drop_frequency: 1,
            solenoid_open_ms: 100,
            syringe_steps: 57,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WeighingCfg {
    pub frequency_hz: u32,
    /// Plausible body-weight window; samples outside are sensor artifacts
    pub lower_g: f32,
    pub upper_g: f32,
    pub retare_attempts: u32,
    pub retare_variability_g: f32,
    pub sensor_read_timeout_ms: u64,
}

impl Default for WeighingCfg {
    fn default() -> Self {
        Self {
            frequency_hz: 5,
            lower_g: 20.0,
            upper_g: 60.0,
            retare_attempts: 20,
            retare_variability_g: 0.1,
            sensor_read_timeout_ms: 150,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Paths {
    /// Tab-separated animal table
    pub registry: PathBuf,
    /// Root of the per-animal event, summary and weight logs
    pub data_dir: PathBuf,
    pub tare_log: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            registry: PathBuf::from("mice.cfg"),
            data_dir: PathBuf::from("data"),
            tare_log: PathBuf::from("tare_weights.txt"),
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct RebootCfg {
    /// argv run after an orderly shutdown that asked for a restart; empty = just exit
    pub command: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct PersistedCalibration {
    /// grams per count
    pub gain_g_per_count: f32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub pins: Pins,
    #[serde(default)]
    pub rfid: RfidCfg,
    #[serde(default)]
    pub session: SessionCfg,
    #[serde(default)]
    pub dosing: DosingCfg,
    #[serde(default)]
    pub weighing: WeighingCfg,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub reboot: RebootCfg,
    /// Optional persisted calibration; preferred at runtime over CSV when present.
    #[serde(default)]
    pub calibration: Option<PersistedCalibration>,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // RFID
        if self.rfid.baud == 0 {
            eyre::bail!("rfid.baud must be > 0");
        }
        if self.rfid.unknown_reboot_threshold == 0 {
            eyre::bail!("rfid.unknown_reboot_threshold must be >= 1");
        }

        // Session
        if self.session.poll_ms == 0 {
            eyre::bail!("session.poll_ms must be >= 1");
        }
        if self.session.grace_period_ms == 0 {
            eyre::bail!("session.grace_period_ms must be >= 1");
        }
        if self.session.grace_period_ms > 60 * 60 * 1000 {
            eyre::bail!("session.grace_period_ms is unreasonably large (>1h)");
        }

        // Dosing
        if self.dosing.drug_drop_frequency == 0 {
            eyre::bail!("dosing.drug_drop_frequency must be >= 1");
        }
        if !(self.dosing.drug_drops_per_gram.is_finite() && self.dosing.drug_drops_per_gram > 0.0)
        {
            eyre::bail!("dosing.drug_drops_per_gram must be > 0");
        }
        if self.dosing.solenoid_open_ms == 0 {
            eyre::bail!("dosing.solenoid_open_ms must be >= 1");
        }
        if self.dosing.syringe_steps == 0 {
            eyre::bail!("dosing.syringe_steps must be >= 1");
        }

        // Weighing
        if self.weighing.frequency_hz == 0 {
            eyre::bail!("weighing.frequency_hz must be > 0");
        }
        if !(self.weighing.lower_g.is_finite() && self.weighing.upper_g.is_finite())
            || self.weighing.lower_g >= self.weighing.upper_g
        {
            eyre::bail!("weighing.lower_g must be < weighing.upper_g");
        }
        if self.weighing.retare_attempts == 0 {
            eyre::bail!("weighing.retare_attempts must be >= 1");
        }
        let v = self.weighing.retare_variability_g;
        if !(v.is_finite() && v >= 0.0) {
            eyre::bail!("weighing.retare_variability_g must be finite and >= 0");
        }
        if self.weighing.sensor_read_timeout_ms == 0 {
            eyre::bail!("weighing.sensor_read_timeout_ms must be >= 1");
        }

        // Blocking weigh calls must fit inside one debounce window
        let weigh_period_ms = 1000 / u64::from(self.weighing.frequency_hz);
        if self.dosing.water_timeout_ms < weigh_period_ms {
            eyre::bail!(
                "dosing.water_timeout_ms ({}) must be >= the weighing period ({weigh_period_ms} ms)",
                self.dosing.water_timeout_ms
            );
        }

        if let Some(cal) = self.calibration
            && !(cal.gain_g_per_count.is_finite() && cal.gain_g_per_count != 0.0)
        {
            eyre::bail!("calibration.gain_g_per_count must be finite and non-zero");
        }

        Ok(())
    }
}
