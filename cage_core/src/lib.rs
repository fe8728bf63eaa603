#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Home-cage controller logic (hardware-agnostic).
//!
//! Devices are reached only through the `cage_traits` contracts, so the whole
//! controller runs against simulated devices and a manual clock in tests.
//!
//! ## Architecture
//!
//! - **Presence** (`presence`): the `Cage` state machine and its builder
//! - **Dosing** (`dosing`): per-touch water/drug decision with a minimum drop interval
//! - **Weight** (`weight`): daily reference weight as the mode of 0.1 g bins
//! - **Rollover** (`rollover`): end-of-day summary and counter reset
//! - **Registry** (`registry`): tab-separated animal table, one row per tag
//! - **Recorder** (`recorder`): per-animal event, summary and weight logs
//! - **Runner** (`runner`): the poll loop

pub mod config;
pub mod conversions;
pub mod dosing;
pub mod error;
pub mod hw_error;
pub mod mocks;
pub mod presence;
pub mod record;
pub mod recorder;
pub mod registry;
pub mod rollover;
pub mod runner;
pub mod session;
pub mod touch;
pub mod util;
pub mod weight;
pub mod zeroing;

pub use config::{CageConfig, DosingCfg, SessionCfg, WeighingCfg};
pub use dosing::{DoseController, DropKind, TouchOutcome, choose_drop};
pub use error::{BuildError, CageError, Result};
pub use presence::{Cage, CageBuilder};
pub use record::{AnimalRecord, Treatment};
pub use recorder::{DailySummary, EventKind, FileRecorder, Recorder, WeightSample};
pub use registry::{AnimalRegistry, AnimalStore};
pub use rollover::{DayClose, RolloverOutcome, rollover};
pub use runner::{RunOutcome, RunReport, run};
pub use session::{PresenceState, SessionState};
pub use touch::{TouchEvent, TouchQueue};
pub use weight::{DailyWeight, WeightBounds, aggregate};
pub use zeroing::{ZeroOutcome, ZeroReport};
