//! Device implementations for the home-cage controller.
//!
//! Simulated devices are always available; Raspberry Pi devices need the
//! `hardware` feature.
pub mod error;
#[cfg(feature = "hardware")]
pub mod hx711;
#[cfg(feature = "hardware")]
pub mod pi;
pub mod rfid;
pub mod sim;
pub mod util;

pub use error::HwError;
pub use sim::{
    SimulatedDispenser, SimulatedPresence, SimulatedScale, SimulatedTagReader, SimulatedTouch,
};
