//! Simulated cage devices.
//!
//! Each device is `Clone` and clones share state, so a test (or the CLI in
//! simulation mode) keeps one clone as a handle and hands the other to the
//! controller.
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cage_traits::{
    DeviceError, Dispenser, PresenceSensor, Scale, TagId, TagReader, TouchCallback, TouchSensor,
};

use crate::error::HwError;

#[derive(Debug, Clone, Default)]
pub struct SimulatedPresence {
    present: Arc<AtomicBool>,
}

impl SimulatedPresence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, present: bool) {
        self.present.store(present, Ordering::Relaxed);
    }
}

impl PresenceSensor for SimulatedPresence {
    fn is_present(&mut self) -> Result<bool, DeviceError> {
        Ok(self.present.load(Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimulatedTagReader {
    tag: Arc<Mutex<Option<TagId>>>,
    reads: Arc<AtomicU32>,
}

impl SimulatedTagReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, tag: Option<TagId>) {
        if let Ok(mut t) = self.tag.lock() {
            *t = tag;
        }
    }

    pub fn reads(&self) -> u32 {
        self.reads.load(Ordering::Relaxed)
    }
}

impl TagReader for SimulatedTagReader {
    fn read_tag(&mut self) -> Result<Option<TagId>, DeviceError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let tag = self
            .tag
            .lock()
            .map_err(|_| HwError::Simulated("tag reader poisoned"))?;
        Ok(*tag)
    }
}

#[derive(Debug, Default)]
struct ScaleState {
    load_g: f32,
    zero_g: f32,
    scripted: VecDeque<f32>,
    tares: u32,
}

/// Load cell with a settable load. Scripted readings (already tare-relative)
/// are served first, then `load - zero`.
#[derive(Debug, Clone, Default)]
pub struct SimulatedScale {
    state: Arc<Mutex<ScaleState>>,
}

impl SimulatedScale {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_load(&self, grams: f32) {
        if let Ok(mut s) = self.state.lock() {
            s.load_g = grams;
        }
    }

    pub fn script(&self, readings: impl IntoIterator<Item = f32>) {
        if let Ok(mut s) = self.state.lock() {
            s.scripted.extend(readings);
        }
    }

    pub fn tares(&self) -> u32 {
        self.state.lock().map(|s| s.tares).unwrap_or(0)
    }
}

impl Scale for SimulatedScale {
    fn weigh_once(&mut self, _timeout: Duration) -> Result<f32, DeviceError> {
        let mut s = self
            .state
            .lock()
            .map_err(|_| HwError::Simulated("scale poisoned"))?;
        let g = match s.scripted.pop_front() {
            Some(g) => g,
            None => s.load_g - s.zero_g,
        };
        tracing::trace!(grams = g, "simulated scale sample");
        Ok(g)
    }

    fn tare(&mut self) -> Result<(), DeviceError> {
        let mut s = self
            .state
            .lock()
            .map_err(|_| HwError::Simulated("scale poisoned"))?;
        s.zero_g = s.load_g;
        s.tares += 1;
        Ok(())
    }
}

/// Spout sensor; `touch()` fires the subscribed callback, if any.
#[derive(Clone, Default)]
pub struct SimulatedTouch {
    callback: Arc<Mutex<Option<TouchCallback>>>,
}

impl SimulatedTouch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether a subscriber saw the touch.
    pub fn touch(&self) -> bool {
        match self.callback.lock() {
            Ok(cb) => match cb.as_ref() {
                Some(f) => {
                    f();
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.callback.lock().map(|cb| cb.is_some()).unwrap_or(false)
    }
}

impl std::fmt::Debug for SimulatedTouch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedTouch")
            .field("subscribed", &self.is_subscribed())
            .finish()
    }
}

impl TouchSensor for SimulatedTouch {
    fn subscribe(&mut self, on_touch: TouchCallback) -> Result<(), DeviceError> {
        let mut cb = self
            .callback
            .lock()
            .map_err(|_| HwError::Simulated("touch poisoned"))?;
        *cb = Some(on_touch);
        Ok(())
    }

    fn unsubscribe(&mut self) -> Result<(), DeviceError> {
        let mut cb = self
            .callback
            .lock()
            .map_err(|_| HwError::Simulated("touch poisoned"))?;
        *cb = None;
        Ok(())
    }
}

/// Counts deliveries; can be told to fail.
#[derive(Debug, Clone, Default)]
pub struct SimulatedDispenser {
    delivered: Arc<AtomicU32>,
    fail: Arc<AtomicBool>,
}

impl SimulatedDispenser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> u32 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }
}

impl Dispenser for SimulatedDispenser {
    fn dispense(&mut self) -> Result<(), DeviceError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(Box::new(HwError::Simulated("dispenser jammed")));
        }
        self.delivered.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_serves_script_then_tared_load() {
        let handle = SimulatedScale::new();
        let mut scale = handle.clone();
        handle.set_load(3.0);
        handle.script([1.5]);
        let t = Duration::from_millis(1);
        assert_eq!(scale.weigh_once(t).unwrap(), 1.5);
        assert_eq!(scale.weigh_once(t).unwrap(), 3.0);
        scale.tare().unwrap();
        assert_eq!(scale.weigh_once(t).unwrap(), 0.0);
        assert_eq!(handle.tares(), 1);
    }

    #[test]
    fn touch_only_reaches_subscriber() {
        let handle = SimulatedTouch::new();
        let mut sensor = handle.clone();
        assert!(!handle.touch());

        let hits = Arc::new(AtomicU32::new(0));
        let h = hits.clone();
        sensor
            .subscribe(Box::new(move || {
                h.fetch_add(1, Ordering::Relaxed);
            }))
            .unwrap();
        assert!(handle.touch());
        sensor.unsubscribe().unwrap();
        assert!(!handle.touch());
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn failing_dispenser_does_not_count() {
        let handle = SimulatedDispenser::new();
        let mut d = handle.clone();
        d.dispense().unwrap();
        handle.set_failing(true);
        assert!(d.dispense().is_err());
        assert_eq!(handle.delivered(), 1);
    }
}
