//! Contracts for the devices the home-cage controller talks to.
//!
//! Every call is synchronous and short. Errors cross this boundary as
//! `Box<dyn Error + Send + Sync>` and are mapped to typed errors by the core.
pub mod clock;
pub mod tag;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use tag::TagId;

pub type DeviceError = Box<dyn std::error::Error + Send + Sync>;

/// Tag-in-range signal of the RFID reader.
pub trait PresenceSensor {
    fn is_present(&mut self) -> Result<bool, DeviceError>;
}

/// Reads the tag currently in range, `None` when nothing is present.
pub trait TagReader {
    fn read_tag(&mut self) -> Result<Option<TagId>, DeviceError>;
}

/// Load cell under the cage floor.
pub trait Scale {
    /// One sample in grams, relative to the last tare.
    fn weigh_once(&mut self, timeout: std::time::Duration) -> Result<f32, DeviceError>;
    /// Re-zero at the current load.
    fn tare(&mut self) -> Result<(), DeviceError>;
}

/// Callback fired once per touch transition on the spout.
pub type TouchCallback = Box<dyn Fn() + Send + Sync + 'static>;

/// Capacitive spout sensor.
pub trait TouchSensor {
    fn subscribe(&mut self, on_touch: TouchCallback) -> Result<(), DeviceError>;
    fn unsubscribe(&mut self) -> Result<(), DeviceError>;
}

/// One liquid line: delivers a single unit per call.
pub trait Dispenser {
    fn dispense(&mut self) -> Result<(), DeviceError>;
}

impl<T: PresenceSensor + ?Sized> PresenceSensor for Box<T> {
    fn is_present(&mut self) -> Result<bool, DeviceError> {
        (**self).is_present()
    }
}

impl<T: TagReader + ?Sized> TagReader for Box<T> {
    fn read_tag(&mut self) -> Result<Option<TagId>, DeviceError> {
        (**self).read_tag()
    }
}

impl<T: Scale + ?Sized> Scale for Box<T> {
    fn weigh_once(&mut self, timeout: std::time::Duration) -> Result<f32, DeviceError> {
        (**self).weigh_once(timeout)
    }
    fn tare(&mut self) -> Result<(), DeviceError> {
        (**self).tare()
    }
}

impl<T: TouchSensor + ?Sized> TouchSensor for Box<T> {
    fn subscribe(&mut self, on_touch: TouchCallback) -> Result<(), DeviceError> {
        (**self).subscribe(on_touch)
    }
    fn unsubscribe(&mut self) -> Result<(), DeviceError> {
        (**self).unsubscribe()
    }
}

impl<T: Dispenser + ?Sized> Dispenser for Box<T> {
    fn dispense(&mut self) -> Result<(), DeviceError> {
        (**self).dispense()
    }
}
