//! Maps `Box<dyn Error>` from device trait boundaries to typed `CageError`.
//!
//! With the `hardware-errors` feature, `cage_hardware::HwError` is downcast
//! for a precise mapping; otherwise the message is inspected.

use crate::error::CageError;

pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> CageError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<cage_hardware::HwError>() {
            return match hw {
                cage_hardware::HwError::Timeout => CageError::Timeout,
                cage_hardware::HwError::DataReadyTimeout => CageError::Timeout,
                other => CageError::HardwareFault(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        CageError::Timeout
    } else {
        CageError::Hardware(s)
    }
}

/// Convenience for `Result<T, DeviceError>` at call sites.
pub(crate) fn hw<T>(r: Result<T, cage_traits::DeviceError>) -> crate::error::Result<T> {
    r.map_err(|e| map_hw_error(e.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_text_maps_to_timeout() {
        let e: cage_traits::DeviceError = "sensor timeout".into();
        assert!(matches!(map_hw_error(e.as_ref()), CageError::Timeout));
    }

    #[test]
    fn other_text_maps_to_hardware() {
        let e: cage_traits::DeviceError = "bus fault".into();
        assert!(matches!(map_hw_error(e.as_ref()), CageError::Hardware(_)));
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn typed_hw_errors_are_downcast() {
        let e: cage_traits::DeviceError = Box::new(cage_hardware::HwError::DataReadyTimeout);
        assert!(matches!(map_hw_error(e.as_ref()), CageError::Timeout));
        let e: cage_traits::DeviceError = Box::new(cage_hardware::HwError::Gpio("pin 6".into()));
        assert!(matches!(map_hw_error(e.as_ref()), CageError::HardwareFault(_)));
    }
}
