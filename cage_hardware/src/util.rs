use std::time::{Duration, Instant};

use crate::error::{HwError, Result};

/// Poll `read_level` until it reports `want`, or fail with `DataReadyTimeout`.
/// Sleeps `poll_interval` between reads to avoid spinning the CPU.
pub fn wait_for_level(
    mut read_level: impl FnMut() -> bool,
    want: bool,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    while read_level() != want {
        if Instant::now() >= deadline {
            return Err(HwError::DataReadyTimeout);
        }
        std::thread::sleep(poll_interval);
    }
    Ok(())
}

/// Drive a line high for `width`, then low again.
pub fn pulse(mut set: impl FnMut(bool), width: Duration) {
    set(true);
    std::thread::sleep(width);
    set(false);
}
