use std::time::Duration;
use tracing::trace;

use crate::error::Result;
use crate::util::wait_for_level;

/// Bit-banged HX711 24-bit ADC.
pub struct Hx711 {
    dt: rppal::gpio::InputPin,
    sck: rppal::gpio::OutputPin,
    gain_pulses: u8, // 1 = channel A gain 128, 2 = B 32, 3 = A 64
}

impl Hx711 {
    pub fn new(
        dt: rppal::gpio::InputPin,
        mut sck: rppal::gpio::OutputPin,
        gain_pulses: u8,
    ) -> Self {
        sck.set_low(); // clock idle low, keeps the chip powered up
        Self {
            dt,
            sck,
            gain_pulses,
        }
    }

    pub fn read_with_timeout(&mut self, timeout: Duration) -> Result<i32> {
        // DT low means a conversion is ready
        let dt = &self.dt;
        wait_for_level(|| dt.is_high(), false, timeout, Duration::from_micros(200))?;

        let mut value: i32 = 0;
        for _ in 0..24 {
            self.sck.set_high();
            std::hint::spin_loop();
            value = (value << 1) | i32::from(self.dt.is_high());
            self.sck.set_low();
            std::hint::spin_loop();
        }

        for _ in 0..self.gain_pulses {
            self.sck.set_high();
            std::hint::spin_loop();
            self.sck.set_low();
            std::hint::spin_loop();
        }

        // Sign extend 24-bit
        if (value & 0x80_0000) != 0 {
            value |= !0xFF_FFFF;
        }
        trace!(raw = value, "hx711 raw read");
        Ok(value)
    }
}
