//! Raspberry Pi devices (GPIO via rppal).
use std::time::Duration;

use cage_traits::{
    DeviceError, Dispenser, PresenceSensor, Scale, TagId, TagReader, TouchCallback, TouchSensor,
};
use rppal::gpio::{Gpio, InputPin, OutputPin, Trigger};
use rppal::uart::{Parity, Uart};

use crate::error::{HwError, Result};
use crate::hx711::Hx711;
use crate::rfid::{FRAME_LEN, parse_id_frame};
use crate::util::pulse;

fn gpio() -> Result<Gpio> {
    Gpio::new().map_err(|e| HwError::Gpio(format!("open gpio: {e}")))
}

fn input(gpio: &Gpio, pin: u8) -> Result<InputPin> {
    Ok(gpio
        .get(pin)
        .map_err(|e| HwError::Gpio(format!("pin {pin}: {e}")))?
        .into_input())
}

fn output_low(gpio: &Gpio, pin: u8) -> Result<OutputPin> {
    Ok(gpio
        .get(pin)
        .map_err(|e| HwError::Gpio(format!("pin {pin}: {e}")))?
        .into_output_low())
}

/// Tag-in-range output of the RFID reader.
pub struct GpioPresence {
    pin: InputPin,
}

impl GpioPresence {
    pub fn new(pin: u8) -> Result<Self> {
        Ok(Self {
            pin: input(&gpio()?, pin)?,
        })
    }
}

impl PresenceSensor for GpioPresence {
    fn is_present(&mut self) -> std::result::Result<bool, DeviceError> {
        Ok(self.pin.is_high())
    }
}

pub struct HardwareScale {
    hx711: Hx711,
    gain_g_per_count: f32,
    zero_counts: i32,
    tare_reads: u32,
    timeout: Duration,
}

impl HardwareScale {
    pub fn new(
        dat_pin: u8,
        clk_pin: u8,
        gain_g_per_count: f32,
        timeout: Duration,
    ) -> Result<Self> {
        let gpio = gpio()?;
        let dt = input(&gpio, dat_pin)?;
        let sck = output_low(&gpio, clk_pin)?;
        let mut scale = Self {
            hx711: Hx711::new(dt, sck, 1),
            gain_g_per_count,
            zero_counts: 0,
            tare_reads: 10,
            timeout,
        };
        // first conversion after power-up is junk
        let _ = scale.read_raw(timeout);
        scale.tare_now()?;
        Ok(scale)
    }

    fn read_raw(&mut self, timeout: Duration) -> Result<i32> {
        let mut attempts = 0;
        let max_attempts = 3;
        loop {
            match self.hx711.read_with_timeout(timeout) {
                Ok(raw) => return Ok(raw),
                Err(HwError::DataReadyTimeout) if attempts < max_attempts => {
                    attempts += 1;
                    tracing::warn!(retries = attempts, "scale timeout, retrying");
                }
                Err(HwError::DataReadyTimeout) => return Err(HwError::Timeout),
                Err(e) => {
                    tracing::error!("Scale read error: {}", e);
                    return Err(e);
                }
            }
        }
    }

    fn tare_now(&mut self) -> Result<()> {
        let mut sum: i64 = 0;
        for _ in 0..self.tare_reads {
            sum += i64::from(self.read_raw(self.timeout)?);
        }
        self.zero_counts = (sum / i64::from(self.tare_reads.max(1))) as i32;
        tracing::debug!(zero_counts = self.zero_counts, "scale tared");
        Ok(())
    }
}

impl Scale for HardwareScale {
    fn weigh_once(&mut self, timeout: Duration) -> std::result::Result<f32, DeviceError> {
        let raw = self.read_raw(timeout)?;
        Ok(self.gain_g_per_count * (raw.saturating_sub(self.zero_counts)) as f32)
    }

    fn tare(&mut self) -> std::result::Result<(), DeviceError> {
        Ok(self.tare_now()?)
    }
}

/// Touch controller IRQ line; fires on the falling edge.
pub struct TouchIrq {
    pin: InputPin,
}

impl TouchIrq {
    pub fn new(pin: u8) -> Result<Self> {
        let pin = gpio()?
            .get(pin)
            .map_err(|e| HwError::Gpio(format!("pin {pin}: {e}")))?
            .into_input_pullup();
        Ok(Self { pin })
    }
}

impl TouchSensor for TouchIrq {
    fn subscribe(&mut self, on_touch: TouchCallback) -> std::result::Result<(), DeviceError> {
        self.pin
            .set_async_interrupt(Trigger::FallingEdge, move |_level| on_touch())
            .map_err(|e| HwError::Gpio(format!("touch irq: {e}")))?;
        Ok(())
    }

    fn unsubscribe(&mut self) -> std::result::Result<(), DeviceError> {
        self.pin
            .clear_async_interrupt()
            .map_err(|e| HwError::Gpio(format!("touch irq: {e}")))?;
        Ok(())
    }
}

/// Water line: solenoid valve held open for a fixed time.
pub struct Solenoid {
    pin: OutputPin,
    open_for: Duration,
}

impl Solenoid {
    pub fn new(pin: u8, open_for: Duration) -> Result<Self> {
        Ok(Self {
            pin: output_low(&gpio()?, pin)?,
            open_for,
        })
    }
}

impl Dispenser for Solenoid {
    fn dispense(&mut self) -> std::result::Result<(), DeviceError> {
        let pin = &mut self.pin;
        pulse(|high| if high { pin.set_high() } else { pin.set_low() }, self.open_for);
        Ok(())
    }
}

pub struct SyringePins {
    pub step: u8,
    pub dir: u8,
    pub ms1: u8,
    pub ms2: u8,
}

/// Drug line: stepper-driven syringe pump, fixed steps per drop.
pub struct SyringePump {
    step: OutputPin,
    _dir: OutputPin,
    _ms1: OutputPin,
    _ms2: OutputPin,
    steps_per_drop: u32,
}

impl SyringePump {
    pub fn new(pins: &SyringePins, steps_per_drop: u32) -> Result<Self> {
        let gpio = gpio()?;
        let step = output_low(&gpio, pins.step)?;
        let dir = output_low(&gpio, pins.dir)?;
        // both microstep lines high: 1/8 step
        let mut ms1 = output_low(&gpio, pins.ms1)?;
        let mut ms2 = output_low(&gpio, pins.ms2)?;
        ms1.set_high();
        ms2.set_high();
        Ok(Self {
            step,
            _dir: dir,
            _ms1: ms1,
            _ms2: ms2,
            steps_per_drop,
        })
    }
}

impl Dispenser for SyringePump {
    fn dispense(&mut self) -> std::result::Result<(), DeviceError> {
        let step = &mut self.step;
        for _ in 0..self.steps_per_drop {
            pulse(
                |high| if high { step.set_high() } else { step.set_low() },
                Duration::from_millis(1),
            );
            std::thread::sleep(Duration::from_millis(1));
        }
        Ok(())
    }
}

/// Serial RFID reader in ASCII mode.
pub struct UartTagReader {
    uart: Uart,
    verify_checksum: bool,
}

impl UartTagReader {
    pub fn new(port: &str, baud: u32, timeout: Duration) -> Result<Self> {
        let mut uart = Uart::with_path(port, baud, Parity::None, 8, 1)
            .map_err(|e| HwError::Uart(format!("open {port}: {e}")))?;
        uart.set_read_mode(0, timeout)
            .map_err(|e| HwError::Uart(format!("read mode: {e}")))?;
        Ok(Self {
            uart,
            verify_checksum: false,
        })
    }

    pub fn with_checksum(mut self, verify: bool) -> Self {
        self.verify_checksum = verify;
        self
    }
}

impl TagReader for UartTagReader {
    fn read_tag(&mut self) -> std::result::Result<Option<TagId>, DeviceError> {
        let mut frame = [0u8; FRAME_LEN];
        let mut filled = 0;
        while filled < FRAME_LEN {
            let n = self
                .uart
                .read(&mut frame[filled..])
                .map_err(|e| HwError::Uart(e.to_string()))?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            return Ok(None);
        }
        match parse_id_frame(&frame[..filled], self.verify_checksum) {
            Ok(tag) => Ok(Some(tag)),
            Err(e) => {
                tracing::warn!(error = %e, "discarding malformed RFID frame");
                Ok(None)
            }
        }
    }
}
