//! Device wiring: Raspberry Pi peripherals with the `hardware` feature,
//! simulated devices otherwise.

use cage_config::Config;
use cage_traits::{Dispenser, PresenceSensor, Scale, TagReader, TouchSensor};

pub struct Devices {
    pub presence: Box<dyn PresenceSensor>,
    pub reader: Box<dyn TagReader>,
    pub scale: Box<dyn Scale>,
    pub touch: Box<dyn TouchSensor>,
    pub water: Box<dyn Dispenser>,
    pub drug: Box<dyn Dispenser>,
}

#[cfg(feature = "hardware")]
pub fn open(cfg: &Config, gain_g_per_count: Option<f32>) -> eyre::Result<Devices> {
    use cage_core::error::CageError;
    use cage_hardware::pi::{
        GpioPresence, HardwareScale, Solenoid, SyringePins, SyringePump, TouchIrq, UartTagReader,
    };
    use eyre::WrapErr;
    use std::time::Duration;

    let p = &cfg.pins;
    let gain = gain_g_per_count.ok_or_else(|| {
        CageError::Config(
            "no scale calibration: set [calibration] gain_g_per_count or pass --calibration"
                .into(),
        )
    })?;

    let presence = GpioPresence::new(p.presence)
        .wrap_err_with(|| format!("open presence pin {}", p.presence))?;
    let reader = UartTagReader::new(
        &cfg.rfid.port,
        cfg.rfid.baud,
        Duration::from_millis(cfg.rfid.read_timeout_ms),
    )
    .wrap_err_with(|| format!("open RFID uart {}", cfg.rfid.port))?
    .with_checksum(cfg.rfid.verify_checksum);
    let scale = HardwareScale::new(
        p.scale_dat,
        p.scale_clk,
        gain,
        Duration::from_millis(cfg.weighing.sensor_read_timeout_ms),
    )
    .wrap_err("open hx711")?;
    let touch =
        TouchIrq::new(p.touch_irq).wrap_err_with(|| format!("open touch irq pin {}", p.touch_irq))?;
    let water = Solenoid::new(p.solenoid, Duration::from_millis(cfg.dosing.solenoid_open_ms))
        .wrap_err_with(|| format!("open solenoid pin {}", p.solenoid))?;
    let drug = SyringePump::new(
        &SyringePins {
            step: p.motor_step,
            dir: p.motor_dir,
            ms1: p.motor_ms1,
            ms2: p.motor_ms2,
        },
        cfg.dosing.syringe_steps,
    )
    .wrap_err("open syringe pump pins")?;

    tracing::info!(backend = "hardware", gain_g_per_count = gain, "devices open");
    Ok(Devices {
        presence: Box::new(presence),
        reader: Box::new(reader),
        scale: Box::new(scale),
        touch: Box::new(touch),
        water: Box::new(water),
        drug: Box::new(drug),
    })
}

/// Simulated cage. `CAGE_SIM_TAG` puts a tag in range for the whole run and
/// `CAGE_SIM_LOAD_G` sets the load on the scale.
#[cfg(not(feature = "hardware"))]
pub fn open(_cfg: &Config, _gain_g_per_count: Option<f32>) -> eyre::Result<Devices> {
    use cage_hardware::{
        SimulatedDispenser, SimulatedPresence, SimulatedScale, SimulatedTagReader, SimulatedTouch,
    };
    use cage_traits::TagId;
    use eyre::WrapErr;

    let presence = SimulatedPresence::new();
    let reader = SimulatedTagReader::new();
    let scale = SimulatedScale::new();

    if let Ok(tag) = std::env::var("CAGE_SIM_TAG") {
        let tag: TagId = tag
            .parse()
            .wrap_err_with(|| format!("CAGE_SIM_TAG is not a tag number: {tag:?}"))?;
        presence.set(true);
        reader.set(Some(tag));
        scale.set_load(25.0);
    }
    if let Ok(load) = std::env::var("CAGE_SIM_LOAD_G")
        && let Ok(g) = load.parse::<f32>()
    {
        scale.set_load(g);
    }

    tracing::info!(backend = "sim", "devices open");
    Ok(Devices {
        presence: Box::new(presence),
        reader: Box::new(reader),
        scale: Box::new(scale),
        touch: Box::new(SimulatedTouch::new()),
        water: Box::new(SimulatedDispenser::new()),
        drug: Box::new(SimulatedDispenser::new()),
    })
}
