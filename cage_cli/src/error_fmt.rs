//! Human-readable error descriptions and structured JSON error formatting.

/// Exit code when the cage stopped to be restarted.
pub const EXIT_REBOOT: i32 = 10;
pub const EXIT_RUNTIME: i32 = 1;
pub const EXIT_CONFIG: i32 = 2;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    use cage_core::error::{BuildError, CageError};

    if let Some(be) = err.downcast_ref::<BuildError>() {
        return format!(
            "What happened: The cage could not be assembled ({be}).\nLikely causes: A device failed to initialize and was not wired into the builder.\nHow to fix: Check the [pins] section and device wiring, then run `self-check`."
        );
    }

    if let Some(ce) = err.downcast_ref::<CageError>() {
        return match ce {
            CageError::Config(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
            CageError::Registry { path, msg } => format!(
                "What happened: The animal registry {path} could not be used ({msg}).\nLikely causes: Missing file, a short or non-numeric row, or no write permission.\nHow to fix: Each row needs 9 tab-separated columns: tag, name, treatment, last day, day index, drug drops, water drops, required drug drops, reference weight."
            ),
            CageError::Timeout => "What happened: A sensor read timed out.\nLikely causes: HX711 not wired correctly, no power/ground, or timeout too low.\nHow to fix: Verify DAT/CLK pins and power, and consider increasing weighing.sensor_read_timeout_ms.".to_string(),
            CageError::Io(msg) => format!(
                "What happened: A log or data file could not be written ({msg}).\nLikely causes: Disk full or read-only, or wrong paths.data_dir.\nHow to fix: Check free space and permissions of the data directory."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("datareadytimeout") || (lower.contains("hx711") && lower.contains("timeout"))
    {
        return "What happened: HX711 did not produce data within the configured timeout.\nLikely causes: Wrong DAT/CLK pins, wiring/power issues, or timeout configured too low.\nHow to fix: Check [pins] in the config, verify 5V/GND, and raise weighing.sensor_read_timeout_ms.".to_string();
    }

    if lower.contains("uart") {
        return "What happened: The RFID reader's serial port could not be opened.\nLikely causes: Wrong rfid.port, serial console still enabled, or missing permissions.\nHow to fix: Check rfid.port and that the user is in the dialout group.".to_string();
    }

    if lower.contains("calibration csv must have headers") {
        return "Invalid headers in calibration CSV. Expected 'raw,grams'.".to_string();
    }

    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Configuration problems exit with 2, everything else with 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    use cage_core::error::CageError;
    match err.downcast_ref::<CageError>() {
        Some(CageError::Config(_)) => EXIT_CONFIG,
        _ => EXIT_RUNTIME,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use cage_core::error::CageError;
    use serde_json::json;

    let reason = match err.downcast_ref::<CageError>() {
        Some(CageError::Config(_)) => "Config",
        Some(CageError::Registry { .. }) => "Registry",
        Some(CageError::Timeout) => "Timeout",
        Some(_) => "Cage",
        None => "Error",
    };
    json!({ "reason": reason, "message": humanize(err), "exit_code": exit_code_for_error(err) })
        .to_string()
}
