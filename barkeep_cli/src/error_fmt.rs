//! Human-readable error descriptions and structured JSON error formatting.

use barkeep_core::{BuildError, DoseError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingLoadCell => {
                "What happened: No load cell was provided to the dispensing engine.\nLikely causes: HX711 failed to initialize or was not wired into the builder.\nHow to fix: Check [scale] dt_pin/sck_pin in the config and GPIO permissions.".to_string()
            }
            BuildError::MissingPwmBank => {
                "What happened: No PWM bank was provided to the dispensing engine.\nLikely causes: The PCA9685 was not found on the I2C bus.\nHow to fix: Check [pwm] i2c_bus/i2c_address in the config and that I2C is enabled.".to_string()
            }
            BuildError::MissingPump => {
                "What happened: No pump switch was provided to the dispensing engine.\nLikely causes: The pump GPIO pin failed to open.\nHow to fix: Check [pump] pin in the config and GPIO permissions.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/barkeep.toml for a sample."
            ),
        };
    }

    if let Some(de) = err.downcast_ref::<DoseError>() {
        return match de {
            DoseError::InvalidIndex { index, num_valves } => format!(
                "What happened: Valve index {index} is out of range.\nLikely causes: The rig has {num_valves} valves (indices 0..{}).\nHow to fix: Pass --valve within range, or add the missing [[valve]] block to the config.",
                num_valves.saturating_sub(1)
            ),
            DoseError::Busy => {
                "What happened: A dose is already in progress.\nLikely causes: Two commands were issued against the same controller.\nHow to fix: Wait for the running dose to finish or cancel it, then retry.".to_string()
            }
            DoseError::SensorUnavailable(msg) => format!(
                "What happened: The scale stopped answering ({msg}).\nLikely causes: HX711 wiring or power, or a too-small read timeout.\nHow to fix: Verify DT/SCK wiring and 5V/GND, and consider raising scale.read_timeout_ms."
            ),
            DoseError::Actuator(msg) => format!(
                "What happened: An actuator command failed ({msg}).\nLikely causes: PCA9685 lost from the I2C bus, or the pump GPIO line is unavailable.\nHow to fix: Check I2C wiring and bus address; the rig was driven to a safe state where possible."
            ),
            DoseError::State(msg) => format!(
                "What happened: {msg}.\nLikely causes: Commands arrived in an unexpected order.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if (lower.contains("hx711") && lower.contains("timeout")) || lower.contains("datareadytimeout")
    {
        return "What happened: The HX711 did not produce data within the configured timeout.\nLikely causes: Wrong DT/SCK pins, wiring/power issues, or timeout configured too low.\nHow to fix: Check [scale] in the config, verify 5V/GND, and raise scale.read_timeout_ms.".to_string();
    }

    if lower.contains("open hx711") || lower.contains("open pump pin") || lower.contains("open pwm")
    {
        return "What happened: Failed to initialize a peripheral.\nLikely causes: Incorrect pin or bus values, or insufficient GPIO/I2C permissions.\nHow to fix: Fix the [scale]/[pwm]/[pump] values in the config; ensure the process may access GPIO and I2C.".to_string();
    }

    if lower.contains("read config") || lower.contains("parse config") {
        return format!(
            "What happened: The config file could not be loaded.\nLikely causes: Wrong --config path or invalid TOML.\nHow to fix: Point --config at a valid file (see etc/barkeep.toml). Original: {msg}"
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Map typed dose errors to stable exit codes; everything else returns 1.
/// Codes 2 and 4 are claimed by the cancelled and timed-out outcomes.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if let Some(de) = err.downcast_ref::<DoseError>() {
        return match de {
            DoseError::SensorUnavailable(_) => 3,
            DoseError::Actuator(_) => 5,
            DoseError::InvalidIndex { .. } => 6,
            DoseError::Busy => 7,
            DoseError::State(_) => 1,
        };
    }
    1
}

fn error_reason(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "BuildError";
    }
    match err.downcast_ref::<DoseError>() {
        Some(DoseError::InvalidIndex { .. }) => "InvalidIndex",
        Some(DoseError::Busy) => "Busy",
        Some(DoseError::SensorUnavailable(_)) => "SensorUnavailable",
        Some(DoseError::Actuator(_)) => "Actuator",
        Some(DoseError::State(_)) => "State",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    json!({ "reason": error_reason(err), "message": humanize(err) }).to_string()
}
