//! Maps `Box<dyn Error>` from trait boundaries to typed `DoseError`.
//!
//! The traits in `barkeep_traits` use `Box<dyn Error + Send + Sync>` for maximum
//! flexibility; this module converts those to our typed error enum, with an
//! optional feature-gated path for `barkeep_hardware::HwError` downcasting.

use crate::error::DoseError;

/// Map a scale-side trait-boundary error to a typed `DoseError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to the raw message. Every scale failure ends the current dose attempt,
/// so they all land in `SensorUnavailable`.
pub fn map_sensor_error(e: &(dyn std::error::Error + 'static)) -> DoseError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<barkeep_hardware::error::HwError>() {
            return match hw {
                barkeep_hardware::error::HwError::DataReadyTimeout => {
                    DoseError::SensorUnavailable("hx711 not ready within timeout".to_string())
                }
                other => DoseError::SensorUnavailable(other.to_string()),
            };
        }
    }

    DoseError::SensorUnavailable(e.to_string())
}

/// Map an actuator-side trait-boundary error to a typed `DoseError`.
pub fn map_actuator_error(e: &(dyn std::error::Error + 'static)) -> DoseError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<barkeep_hardware::error::HwError>() {
            return DoseError::Actuator(hw.to_string());
        }
    }

    DoseError::Actuator(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_errors_keep_their_message() {
        let e = std::io::Error::other("dt line stuck");
        let mapped = map_sensor_error(&e);
        assert!(matches!(mapped, DoseError::SensorUnavailable(ref s) if s.contains("dt line")));
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn hx711_timeouts_get_a_specific_message() {
        let e = barkeep_hardware::error::HwError::DataReadyTimeout;
        let mapped = map_sensor_error(&e);
        assert!(matches!(mapped, DoseError::SensorUnavailable(ref s) if s.contains("hx711")));
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn actuator_errors_map_to_actuator() {
        let e = barkeep_hardware::error::HwError::Pwm("bus fell over".to_string());
        let mapped = map_actuator_error(&e);
        assert!(matches!(mapped, DoseError::Actuator(_)));
    }
}
