use barkeep_traits::PumpSwitch;
use rppal::gpio::{Gpio, OutputPin};
use tracing::debug;

use crate::error::{HwError, Result};

/// Membrane pump behind a transistor stage.
///
/// The stage conducts while the pin is driven low as an output and floats
/// off when the pin returns to input mode. Dropping the pin handle restores
/// input mode, so releasing it is the off path.
pub struct GpioPump {
    gpio: Gpio,
    pin: u8,
    driven: Option<OutputPin>,
}

impl GpioPump {
    pub fn open(pin: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        Ok(Self {
            gpio,
            pin,
            driven: None,
        })
    }
}

impl PumpSwitch for GpioPump {
    fn set_running(
        &mut self,
        on: bool,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if on {
            if self.driven.is_none() {
                let pin = self
                    .gpio
                    .get(self.pin)
                    .map_err(|e| HwError::Gpio(e.to_string()))?;
                self.driven = Some(pin.into_output_low());
            }
        } else {
            self.driven = None;
        }
        debug!(on, "pump switched");
        Ok(())
    }
}
