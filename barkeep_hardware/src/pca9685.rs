use barkeep_traits::PwmBank;
use linux_embedded_hal::I2cdev;
use pwm_pca9685::{Address, Channel, Pca9685};
use tracing::trace;

use crate::error::{HwError, Result};

/// PCA9685 16-channel controller behind the [`PwmBank`] trait.
///
/// Pulses always start at tick 0, so a channel's duty is just its off tick.
pub struct Pca9685Bank {
    pwm: Pca9685<I2cdev>,
}

impl Pca9685Bank {
    /// Open the controller on `bus` and program its update rate.
    pub fn open(bus: &str, address: u8, frequency_hz: u16) -> Result<Self> {
        let dev = I2cdev::new(bus).map_err(|e| HwError::I2c(format!("open {bus}: {e}")))?;
        let mut pwm = Pca9685::new(dev, Address::from(address)).map_err(pwm_err)?;
        pwm.set_prescale(prescale_for(frequency_hz)).map_err(pwm_err)?;
        pwm.enable().map_err(pwm_err)?;
        Ok(Self { pwm })
    }
}

impl PwmBank for Pca9685Bank {
    fn set_pulse(
        &mut self,
        channel: u8,
        ticks: u16,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let ch = channel_of(channel)?;
        self.pwm.set_channel_on_off(ch, 0, ticks).map_err(pwm_err)?;
        trace!(channel, ticks, "pwm pulse set");
        Ok(())
    }
}

/// Prescale for a target update rate, from the 25 MHz internal oscillator.
fn prescale_for(frequency_hz: u16) -> u8 {
    const OSC_HZ: f64 = 25_000_000.0;
    let steps = 4096.0 * f64::from(frequency_hz);
    let prescale = (OSC_HZ / steps).round() as i64 - 1;
    prescale.clamp(3, 255) as u8
}

fn channel_of(channel: u8) -> Result<Channel> {
    Ok(match channel {
        0 => Channel::C0,
        1 => Channel::C1,
        2 => Channel::C2,
        3 => Channel::C3,
        4 => Channel::C4,
        5 => Channel::C5,
        6 => Channel::C6,
        7 => Channel::C7,
        8 => Channel::C8,
        9 => Channel::C9,
        10 => Channel::C10,
        11 => Channel::C11,
        12 => Channel::C12,
        13 => Channel::C13,
        14 => Channel::C14,
        15 => Channel::C15,
        _ => return Err(HwError::Pwm(format!("channel {channel} out of range"))),
    })
}

fn pwm_err<E: std::fmt::Debug>(e: pwm_pca9685::Error<E>) -> HwError {
    HwError::Pwm(format!("{e:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prescale_matches_datasheet_examples() {
        assert_eq!(prescale_for(60), 101);
        assert_eq!(prescale_for(200), 30);
        // clamped to the controller's limits at the extremes
        assert_eq!(prescale_for(1526), 3);
        assert_eq!(prescale_for(24), 253);
    }
}
