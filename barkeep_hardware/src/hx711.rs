use std::time::Duration;

use barkeep_traits::LoadCell;
use tracing::trace;

use crate::error::{HwError, Result};
use crate::util::wait_until_low_with_timeout;

pub struct Hx711 {
    dt: rppal::gpio::InputPin,
    sck: rppal::gpio::OutputPin,
    gain_pulses: u8, // extra clocks after the 24 data bits; 1 = channel A, gain 128
}

impl Hx711 {
    pub fn new(
        dt_pin: rppal::gpio::InputPin,
        mut sck_pin: rppal::gpio::OutputPin,
        gain_pulses: u8,
    ) -> Result<Self> {
        if !(1..=3).contains(&gain_pulses) {
            return Err(HwError::Gpio(format!(
                "hx711 gain_pulses must be 1..=3, got {gain_pulses}"
            )));
        }
        sck_pin.set_low(); // clock idle low
        Ok(Self {
            dt: dt_pin,
            sck: sck_pin,
            gain_pulses,
        })
    }

    pub fn read_with_timeout(&mut self, timeout: Duration) -> Result<i32> {
        // Wait for data ready (DT goes low)
        let dt = &self.dt;
        wait_until_low_with_timeout(|| dt.is_high(), timeout, Duration::from_micros(200))?;

        // Clock out 24 bits
        let mut value: i32 = 0;
        for _ in 0..24 {
            self.sck.set_high();
            // short, consistent timing
            spin_delay_100ns();
            value = (value << 1) | if self.dt.is_high() { 1 } else { 0 };
            self.sck.set_low();
            spin_delay_100ns();
        }

        // Pulse gain to set next measurement
        for _ in 0..self.gain_pulses {
            self.sck.set_high();
            spin_delay_100ns();
            self.sck.set_low();
            spin_delay_100ns();
        }

        // Sign extend 24-bit
        if (value & 0x800000) != 0 {
            value |= !0xFFFFFF;
        }
        trace!(raw = value, "hx711 raw read");
        Ok(value)
    }
}

#[inline(always)]
fn spin_delay_100ns() {
    // A few CPU cycles; tweak if the bit clock runs too hot.
    std::hint::spin_loop();
}

/// HX711 behind the [`LoadCell`] trait, one raw sample per call.
pub struct HardwareLoadCell {
    hx: Hx711,
}

impl HardwareLoadCell {
    pub fn open(dt_pin: u8, sck_pin: u8) -> Result<Self> {
        let gpio = rppal::gpio::Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let dt = gpio
            .get(dt_pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_input();
        let sck = gpio
            .get(sck_pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_output();
        Ok(Self {
            hx: Hx711::new(dt, sck, 1)?,
        })
    }
}

impl LoadCell for HardwareLoadCell {
    fn read_raw(
        &mut self,
        timeout: Duration,
    ) -> std::result::Result<i32, Box<dyn std::error::Error + Send + Sync>> {
        let raw = self.hx.read_with_timeout(timeout)?;
        Ok(raw)
    }
}
