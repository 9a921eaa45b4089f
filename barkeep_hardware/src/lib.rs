//! Peripheral drivers for the dispensing rig: HX711 scale, PCA9685 PWM bank,
//! and the GPIO pump switch, plus an always-available software rig.
//!
//! Pi-only drivers sit behind the `hardware` feature so the rest of the
//! workspace builds and tests anywhere.

pub mod error;
pub mod sim;
pub mod util;

#[cfg(feature = "hardware")]
pub mod hx711;
#[cfg(feature = "hardware")]
pub mod pca9685;
#[cfg(feature = "hardware")]
pub mod pump;

pub use error::HwError;
pub use sim::{SimLoadCell, SimPump, SimPwmBank, SimRig};

#[cfg(feature = "hardware")]
pub use hx711::HardwareLoadCell;
#[cfg(feature = "hardware")]
pub use pca9685::Pca9685Bank;
#[cfg(feature = "hardware")]
pub use pump::GpioPump;
