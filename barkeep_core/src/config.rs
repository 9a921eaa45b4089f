//! Domain configuration for the dispensing engine. The `conversions` module
//! maps these from the `barkeep_config` TOML schema.

use std::time::Duration;

use crate::status::FingerPosition;

/// One solenoid valve's PWM channel and servo endpoints.
#[derive(Debug, Clone, Copy)]
pub struct ValveConfig {
    pub channel: u8,
    pub open_ticks: u16,
    pub closed_ticks: u16,
}

impl ValveConfig {
    pub fn ticks_for(&self, open: bool) -> u16 {
        if open { self.open_ticks } else { self.closed_ticks }
    }
}

/// Servo endpoints for the finger actuator.
#[derive(Debug, Clone, Copy)]
pub struct FingerPositions {
    pub channel: u8,
    pub retracted: u16,
    pub hover: u16,
    pub dispense: u16,
}

impl FingerPositions {
    pub fn ticks_for(&self, position: FingerPosition) -> u16 {
        match position {
            FingerPosition::Retracted => self.retracted,
            FingerPosition::Hover => self.hover,
            FingerPosition::Dispense => self.dispense,
        }
    }
}

/// Work light duty endpoints.
#[derive(Debug, Clone, Copy)]
pub struct LampLevels {
    pub channel: u8,
    pub on_ticks: u16,
    pub off_ticks: u16,
}

/// Linear raw-to-grams model for the load cell.
#[derive(Debug, Clone, Copy)]
pub struct ScaleCalibration {
    /// Raw counts per gram; negative when the cell reads inverted.
    pub reference_unit: f32,
    /// Raw counts captured at the last tare.
    pub tare_offset: i32,
}

impl ScaleCalibration {
    pub fn new(reference_unit: f32) -> Self {
        Self {
            reference_unit,
            tare_offset: 0,
        }
    }

    pub fn to_grams(&self, raw: i32) -> f32 {
        (i64::from(raw) - i64::from(self.tare_offset)) as f32 / self.reference_unit
    }
}

/// Scale sampling settings.
#[derive(Debug, Clone, Copy)]
pub struct ScaleSettings {
    pub calibration: ScaleCalibration,
    /// Readings averaged per weight sample
    pub samples_per_read: u32,
    /// Deadline for a single raw reading
    pub read_timeout: Duration,
}

/// Pacing for the dosing loop and the gesture sequences.
#[derive(Debug, Clone, Copy)]
pub struct DosingTuning {
    /// Pause between weight polls while a dose runs
    pub poll_interval: Duration,
    /// Timeout for dose requests that do not carry their own
    pub default_timeout: Duration,
    /// Pause between valves when closing the whole bank
    pub close_delay: Duration,
    /// Pause between finger moves during a ping
    pub ping_delay: Duration,
}

impl Default for DosingTuning {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            default_timeout: Duration::from_secs(30),
            close_delay: Duration::from_millis(200),
            ping_delay: Duration::from_millis(150),
        }
    }
}
