#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas for the dispensing rig.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Hardware sections (scale pins, PWM channels, pump pin) are required;
//!   tuning sections fall back to the defaults the rig was commissioned with.
use serde::Deserialize;

/// HX711 load cell wiring and calibration.
#[derive(Debug, Deserialize, Clone)]
pub struct ScaleCfg {
    /// BCM pin wired to the HX711 DOUT line
    pub dt_pin: u8,
    /// BCM pin wired to the HX711 PD_SCK line
    pub sck_pin: u8,
    /// Raw counts per gram. Negative when the cell reads inverted.
    pub reference_unit: f32,
    /// Readings averaged per weight sample
    #[serde(default = "default_scale_samples")]
    pub samples: u32,
    /// Max time to wait for HX711 data-ready (DT low) before failing
    #[serde(default = "default_scale_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

fn default_scale_samples() -> u32 {
    5
}

fn default_scale_read_timeout_ms() -> u64 {
    150
}

/// PCA9685 PWM controller on the I2C bus.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PwmCfg {
    pub i2c_bus: String,
    pub i2c_address: u8,
    /// PWM update rate; the controller accepts 24..=1526 Hz
    pub frequency_hz: u16,
}

impl Default for PwmCfg {
    fn default() -> Self {
        Self {
            i2c_bus: "/dev/i2c-1".to_string(),
            i2c_address: 0x40,
            frequency_hz: 60,
        }
    }
}

/// One solenoid valve: its PWM channel and the two servo endpoints.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct ValveCfg {
    pub channel: u8,
    pub open_ticks: u16,
    pub closed_ticks: u16,
}

/// Linear actuator (the "finger") that taps the dispense bell.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct FingerCfg {
    pub channel: u8,
    pub retracted_ticks: u16,
    pub hover_ticks: u16,
    pub dispense_ticks: u16,
}

/// Work light driven from a spare PWM channel.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct LampCfg {
    pub channel: u8,
    pub on_ticks: u16,
    pub off_ticks: u16,
}

/// Membrane pump switched through a single GPIO line.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct PumpCfg {
    /// BCM pin; driven as an output while pumping, left floating otherwise
    pub pin: u8,
}

/// Closed-loop dosing tuning.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct DosingCfg {
    /// Pause between weight polls while a dose is running (ms)
    pub poll_ms: u64,
    /// Timeout applied when a dose request does not carry its own (s)
    pub default_timeout_s: u64,
    /// Pause between valves when closing the whole bank (ms)
    pub close_delay_ms: u64,
    /// Pause between finger moves during a ping gesture (ms)
    pub ping_delay_ms: u64,
}

impl Default for DosingCfg {
    fn default() -> Self {
        Self {
            poll_ms: 100,
            default_timeout_s: 30,
            close_delay_ms: 200,
            ping_delay_ms: 150,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub scale: ScaleCfg,
    #[serde(default)]
    pub pwm: PwmCfg,
    /// One `[[valve]]` block per reservoir, index order = dose index order
    #[serde(rename = "valve", default)]
    pub valves: Vec<ValveCfg>,
    pub finger: FingerCfg,
    pub lamp: LampCfg,
    pub pump: PumpCfg,
    #[serde(default)]
    pub dosing: DosingCfg,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

pub fn load_file(path: &std::path::Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {:?}: {}", path, e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("parse config {:?}: {}", path, e))?;
    Ok(cfg)
}

/// Highest PWM channel on the PCA9685.
pub const MAX_PWM_CHANNEL: u8 = 15;
/// Highest tick value in the controller's 12-bit duty range.
pub const MAX_PWM_TICKS: u16 = 4095;

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Scale
        if !self.scale.reference_unit.is_finite() || self.scale.reference_unit == 0.0 {
            eyre::bail!("scale.reference_unit must be finite and non-zero");
        }
        if self.scale.samples == 0 {
            eyre::bail!("scale.samples must be >= 1");
        }
        if self.scale.read_timeout_ms == 0 {
            eyre::bail!("scale.read_timeout_ms must be >= 1");
        }
        if self.scale.dt_pin == self.scale.sck_pin {
            eyre::bail!("scale.dt_pin and scale.sck_pin must be distinct");
        }

        // Pump
        if self.pump.pin == self.scale.dt_pin || self.pump.pin == self.scale.sck_pin {
            eyre::bail!("pump.pin collides with a scale pin");
        }

        // PWM bus
        if self.pwm.i2c_bus.is_empty() {
            eyre::bail!("pwm.i2c_bus must not be empty");
        }
        if !(24..=1526).contains(&self.pwm.frequency_hz) {
            eyre::bail!("pwm.frequency_hz must be in 24..=1526");
        }

        // Valves
        if self.valves.is_empty() {
            eyre::bail!("at least one [[valve]] must be configured");
        }
        for (i, v) in self.valves.iter().enumerate() {
            if v.channel > MAX_PWM_CHANNEL {
                eyre::bail!("valve[{}].channel must be <= {}", i, MAX_PWM_CHANNEL);
            }
            if v.open_ticks > MAX_PWM_TICKS || v.closed_ticks > MAX_PWM_TICKS {
                eyre::bail!("valve[{}] tick values must be <= {}", i, MAX_PWM_TICKS);
            }
        }

        // Finger
        if self.finger.channel > MAX_PWM_CHANNEL {
            eyre::bail!("finger.channel must be <= {}", MAX_PWM_CHANNEL);
        }
        if self.finger.retracted_ticks > MAX_PWM_TICKS
            || self.finger.hover_ticks > MAX_PWM_TICKS
            || self.finger.dispense_ticks > MAX_PWM_TICKS
        {
            eyre::bail!("finger tick values must be <= {}", MAX_PWM_TICKS);
        }

        // Lamp
        if self.lamp.channel > MAX_PWM_CHANNEL {
            eyre::bail!("lamp.channel must be <= {}", MAX_PWM_CHANNEL);
        }
        if self.lamp.on_ticks > MAX_PWM_TICKS || self.lamp.off_ticks > MAX_PWM_TICKS {
            eyre::bail!("lamp tick values must be <= {}", MAX_PWM_TICKS);
        }

        // Channel assignments must not overlap
        let mut seen = [false; MAX_PWM_CHANNEL as usize + 1];
        let mut claim = |channel: u8, what: &str| -> eyre::Result<()> {
            let slot = &mut seen[channel as usize];
            if *slot {
                eyre::bail!("{} claims PWM channel {} twice", what, channel);
            }
            *slot = true;
            Ok(())
        };
        for (i, v) in self.valves.iter().enumerate() {
            claim(v.channel, &format!("valve[{i}]"))?;
        }
        claim(self.finger.channel, "finger")?;
        claim(self.lamp.channel, "lamp")?;

        // Dosing
        if self.dosing.poll_ms == 0 {
            eyre::bail!("dosing.poll_ms must be >= 1");
        }
        if self.dosing.poll_ms > 60 * 1000 {
            eyre::bail!("dosing.poll_ms is unreasonably large (>60s)");
        }
        if self.dosing.default_timeout_s == 0 {
            eyre::bail!("dosing.default_timeout_s must be >= 1");
        }
        if self.dosing.default_timeout_s > 60 * 60 {
            eyre::bail!("dosing.default_timeout_s is unreasonably large (>1h)");
        }
        if self.dosing.close_delay_ms > 60 * 1000 {
            eyre::bail!("dosing.close_delay_ms is unreasonably large (>60s)");
        }
        if self.dosing.ping_delay_ms > 60 * 1000 {
            eyre::bail!("dosing.ping_delay_ms is unreasonably large (>60s)");
        }

        Ok(())
    }
}
