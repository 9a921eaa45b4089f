//! `From` implementations bridging `barkeep_config` types to `barkeep_core` types.
//!
//! These keep the field-by-field mapping out of the CLI.

use std::time::Duration;

use crate::config::{
    DosingTuning, FingerPositions, LampLevels, ScaleCalibration, ScaleSettings, ValveConfig,
};

// ── ValveConfig ──────────────────────────────────────────────────────────────

impl From<&barkeep_config::ValveCfg> for ValveConfig {
    fn from(c: &barkeep_config::ValveCfg) -> Self {
        Self {
            channel: c.channel,
            open_ticks: c.open_ticks,
            closed_ticks: c.closed_ticks,
        }
    }
}

// ── FingerPositions ──────────────────────────────────────────────────────────

impl From<&barkeep_config::FingerCfg> for FingerPositions {
    fn from(c: &barkeep_config::FingerCfg) -> Self {
        Self {
            channel: c.channel,
            retracted: c.retracted_ticks,
            hover: c.hover_ticks,
            dispense: c.dispense_ticks,
        }
    }
}

// ── LampLevels ───────────────────────────────────────────────────────────────

impl From<&barkeep_config::LampCfg> for LampLevels {
    fn from(c: &barkeep_config::LampCfg) -> Self {
        Self {
            channel: c.channel,
            on_ticks: c.on_ticks,
            off_ticks: c.off_ticks,
        }
    }
}

// ── ScaleSettings ────────────────────────────────────────────────────────────

impl From<&barkeep_config::ScaleCfg> for ScaleSettings {
    fn from(c: &barkeep_config::ScaleCfg) -> Self {
        Self {
            calibration: ScaleCalibration::new(c.reference_unit),
            samples_per_read: c.samples,
            read_timeout: Duration::from_millis(c.read_timeout_ms),
        }
    }
}

// ── DosingTuning ─────────────────────────────────────────────────────────────

impl From<&barkeep_config::DosingCfg> for DosingTuning {
    fn from(c: &barkeep_config::DosingCfg) -> Self {
        Self {
            poll_interval: Duration::from_millis(c.poll_ms),
            default_timeout: Duration::from_secs(c.default_timeout_s),
            close_delay: Duration::from_millis(c.close_delay_ms),
            ping_delay: Duration::from_millis(c.ping_delay_ms),
        }
    }
}
