//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "barkeep", version, about = "Dispensing rig CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/barkeep.toml")]
    pub config: PathBuf,

    /// Emit results and errors as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Finger park positions addressable from the command line.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum FingerPos {
    Retracted,
    Hover,
    Dispense,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum LampState {
    On,
    Off,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pour a weighed dose from one valve
    Dose {
        /// Valve index (0-based)
        #[arg(long)]
        valve: usize,
        /// Target grams to pour
        #[arg(long)]
        grams: f32,
        /// Override the dose deadline in seconds
        #[arg(long, value_name = "SECONDS")]
        timeout_s: Option<u64>,
    },
    /// Tap the finger on the dispense bell
    Ping {
        /// Number of taps
        #[arg(long, default_value_t = 1)]
        times: u32,
        /// Stay pressed on the bell instead of parking at hover
        #[arg(long, action = ArgAction::SetTrue)]
        stay: bool,
    },
    /// Park the finger at a named position
    Finger {
        #[arg(value_enum)]
        position: FingerPos,
    },
    /// Close every valve in ascending order
    CloseAll,
    /// Capture the current weight as the zero point
    Tare,
    /// Read the current weight in grams
    Weigh {
        /// Tare first, then read
        #[arg(long, action = ArgAction::SetTrue)]
        tare: bool,
    },
    /// Switch the work light
    Lamp {
        #[arg(value_enum)]
        state: LampState,
    },
    /// Derive a new scale reference unit from a known mass
    Calibrate {
        /// Mass that will be placed on the scale, in grams
        #[arg(long)]
        grams: f32,
    },
    /// Quick health check (peripherals present, one scale read)
    SelfCheck,
}
