use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum DoseError {
    #[error("valve index {index} out of range (rig has {num_valves} valves)")]
    InvalidIndex { index: usize, num_valves: usize },
    #[error("a dose is already in progress")]
    Busy,
    #[error("scale unavailable: {0}")]
    SensorUnavailable(String),
    #[error("actuator command failed: {0}")]
    Actuator(String),
    #[error("invalid state: {0}")]
    State(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing load cell")]
    MissingLoadCell,
    #[error("missing pwm bank")]
    MissingPwmBank,
    #[error("missing pump switch")]
    MissingPump,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
