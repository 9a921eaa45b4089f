#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core dispensing logic (hardware-agnostic).
//!
//! This crate provides the hardware-independent dispensing engine. All
//! hardware interactions go through the `barkeep_traits::LoadCell`,
//! `barkeep_traits::PwmBank` and `barkeep_traits::PumpSwitch` traits.
//!
//! ## Architecture
//!
//! - **Scale**: tare capture and averaged raw-to-grams reads (`scale` module)
//! - **Actuation**: valve / finger / lamp pulse mapping and pump switching
//!   (`actuator` module)
//! - **Dosing**: the dose-to-weight state machine (`controller` module)
//! - **Gestures**: ping, bulk valve close, shutdown sweep (`sequence` module)
//! - **Configuration**: domain config structs (`config` module) plus
//!   conversions from the `barkeep_config` TOML schema (`conversions` module)
//! - **Status**: request, outcome and phase types (`status` module)

pub mod actuator;
pub mod cancel;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod error;
pub mod hw_error;
pub mod mocks;
pub mod scale;
pub mod sequence;
pub mod status;
pub mod util;

pub use actuator::ActuatorDriver;
pub use cancel::CancelToken;
pub use config::{
    DosingTuning, FingerPositions, LampLevels, ScaleCalibration, ScaleSettings, ValveConfig,
};
pub use controller::{ControllerBuilder, DosingController};
pub use error::{BuildError, DoseError, Report, Result};
pub use scale::ScaleDriver;
pub use status::{DoseOutcome, DosePhase, DoseRequest, DoseStatus, FingerPosition};
