//! Quick Start Example
//!
//! This example demonstrates how to set up and run a simulated pour using the
//! barkeep library crates.

use barkeep_core::{
    DoseOutcome, DoseRequest, DoseStatus, DosingController, DosingTuning, FingerPositions,
    LampLevels, ScaleCalibration, ScaleSettings, ValveConfig,
};
use barkeep_hardware::sim::SimRig;
use barkeep_traits::{Clock, MonotonicClock};
use std::sync::Arc;
use std::time::Duration;

/// Runs a simulated pour with a target of 18.5 grams from valve 0.
///
/// # Parameters
///
/// - No parameters; configuration is hardcoded for demonstration.
///
/// # Usage
///
/// This example is intended to be run as a standalone binary or via
/// `cargo run -p barkeep_cli --example quick_start`. It demonstrates the
/// minimal setup required to drive the dosing loop in simulation mode: no
/// hardware is touched, and the simulated rig gains weight whenever the pump
/// runs.
///
/// # Errors
///
/// Returns an error if configuration or dosing fails, surfaced as an
/// `eyre::Report`.
///
/// # See Also
///
/// - [barkeep README](../../README.md)
fn main() -> Result<(), eyre::Report> {
    // One shared state behind every simulated peripheral
    let rig = SimRig::new(2145.0);

    // Local monotonic clock for print throttling in this example
    let clock = MonotonicClock::new();

    // Build a controller with simulated hardware and pass a clock into the builder
    let mut controller = DosingController::builder()
        .with_load_cell(rig.load_cell())
        .with_pwm_bank(rig.pwm_bank())
        .with_pump(rig.pump())
        .with_valves(vec![ValveConfig {
            channel: 0,
            open_ticks: 375,
            closed_ticks: 535,
        }])
        .with_finger(FingerPositions {
            channel: 12,
            retracted: 280,
            hover: 430,
            dispense: 450,
        })
        .with_lamp(LampLevels {
            channel: 13,
            on_ticks: 500,
            off_ticks: 0,
        })
        .with_scale_settings(ScaleSettings {
            calibration: ScaleCalibration::new(2145.0),
            samples_per_read: 1,
            read_timeout: Duration::from_millis(100),
        })
        .with_tuning(DosingTuning {
            poll_interval: Duration::from_millis(20),
            ..DosingTuning::default()
        })
        .with_clock(Arc::new(clock))
        .build()?;

    controller.begin_dose(DoseRequest::new(0, 18.5))?;

    // step() paces itself from the tuning's poll interval; throttle the
    // console prints separately
    let mut last_print = clock.now();

    loop {
        match controller.step()? {
            DoseStatus::Running => {
                if clock.ms_since(last_print) >= 200 {
                    if let Some(grams) = controller.last_weight() {
                        println!("weight = {grams:.3} g");
                    }
                    last_print = clock.now();
                }
            }
            DoseStatus::Finished(DoseOutcome::Success(grams)) => {
                println!("Pour complete at {grams:.3} g");
                break;
            }
            DoseStatus::Finished(DoseOutcome::TimedOut) => {
                println!("Pour timed out before reaching the target");
                break;
            }
            DoseStatus::Finished(DoseOutcome::Cancelled) => {
                println!("Pour cancelled");
                break;
            }
        }
    }

    Ok(())
}
