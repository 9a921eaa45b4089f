//! Rig assembly and command execution: maps the parsed CLI onto the
//! dispensing engine, selecting simulated or real peripherals at compile
//! time.

use std::time::{Duration, Instant};

use barkeep_config::Config;
use barkeep_core::{
    DoseOutcome, DoseRequest, DosingController, DosingTuning, FingerPosition,
};
use barkeep_traits::{LoadCell, PumpSwitch, PwmBank};
use eyre::{Result, WrapErr};
use serde_json::json;
use tracing::info;

use crate::cli::{Commands, FingerPos, LampState};

/// Exit codes for dose outcomes that are not plain success.
pub const EXIT_CANCELLED: i32 = 2;
pub const EXIT_TIMED_OUT: i32 = 4;

pub fn run(cmd: &Commands, cfg: &Config, json: bool) -> Result<i32> {
    #[cfg(not(feature = "hardware"))]
    let controller = build_sim_controller(cfg)?;
    #[cfg(feature = "hardware")]
    let controller = build_hardware_controller(cfg)?;
    execute(controller, cmd, cfg, json)
}

#[cfg(not(feature = "hardware"))]
fn build_sim_controller(
    cfg: &Config,
) -> Result<
    DosingController<
        barkeep_hardware::sim::SimLoadCell,
        barkeep_hardware::sim::SimPwmBank,
        barkeep_hardware::sim::SimPump,
    >,
> {
    let rig = barkeep_hardware::sim::SimRig::new(cfg.scale.reference_unit);
    info!(backend = "sim", "peripherals ready");
    assemble(rig.load_cell(), rig.pwm_bank(), rig.pump(), cfg)
}

#[cfg(feature = "hardware")]
fn build_hardware_controller(
    cfg: &Config,
) -> Result<
    DosingController<
        barkeep_hardware::hx711::HardwareLoadCell,
        barkeep_hardware::pca9685::Pca9685Bank,
        barkeep_hardware::pump::GpioPump,
    >,
> {
    let cell = barkeep_hardware::hx711::HardwareLoadCell::open(cfg.scale.dt_pin, cfg.scale.sck_pin)
        .wrap_err("open hx711")?;
    let pwm = barkeep_hardware::pca9685::Pca9685Bank::open(
        &cfg.pwm.i2c_bus,
        cfg.pwm.i2c_address,
        cfg.pwm.frequency_hz,
    )
    .wrap_err("open pwm bank")?;
    let pump = barkeep_hardware::pump::GpioPump::open(cfg.pump.pin).wrap_err("open pump pin")?;
    info!(
        backend = "hardware",
        bus = %cfg.pwm.i2c_bus,
        "peripherals ready"
    );
    assemble(cell, pwm, pump, cfg)
}

fn assemble<C: LoadCell, B: PwmBank, P: PumpSwitch>(
    cell: C,
    pwm: B,
    pump: P,
    cfg: &Config,
) -> Result<DosingController<C, B, P>> {
    let controller = DosingController::builder()
        .with_load_cell(cell)
        .with_pwm_bank(pwm)
        .with_pump(pump)
        .with_valves(cfg.valves.iter().map(Into::into).collect())
        .with_finger((&cfg.finger).into())
        .with_lamp((&cfg.lamp).into())
        .with_scale_settings((&cfg.scale).into())
        .with_tuning((&cfg.dosing).into())
        .build()?;
    Ok(controller)
}

fn execute<C: LoadCell, B: PwmBank, P: PumpSwitch>(
    mut controller: DosingController<C, B, P>,
    cmd: &Commands,
    cfg: &Config,
    json: bool,
) -> Result<i32> {
    match cmd {
        Commands::Dose {
            valve,
            grams,
            timeout_s,
        } => {
            let cancel = controller.cancel_token();
            ctrlc::set_handler(move || cancel.cancel()).wrap_err("install Ctrl-C handler")?;

            let tuning: DosingTuning = (&cfg.dosing).into();
            let timeout = timeout_s
                .map(Duration::from_secs)
                .unwrap_or(tuning.default_timeout);
            let request = DoseRequest::new(*valve, *grams).with_timeout(timeout);

            let start = Instant::now();
            let outcome = controller.dose(request)?;
            let elapsed = start.elapsed();

            match outcome {
                DoseOutcome::Success(final_g) => {
                    if json {
                        println!(
                            "{}",
                            json!({
                                "outcome": "success",
                                "valve": valve,
                                "target_g": grams,
                                "final_g": final_g,
                                "elapsed_ms": elapsed.as_millis() as u64,
                            })
                        );
                    } else {
                        println!(
                            "Dispensed {final_g:.1} g from valve {valve} in {:.1} s",
                            elapsed.as_secs_f32()
                        );
                    }
                    Ok(0)
                }
                DoseOutcome::TimedOut => {
                    let at_g = controller.last_weight().unwrap_or(0.0);
                    if json {
                        println!(
                            "{}",
                            json!({
                                "outcome": "timed_out",
                                "valve": valve,
                                "target_g": grams,
                                "final_g": at_g,
                                "elapsed_ms": elapsed.as_millis() as u64,
                            })
                        );
                    } else {
                        println!(
                            "Dose timed out after {:.1} s at {at_g:.1} g (target {grams} g)",
                            elapsed.as_secs_f32()
                        );
                    }
                    Ok(EXIT_TIMED_OUT)
                }
                DoseOutcome::Cancelled => {
                    let at_g = controller.last_weight().unwrap_or(0.0);
                    if json {
                        println!(
                            "{}",
                            json!({
                                "outcome": "cancelled",
                                "valve": valve,
                                "target_g": grams,
                                "final_g": at_g,
                                "elapsed_ms": elapsed.as_millis() as u64,
                            })
                        );
                    } else {
                        println!("Dose cancelled at {at_g:.1} g (target {grams} g)");
                    }
                    Ok(EXIT_CANCELLED)
                }
            }
        }
        Commands::Ping { times, stay } => {
            controller.ping(*times, !*stay)?;
            if json {
                println!("{}", json!({ "pinged": times }));
            } else {
                println!("Pinged {times}x");
            }
            Ok(0)
        }
        Commands::Finger { position } => {
            let position = match position {
                FingerPos::Retracted => FingerPosition::Retracted,
                FingerPos::Hover => FingerPosition::Hover,
                FingerPos::Dispense => FingerPosition::Dispense,
            };
            controller.finger(position)?;
            if json {
                println!("{}", json!({ "finger": format!("{position:?}") }));
            } else {
                println!("Finger parked at {position:?}");
            }
            Ok(0)
        }
        Commands::CloseAll => {
            // Pump off before touching the bank, like the startup reset.
            controller.stop_pump()?;
            controller.close_all_valves()?;
            let count = controller.num_valves();
            if json {
                println!("{}", json!({ "closed": count }));
            } else {
                println!("Closed {count} valves");
            }
            Ok(0)
        }
        Commands::Tare => {
            controller.tare()?;
            if json {
                println!("{}", json!({ "tared": true }));
            } else {
                println!("Scale zeroed");
            }
            Ok(0)
        }
        Commands::Weigh { tare } => {
            if *tare {
                controller.tare()?;
            }
            let grams = controller.read_weight_grams()?;
            if json {
                println!("{}", json!({ "weight_g": grams }));
            } else {
                println!("{grams:.2} g");
            }
            Ok(0)
        }
        Commands::Lamp { state } => {
            let on = matches!(state, LampState::On);
            controller.set_lamp(on)?;
            if json {
                println!("{}", json!({ "lamp": on }));
            } else {
                println!("Lamp {}", if on { "on" } else { "off" });
            }
            Ok(0)
        }
        Commands::Calibrate { grams } => calibrate(&mut controller, cfg, *grams, json),
        Commands::SelfCheck => {
            let grams = controller.read_weight_grams()?;
            let valves = controller.num_valves();
            if json {
                println!("{}", json!({ "status": "ok", "weight_g": grams, "valves": valves }));
            } else {
                println!("ok: scale reads {grams:.1} g, {valves} valves configured");
            }
            Ok(0)
        }
    }
}

/// Interactive reference-unit calibration: tare, wait for the operator to
/// load the known mass, then derive counts-per-gram from the measured delta.
fn calibrate<C: LoadCell, B: PwmBank, P: PumpSwitch>(
    controller: &mut DosingController<C, B, P>,
    cfg: &Config,
    known_grams: f32,
    json: bool,
) -> Result<i32> {
    if !known_grams.is_finite() || known_grams <= 0.0 {
        eyre::bail!("calibration mass must be positive");
    }

    controller.tare().wrap_err("taring for calibration")?;
    eprintln!("Place the {known_grams} g reference mass on the scale, then press Enter.");
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .wrap_err("waiting for confirmation")?;

    let measured = controller
        .read_weight_grams()
        .wrap_err("reading the reference mass")?;
    if measured <= 0.0 {
        eyre::bail!("scale saw no weight change; is the mass on the platform?");
    }

    // measured = delta_counts / current_unit, so the corrected unit scales
    // by measured / known.
    let current = cfg.scale.reference_unit;
    let suggested = current * measured / known_grams;
    info!(measured_g = measured, suggested, "calibration sample");

    if json {
        println!(
            "{}",
            json!({ "measured_g": measured, "reference_unit": suggested })
        );
    } else {
        println!("Measured {measured:.2} g with the current reference unit.");
        println!("Set scale.reference_unit = {suggested:.1} and rerun to verify.");
    }
    Ok(0)
}
