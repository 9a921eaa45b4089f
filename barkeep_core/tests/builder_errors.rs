use std::time::Duration;

use barkeep_core::mocks::{CommandLog, SeqCell, SpyPump, SpyPwm};
use barkeep_core::{
    BuildError, ControllerBuilder, DosingController, DosingTuning, FingerPositions, LampLevels,
    ScaleCalibration, ScaleSettings, ValveConfig,
};
use rstest::rstest;

type Builder = ControllerBuilder<SeqCell, SpyPwm, SpyPump>;

fn full_builder() -> ControllerBuilder<SeqCell, SpyPwm, SpyPump> {
    let log = CommandLog::new();
    DosingController::builder()
        .with_load_cell(SeqCell::new(vec![0]))
        .with_pwm_bank(SpyPwm(log.clone()))
        .with_pump(SpyPump(log))
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
            samples_per_read: 5,
            read_timeout: Duration::from_millis(150),
        })
}

#[test]
fn full_builder_builds() {
    full_builder().build().expect("complete builder must build");
}

#[test]
fn missing_load_cell_is_typed() {
    let log = CommandLog::new();
    let err = ControllerBuilder::<SeqCell, SpyPwm, SpyPump>::default()
        .with_pwm_bank(SpyPwm(log.clone()))
        .with_pump(SpyPump(log))
        .build()
        .expect_err("should fail without a load cell");
    assert!(matches!(err, BuildError::MissingLoadCell));
}

#[test]
fn missing_pwm_bank_is_typed() {
    let log = CommandLog::new();
    let err = ControllerBuilder::<SeqCell, SpyPwm, SpyPump>::default()
        .with_load_cell(SeqCell::new(vec![0]))
        .with_pump(SpyPump(log))
        .build()
        .expect_err("should fail without a pwm bank");
    assert!(matches!(err, BuildError::MissingPwmBank));
}

#[test]
fn missing_pump_is_typed() {
    let log = CommandLog::new();
    let err = ControllerBuilder::<SeqCell, SpyPwm, SpyPump>::default()
        .with_load_cell(SeqCell::new(vec![0]))
        .with_pwm_bank(SpyPwm(log))
        .build()
        .expect_err("should fail without a pump");
    assert!(matches!(err, BuildError::MissingPump));
}

#[rstest]
#[case::no_valves("valve", |b: Builder| b.with_valves(Vec::new()))]
#[case::zero_reference("reference_unit", |b: Builder| {
    b.with_scale_settings(ScaleSettings {
        calibration: ScaleCalibration::new(0.0),
        samples_per_read: 5,
        read_timeout: Duration::from_millis(150),
    })
})]
#[case::zero_samples("samples_per_read", |b: Builder| {
    b.with_scale_settings(ScaleSettings {
        calibration: ScaleCalibration::new(2145.0),
        samples_per_read: 0,
        read_timeout: Duration::from_millis(150),
    })
})]
#[case::zero_poll("poll_interval", |b: Builder| {
    b.with_tuning(DosingTuning {
        poll_interval: Duration::ZERO,
        ..DosingTuning::default()
    })
})]
fn invalid_settings_are_rejected(#[case] expected: &str, #[case] sabotage: fn(Builder) -> Builder) {
    let err = sabotage(full_builder())
        .build()
        .expect_err("sabotaged builder must fail");
    match err {
        BuildError::InvalidConfig(msg) => {
            assert!(msg.contains(expected), "message {msg:?} lacks {expected:?}")
        }
        other => panic!("expected InvalidConfig, got {other:?}"),
    }
}
