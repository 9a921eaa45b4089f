//! Closed-loop dose-to-weight control.
//!
//! `DosingController` owns the scale and actuator drivers and runs the dose
//! state machine: tare, pump on, valve open, poll the weight, then put the
//! rig back in its resting state exactly once per attempt no matter how the
//! attempt ends.

use std::sync::Arc;
use std::time::{Duration, Instant};

use barkeep_traits::clock::{Clock, MonotonicClock};
use barkeep_traits::{LoadCell, PumpSwitch, PwmBank};
use tracing::{info, warn};

use crate::actuator::ActuatorDriver;
use crate::cancel::CancelToken;
use crate::config::{DosingTuning, FingerPositions, LampLevels, ScaleSettings, ValveConfig};
use crate::error::{BuildError, DoseError, Report, Result};
use crate::scale::ScaleDriver;
use crate::status::{DoseOutcome, DosePhase, DoseRequest, DoseStatus};

struct ActiveDose {
    valve: usize,
    target_grams: f32,
    timeout: Duration,
    pump_started: Option<Instant>,
    outcome: Option<DoseOutcome>,
}

pub struct DosingController<C: LoadCell, B: PwmBank, P: PumpSwitch> {
    pub(crate) scale: ScaleDriver<C>,
    pub(crate) actuator: ActuatorDriver<B, P>,
    pub(crate) tuning: DosingTuning,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    cancel: CancelToken,
    phase: DosePhase,
    active: Option<ActiveDose>,
    last_grams: Option<f32>,
}

impl<C: LoadCell, B: PwmBank, P: PumpSwitch> std::fmt::Debug for DosingController<C, B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DosingController")
            .field("phase", &self.phase)
            .field("last_grams", &self.last_grams)
            .finish()
    }
}

impl<C: LoadCell, B: PwmBank, P: PumpSwitch> DosingController<C, B, P> {
    pub fn builder() -> ControllerBuilder<C, B, P> {
        ControllerBuilder::default()
    }

    pub fn phase(&self) -> DosePhase {
        self.phase
    }

    /// Clone of the token this controller checks between weight polls.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn num_valves(&self) -> usize {
        self.actuator.num_valves()
    }

    /// Weight seen at the most recent poll of the current or last dose.
    pub fn last_weight(&self) -> Option<f32> {
        self.last_grams
    }

    /// Start a dose attempt. Validates the request and arms the state
    /// machine; no hardware is touched until the first `step()`.
    pub fn begin_dose(&mut self, request: DoseRequest) -> Result<()> {
        if self.phase != DosePhase::Idle {
            return Err(Report::new(DoseError::Busy));
        }
        if !request.target_grams.is_finite() {
            return Err(Report::new(DoseError::State(
                "target grams must be finite".to_string(),
            )));
        }
        let num_valves = self.actuator.num_valves();
        if request.valve >= num_valves {
            return Err(Report::new(DoseError::InvalidIndex {
                index: request.valve,
                num_valves,
            }));
        }

        info!(
            valve = request.valve,
            target_g = request.target_grams,
            timeout_ms = request.timeout.as_millis() as u64,
            "dose start"
        );

        self.last_grams = None;
        let mut dose = ActiveDose {
            valve: request.valve,
            target_grams: request.target_grams,
            timeout: request.timeout,
            pump_started: None,
            outcome: None,
        };

        if request.target_grams <= 0.0 {
            // Nothing to pour; skip the pump entirely but still run the
            // close-out so the rig ends in its resting state.
            dose.outcome = Some(DoseOutcome::Success(0.0));
            self.active = Some(dose);
            self.phase = DosePhase::Closing;
        } else {
            self.active = Some(dose);
            self.phase = DosePhase::Taring;
        }
        Ok(())
    }

    /// Advance the dose state machine by one transition or one weight poll.
    pub fn step(&mut self) -> Result<DoseStatus> {
        match self.phase {
            DosePhase::Idle => Err(Report::new(DoseError::State(
                "no dose in progress".to_string(),
            ))),
            DosePhase::Taring => {
                if let Err(e) = self.scale.tare() {
                    return Err(self.abort(e.wrap_err("taring before dose")));
                }
                self.phase = DosePhase::PumpRunning;
                Ok(DoseStatus::Running)
            }
            DosePhase::PumpRunning => {
                if let Err(e) = self.actuator.set_pump(true) {
                    return Err(self.abort(e.wrap_err("starting pump")));
                }
                let valve = match self.active.as_ref() {
                    Some(dose) => dose.valve,
                    None => return Err(self.lost_state()),
                };
                if let Err(e) = self.actuator.set_valve(valve, true) {
                    return Err(self.abort(e.wrap_err("opening valve")));
                }
                let now = self.clock.now();
                if let Some(dose) = self.active.as_mut() {
                    dose.pump_started = Some(now);
                }
                self.phase = DosePhase::Polling;
                Ok(DoseStatus::Running)
            }
            DosePhase::Polling => self.poll(),
            DosePhase::Closing => {
                self.close_out();
                self.phase = DosePhase::Done;
                Ok(DoseStatus::Running)
            }
            DosePhase::Done => {
                let outcome = match self.active.take().and_then(|dose| dose.outcome) {
                    Some(outcome) => outcome,
                    None => {
                        self.phase = DosePhase::Idle;
                        return Err(self.lost_state());
                    }
                };
                self.phase = DosePhase::Idle;
                match outcome {
                    DoseOutcome::Success(final_g) => info!(final_g, "dose complete"),
                    DoseOutcome::TimedOut => warn!("dose timed out"),
                    DoseOutcome::Cancelled => warn!("dose cancelled"),
                }
                Ok(DoseStatus::Finished(outcome))
            }
        }
    }

    /// Run a dose to completion on the calling thread.
    pub fn dose(&mut self, request: DoseRequest) -> Result<DoseOutcome> {
        self.begin_dose(request)?;
        loop {
            match self.step()? {
                DoseStatus::Running => {}
                DoseStatus::Finished(outcome) => return Ok(outcome),
            }
        }
    }

    fn poll(&mut self) -> Result<DoseStatus> {
        if self.cancel.is_cancelled() {
            self.finish_with(DoseOutcome::Cancelled);
            return Ok(DoseStatus::Running);
        }

        let grams = match self.scale.read_grams() {
            Ok(grams) => grams,
            Err(e) => return Err(self.abort(e.wrap_err("reading scale"))),
        };
        self.last_grams = Some(grams);

        let (target_grams, timeout, pump_started) = match self.active.as_ref() {
            Some(dose) => (dose.target_grams, dose.timeout, dose.pump_started),
            None => return Err(self.lost_state()),
        };

        if grams >= target_grams {
            self.finish_with(DoseOutcome::Success(grams));
            return Ok(DoseStatus::Running);
        }

        let elapsed = pump_started
            .map(|started| self.clock.now().saturating_duration_since(started))
            .unwrap_or_default();
        if elapsed > timeout {
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                grams,
                target_g = target_grams,
                "dose deadline passed"
            );
            self.finish_with(DoseOutcome::TimedOut);
            return Ok(DoseStatus::Running);
        }

        self.clock.sleep(self.tuning.poll_interval);
        Ok(DoseStatus::Running)
    }

    fn finish_with(&mut self, outcome: DoseOutcome) {
        if let Some(dose) = self.active.as_mut() {
            dose.outcome = Some(outcome);
        }
        self.phase = DosePhase::Closing;
    }

    /// Shut the rig down after a hard failure and reset to Idle. This is the
    /// one close-out for the attempt; Closing will not run again.
    fn abort(&mut self, err: Report) -> Report {
        self.close_out();
        self.active = None;
        self.phase = DosePhase::Idle;
        err
    }

    /// Pump off first, then the active valve; the valve close is attempted
    /// even when the pump command fails.
    fn close_out(&mut self) {
        if let Err(e) = self.actuator.set_pump(false) {
            warn!(error = %e, "pump stop failed during close-out");
        }
        if let Some(valve) = self.active.as_ref().map(|dose| dose.valve) {
            if let Err(e) = self.actuator.set_valve(valve, false) {
                warn!(error = %e, "valve close failed during close-out");
            }
        }
    }

    fn lost_state(&self) -> Report {
        Report::new(DoseError::State("dose bookkeeping lost".to_string()))
    }
}

pub struct ControllerBuilder<C: LoadCell, B: PwmBank, P: PumpSwitch> {
    cell: Option<C>,
    pwm: Option<B>,
    pump: Option<P>,
    valves: Vec<ValveConfig>,
    finger: Option<FingerPositions>,
    lamp: Option<LampLevels>,
    scale: Option<ScaleSettings>,
    tuning: DosingTuning,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    cancel: Option<CancelToken>,
}

impl<C: LoadCell, B: PwmBank, P: PumpSwitch> Default for ControllerBuilder<C, B, P> {
    fn default() -> Self {
        Self {
            cell: None,
            pwm: None,
            pump: None,
            valves: Vec::new(),
            finger: None,
            lamp: None,
            scale: None,
            tuning: DosingTuning::default(),
            clock: None,
            cancel: None,
        }
    }
}

impl<C: LoadCell, B: PwmBank, P: PumpSwitch> ControllerBuilder<C, B, P> {
    #[must_use]
    pub fn with_load_cell(mut self, cell: C) -> Self {
        self.cell = Some(cell);
        self
    }

    #[must_use]
    pub fn with_pwm_bank(mut self, pwm: B) -> Self {
        self.pwm = Some(pwm);
        self
    }

    #[must_use]
    pub fn with_pump(mut self, pump: P) -> Self {
        self.pump = Some(pump);
        self
    }

    #[must_use]
    pub fn with_valves(mut self, valves: Vec<ValveConfig>) -> Self {
        self.valves = valves;
        self
    }

    #[must_use]
    pub fn with_finger(mut self, finger: FingerPositions) -> Self {
        self.finger = Some(finger);
        self
    }

    #[must_use]
    pub fn with_lamp(mut self, lamp: LampLevels) -> Self {
        self.lamp = Some(lamp);
        self
    }

    #[must_use]
    pub fn with_scale_settings(mut self, settings: ScaleSettings) -> Self {
        self.scale = Some(settings);
        self
    }

    #[must_use]
    pub fn with_tuning(mut self, tuning: DosingTuning) -> Self {
        self.tuning = tuning;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn build(self) -> std::result::Result<DosingController<C, B, P>, BuildError> {
        let cell = self.cell.ok_or(BuildError::MissingLoadCell)?;
        let pwm = self.pwm.ok_or(BuildError::MissingPwmBank)?;
        let pump = self.pump.ok_or(BuildError::MissingPump)?;
        if self.valves.is_empty() {
            return Err(BuildError::InvalidConfig("at least one valve is required"));
        }
        let finger = self
            .finger
            .ok_or(BuildError::InvalidConfig("finger positions are required"))?;
        let lamp = self
            .lamp
            .ok_or(BuildError::InvalidConfig("lamp levels are required"))?;
        let scale = self
            .scale
            .ok_or(BuildError::InvalidConfig("scale settings are required"))?;
        if !scale.calibration.reference_unit.is_finite() || scale.calibration.reference_unit == 0.0
        {
            return Err(BuildError::InvalidConfig(
                "reference_unit must be finite and non-zero",
            ));
        }
        if scale.samples_per_read == 0 {
            return Err(BuildError::InvalidConfig("samples_per_read must be >= 1"));
        }
        if self.tuning.poll_interval.is_zero() {
            return Err(BuildError::InvalidConfig("poll_interval must be non-zero"));
        }

        Ok(DosingController {
            scale: ScaleDriver::new(cell, scale),
            actuator: ActuatorDriver::new(pwm, pump, self.valves, finger, lamp),
            tuning: self.tuning,
            clock: self
                .clock
                .unwrap_or_else(|| Arc::new(MonotonicClock::new())),
            cancel: self.cancel.unwrap_or_default(),
            phase: DosePhase::Idle,
            active: None,
            last_grams: None,
        })
    }
}
