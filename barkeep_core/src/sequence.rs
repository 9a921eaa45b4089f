//! Gesture and maintenance operations built on the drivers.
//!
//! These are the caller-facing conveniences that do not involve the dose
//! state machine: finger pings, bulk valve close on startup, manual tare
//! and weigh, the work light, and the final shutdown sweep.

use barkeep_traits::{LoadCell, PumpSwitch, PwmBank};
use eyre::WrapErr;
use tracing::{info, warn};

use crate::controller::DosingController;
use crate::error::{Report, Result};
use crate::status::FingerPosition;

impl<C: LoadCell, B: PwmBank, P: PumpSwitch> DosingController<C, B, P> {
    /// Tap the finger between `Hover` and `Dispense` a number of times,
    /// then park it at `Hover` when `retract` is set, `Dispense` otherwise.
    pub fn ping(&mut self, times: u32, retract: bool) -> Result<()> {
        for _ in 0..times {
            self.actuator.set_finger(FingerPosition::Hover)?;
            self.clock.sleep(self.tuning.ping_delay);
            self.actuator.set_finger(FingerPosition::Dispense)?;
            self.clock.sleep(self.tuning.ping_delay);
        }
        let rest = if retract {
            FingerPosition::Hover
        } else {
            FingerPosition::Dispense
        };
        self.actuator.set_finger(rest)
    }

    /// Close every valve in ascending index order, pausing between valves
    /// so the PWM bank is not slewed all at once.
    pub fn close_all_valves(&mut self) -> Result<()> {
        let count = self.actuator.num_valves();
        for index in 0..count {
            self.actuator.set_valve(index, false)?;
            self.clock.sleep(self.tuning.close_delay);
        }
        info!(count, "all valves closed");
        Ok(())
    }

    pub fn finger(&mut self, position: FingerPosition) -> Result<()> {
        self.actuator.set_finger(position)
    }

    pub fn tare(&mut self) -> Result<()> {
        self.scale.tare().map(|_| ()).wrap_err("taring scale")
    }

    pub fn read_weight_grams(&mut self) -> Result<f32> {
        self.scale.read_grams().wrap_err("reading scale")
    }

    pub fn set_lamp(&mut self, on: bool) -> Result<()> {
        self.actuator.set_lamp(on)
    }

    /// Stop the pump outside of a dose, e.g. before a bulk valve close.
    pub fn stop_pump(&mut self) -> Result<()> {
        self.actuator.set_pump(false)
    }

    /// Best-effort shutdown sweep: pump off, every valve closed, lamp off.
    /// Every step is attempted even when an earlier one fails; the first
    /// error is returned once the sweep is complete. Peripheral handles are
    /// released when the controller is dropped.
    pub fn shutdown(&mut self) -> Result<()> {
        let mut first_err: Option<Report> = None;

        if let Err(e) = self.actuator.set_pump(false) {
            warn!(error = %e, "pump stop failed during shutdown");
            first_err.get_or_insert(e);
        }
        for index in 0..self.actuator.num_valves() {
            if let Err(e) = self.actuator.set_valve(index, false) {
                warn!(error = %e, valve = index, "valve close failed during shutdown");
                first_err.get_or_insert(e);
            }
        }
        if let Err(e) = self.actuator.set_lamp(false) {
            warn!(error = %e, "lamp off failed during shutdown");
            first_err.get_or_insert(e);
        }

        match first_err {
            Some(e) => Err(e),
            None => {
                info!("rig shut down");
                Ok(())
            }
        }
    }
}
