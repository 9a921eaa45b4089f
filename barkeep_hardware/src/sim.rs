use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use barkeep_traits::{LoadCell, PumpSwitch, PwmBank};
use tracing::trace;

use crate::error::HwError;

/// Env var overriding the simulated flow rate in grams per scale read.
pub const SIM_FLOW_ENV: &str = "BARKEEP_SIM_FLOW_GPR";

const DEFAULT_FLOW_G_PER_READ: f32 = 0.5;
const NUM_CHANNELS: usize = 16;

#[derive(Debug)]
struct SimState {
    pump_on: bool,
    grams: f32,
    channel_ticks: [Option<u16>; NUM_CHANNELS],
}

/// Software rig standing in for the whole peripheral set.
///
/// Liquid "flows" whenever the pump runs: every scale read while the pump is
/// on adds a fixed number of grams. That is enough to drive the dosing loop
/// end to end without a Pi on the desk.
#[derive(Clone)]
pub struct SimRig {
    reference_unit: f32,
    flow_g_per_read: f32,
    state: Arc<Mutex<SimState>>,
}

impl SimRig {
    /// Rig with the flow rate taken from `BARKEEP_SIM_FLOW_GPR` when set.
    pub fn new(reference_unit: f32) -> Self {
        let flow = std::env::var(SIM_FLOW_ENV)
            .ok()
            .and_then(|v| v.parse::<f32>().ok())
            .unwrap_or(DEFAULT_FLOW_G_PER_READ);
        Self::with_flow(reference_unit, flow)
    }

    pub fn with_flow(reference_unit: f32, flow_g_per_read: f32) -> Self {
        Self {
            reference_unit,
            flow_g_per_read,
            state: Arc::new(Mutex::new(SimState {
                pump_on: false,
                grams: 0.0,
                channel_ticks: [None; NUM_CHANNELS],
            })),
        }
    }

    pub fn load_cell(&self) -> SimLoadCell {
        SimLoadCell { rig: self.clone() }
    }

    pub fn pwm_bank(&self) -> SimPwmBank {
        SimPwmBank { rig: self.clone() }
    }

    pub fn pump(&self) -> SimPump {
        SimPump { rig: self.clone() }
    }

    /// Current simulated weight on the scale.
    pub fn grams(&self) -> f32 {
        self.lock().grams
    }

    /// Preload the scale, e.g. to start a scenario mid-pour.
    pub fn set_grams(&self, grams: f32) {
        self.lock().grams = grams;
    }

    pub fn pump_running(&self) -> bool {
        self.lock().pump_on
    }

    /// Last tick value commanded on a PWM channel, if any.
    pub fn channel_ticks(&self, channel: u8) -> Option<u16> {
        self.lock()
            .channel_ticks
            .get(channel as usize)
            .copied()
            .flatten()
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct SimLoadCell {
    rig: SimRig,
}

impl LoadCell for SimLoadCell {
    fn read_raw(
        &mut self,
        _timeout: Duration,
    ) -> Result<i32, Box<dyn std::error::Error + Send + Sync>> {
        let mut state = self.rig.lock();
        if state.pump_on {
            state.grams += self.rig.flow_g_per_read;
        }
        let raw = (state.grams * self.rig.reference_unit).round() as i32;
        trace!(raw, grams = state.grams, "simulated scale read");
        Ok(raw)
    }
}

pub struct SimPwmBank {
    rig: SimRig,
}

impl PwmBank for SimPwmBank {
    fn set_pulse(
        &mut self,
        channel: u8,
        ticks: u16,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if channel as usize >= NUM_CHANNELS {
            return Err(HwError::Pwm(format!("channel {channel} out of range")).into());
        }
        if ticks > 4095 {
            return Err(HwError::Pwm(format!("ticks {ticks} above 12-bit range")).into());
        }
        self.rig.lock().channel_ticks[channel as usize] = Some(ticks);
        trace!(channel, ticks, "simulated pwm pulse");
        Ok(())
    }
}

pub struct SimPump {
    rig: SimRig,
}

impl PumpSwitch for SimPump {
    fn set_running(
        &mut self,
        on: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.rig.lock().pump_on = on;
        trace!(on, "simulated pump switched");
        Ok(())
    }
}
