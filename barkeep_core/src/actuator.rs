//! Valve, finger, lamp, and pump commands behind one driver.

use barkeep_traits::{PumpSwitch, PwmBank};
use tracing::debug;

use crate::config::{FingerPositions, LampLevels, ValveConfig};
use crate::error::{DoseError, Result};
use crate::hw_error::map_actuator_error;
use crate::status::FingerPosition;

pub struct ActuatorDriver<B: PwmBank, P: PumpSwitch> {
    pwm: B,
    pump: P,
    valves: Vec<ValveConfig>,
    finger: FingerPositions,
    lamp: LampLevels,
}

impl<B: PwmBank, P: PumpSwitch> ActuatorDriver<B, P> {
    pub fn new(
        pwm: B,
        pump: P,
        valves: Vec<ValveConfig>,
        finger: FingerPositions,
        lamp: LampLevels,
    ) -> Self {
        Self {
            pwm,
            pump,
            valves,
            finger,
            lamp,
        }
    }

    pub fn num_valves(&self) -> usize {
        self.valves.len()
    }

    /// Bounds-checked valve move; no hardware is touched on a bad index.
    pub fn set_valve(&mut self, index: usize, open: bool) -> Result<()> {
        let num_valves = self.valves.len();
        let valve = self
            .valves
            .get(index)
            .copied()
            .ok_or(DoseError::InvalidIndex { index, num_valves })?;
        let ticks = valve.ticks_for(open);
        self.pwm
            .set_pulse(valve.channel, ticks)
            .map_err(|e| map_actuator_error(&*e))?;
        debug!(index, open, channel = valve.channel, ticks, "valve moved");
        Ok(())
    }

    pub fn set_finger(&mut self, position: FingerPosition) -> Result<()> {
        let ticks = self.finger.ticks_for(position);
        self.pwm
            .set_pulse(self.finger.channel, ticks)
            .map_err(|e| map_actuator_error(&*e))?;
        debug!(?position, ticks, "finger moved");
        Ok(())
    }

    pub fn set_lamp(&mut self, on: bool) -> Result<()> {
        let ticks = if on {
            self.lamp.on_ticks
        } else {
            self.lamp.off_ticks
        };
        self.pwm
            .set_pulse(self.lamp.channel, ticks)
            .map_err(|e| map_actuator_error(&*e))?;
        debug!(on, "lamp switched");
        Ok(())
    }

    pub fn set_pump(&mut self, on: bool) -> Result<()> {
        self.pump
            .set_running(on)
            .map_err(|e| map_actuator_error(&*e))?;
        debug!(on, "pump commanded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{CommandLog, RigCommand, SpyPump, SpyPwm};

    fn driver(log: &CommandLog) -> ActuatorDriver<SpyPwm, SpyPump> {
        let valves = vec![
            ValveConfig {
                channel: 0,
                open_ticks: 375,
                closed_ticks: 535,
            },
            ValveConfig {
                channel: 1,
                open_ticks: 375,
                closed_ticks: 510,
            },
        ];
        let finger = FingerPositions {
            channel: 12,
            retracted: 280,
            hover: 430,
            dispense: 450,
        };
        let lamp = LampLevels {
            channel: 13,
            on_ticks: 500,
            off_ticks: 0,
        };
        ActuatorDriver::new(SpyPwm(log.clone()), SpyPump(log.clone()), valves, finger, lamp)
    }

    #[test]
    fn valve_moves_use_that_valves_endpoints() {
        let log = CommandLog::new();
        let mut driver = driver(&log);
        driver.set_valve(1, true).unwrap();
        driver.set_valve(1, false).unwrap();
        assert_eq!(
            log.commands(),
            vec![
                RigCommand::Pulse {
                    channel: 1,
                    ticks: 375
                },
                RigCommand::Pulse {
                    channel: 1,
                    ticks: 510
                },
            ]
        );
    }

    #[test]
    fn out_of_range_indices_send_nothing() {
        let log = CommandLog::new();
        let mut driver = driver(&log);
        let err = driver.set_valve(2, true).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DoseError>(),
            Some(DoseError::InvalidIndex {
                index: 2,
                num_valves: 2
            })
        ));
        assert!(log.is_empty());
    }

    #[test]
    fn lamp_uses_its_duty_endpoints() {
        let log = CommandLog::new();
        let mut driver = driver(&log);
        driver.set_lamp(true).unwrap();
        driver.set_lamp(false).unwrap();
        assert_eq!(
            log.commands(),
            vec![
                RigCommand::Pulse {
                    channel: 13,
                    ticks: 500
                },
                RigCommand::Pulse {
                    channel: 13,
                    ticks: 0
                },
            ]
        );
    }
}
