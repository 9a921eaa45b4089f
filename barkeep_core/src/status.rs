//! Dose lifecycle types: request, phases, step status, and terminal outcomes.

use std::time::Duration;

/// Commanded position of the finger actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerPosition {
    Retracted,
    /// Above the dispense bell without pressing it
    Hover,
    /// Pressing the dispense bell
    Dispense,
}

/// One dose order: which valve, how many grams, how long to keep trying.
#[derive(Debug, Clone, Copy)]
pub struct DoseRequest {
    pub valve: usize,
    pub target_grams: f32,
    pub timeout: Duration,
}

impl DoseRequest {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(valve: usize, target_grams: f32) -> Self {
        Self {
            valve,
            target_grams,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// How a dose attempt ended. Timeouts and cancellations are outcomes rather
/// than errors: the rig was shut down normally and there is a result to
/// report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DoseOutcome {
    /// Target reached; carries the final measured weight in grams.
    Success(f32),
    /// Deadline passed before the target weight was seen.
    TimedOut,
    /// Cancelled from outside between weight polls.
    Cancelled,
}

/// Result of a single `step()` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DoseStatus {
    /// Mid-dose; call `step()` again.
    Running,
    /// Terminal; the rig is back in its resting state.
    Finished(DoseOutcome),
}

/// Where the controller currently is in the dose lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DosePhase {
    Idle,
    Taring,
    PumpRunning,
    Polling,
    Closing,
    Done,
}
