//! Shared test doubles: scripted peripherals, a command recorder, and a
//! manually advanced clock. Used by the unit tests, the integration tests,
//! and the benches; never by production assembly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use barkeep_traits::clock::Clock;
use barkeep_traits::{LoadCell, PumpSwitch, PwmBank};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Deterministic clock whose time only moves when something sleeps on it.
#[derive(Debug, Clone)]
pub struct SimClock {
    origin: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SimClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, d: Duration) {
        let mut off = self.lock();
        *off = off.saturating_add(d);
    }

    /// Simulated time since the clock was created.
    pub fn elapsed(&self) -> Duration {
        *self.lock()
    }

    fn lock(&self) -> MutexGuard<'_, Duration> {
        self.offset.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for SimClock {
    fn now(&self) -> Instant {
        self.origin + *self.lock()
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}

/// Everything the controller told the actuators, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RigCommand {
    Pulse { channel: u8, ticks: u16 },
    Pump { on: bool },
}

/// Shared, clonable recorder for [`RigCommand`]s.
#[derive(Debug, Clone, Default)]
pub struct CommandLog {
    commands: Arc<Mutex<Vec<RigCommand>>>,
}

impl CommandLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, cmd: RigCommand) {
        self.lock().push(cmd);
    }

    pub fn commands(&self) -> Vec<RigCommand> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RigCommand>> {
        self.commands.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// PWM bank that records pulses into a shared [`CommandLog`].
pub struct SpyPwm(pub CommandLog);

impl PwmBank for SpyPwm {
    fn set_pulse(&mut self, channel: u8, ticks: u16) -> Result<(), BoxError> {
        self.0.push(RigCommand::Pulse { channel, ticks });
        Ok(())
    }
}

/// Pump switch that records transitions into a shared [`CommandLog`].
pub struct SpyPump(pub CommandLog);

impl PumpSwitch for SpyPump {
    fn set_running(&mut self, on: bool) -> Result<(), BoxError> {
        self.0.push(RigCommand::Pump { on });
        Ok(())
    }
}

/// Pump that serves a fixed number of commands before failing, for
/// close-out best-effort tests. Successful commands are still recorded.
pub struct FlakyPump {
    pub log: CommandLog,
    ok_calls: usize,
    calls: usize,
}

impl FlakyPump {
    pub fn new(log: CommandLog, ok_calls: usize) -> Self {
        Self {
            log,
            ok_calls,
            calls: 0,
        }
    }
}

impl PumpSwitch for FlakyPump {
    fn set_running(&mut self, on: bool) -> Result<(), BoxError> {
        self.calls += 1;
        if self.calls > self.ok_calls {
            return Err(std::io::Error::other("pump driver fell over").into());
        }
        self.log.push(RigCommand::Pump { on });
        Ok(())
    }
}

/// Load cell that replays a fixed list of raw counts, repeating the last one
/// forever. Optionally starts failing after a number of good reads.
pub struct SeqCell {
    values: Vec<i32>,
    next: usize,
    fail_after: Option<(usize, &'static str)>,
    reads: Arc<AtomicUsize>,
}

impl SeqCell {
    pub fn new(values: Vec<i32>) -> Self {
        Self {
            values,
            next: 0,
            fail_after: None,
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Serve `ok_reads` readings, then error with `message`.
    pub fn failing_after(values: Vec<i32>, ok_reads: usize, message: &'static str) -> Self {
        Self {
            fail_after: Some((ok_reads, message)),
            ..Self::new(values)
        }
    }

    /// Counter of `read_raw` calls that survives the move into a controller.
    pub fn read_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.reads)
    }
}

impl LoadCell for SeqCell {
    fn read_raw(&mut self, _timeout: Duration) -> Result<i32, BoxError> {
        let n = self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some((ok_reads, message)) = self.fail_after
            && n >= ok_reads
        {
            return Err(std::io::Error::other(message).into());
        }
        let idx = self.next.min(self.values.len().saturating_sub(1));
        self.next += 1;
        Ok(self.values.get(idx).copied().unwrap_or(0))
    }
}
