use std::thread;
use std::time::{Duration, Instant};

/// Time source used by the dosing loop and the gesture sequences.
///
/// - now(): returns a monotonic Instant
/// - sleep(): blocks for the given duration (implementations may simulate)
/// - ms_since(): elapsed milliseconds from an epoch Instant
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, d: Duration);

    /// Milliseconds elapsed since `epoch`, saturating at 0 on underflow.
    fn ms_since(&self, epoch: Instant) -> u64 {
        let dur = self.now().saturating_duration_since(epoch);
        dur.as_millis() as u64
    }
}

/// Real-time monotonic clock backed by std::time::Instant.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    #[inline]
    fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        thread::sleep(d);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ms_since_saturates_for_future_epochs() {
        let clock = MonotonicClock::new();
        let future = clock.now() + Duration::from_secs(60);
        assert_eq!(clock.ms_since(future), 0);
    }

    #[test]
    fn zero_sleep_returns_immediately() {
        let clock = MonotonicClock::new();
        let before = clock.now();
        clock.sleep(Duration::ZERO);
        assert!(clock.now().saturating_duration_since(before) < Duration::from_millis(50));
    }

    #[test]
    fn ms_since_counts_forward() {
        let clock = MonotonicClock::new();
        let epoch = clock.now();
        clock.sleep(Duration::from_millis(5));
        assert!(clock.ms_since(epoch) >= 5);
    }
}
