pub mod clock;

pub use clock::{Clock, MonotonicClock};

pub trait LoadCell {
    fn read_raw(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<i32, Box<dyn std::error::Error + Send + Sync>>;
}

pub trait PwmBank {
    fn set_pulse(
        &mut self,
        channel: u8,
        ticks: u16,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

pub trait PumpSwitch {
    fn set_running(
        &mut self,
        on: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
