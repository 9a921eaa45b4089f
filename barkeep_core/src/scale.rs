//! Averaged weight sampling and tare handling on top of a [`LoadCell`].

use barkeep_traits::LoadCell;
use tracing::{debug, trace};

use crate::config::{ScaleCalibration, ScaleSettings};
use crate::error::Result;
use crate::hw_error::map_sensor_error;
use crate::util::div_round_nearest_i64;

pub struct ScaleDriver<C: LoadCell> {
    cell: C,
    settings: ScaleSettings,
}

impl<C: LoadCell> ScaleDriver<C> {
    pub fn new(cell: C, settings: ScaleSettings) -> Self {
        Self { cell, settings }
    }

    pub fn calibration(&self) -> ScaleCalibration {
        self.settings.calibration
    }

    /// Capture the current averaged raw reading as the new zero point.
    /// Returns the captured offset in raw counts.
    pub fn tare(&mut self) -> Result<i32> {
        let raw = self.read_raw_average()?;
        self.settings.calibration.tare_offset = raw;
        debug!(tare_offset = raw, "scale tared");
        Ok(raw)
    }

    /// Current weight in grams relative to the last tare.
    pub fn read_grams(&mut self) -> Result<f32> {
        let raw = self.read_raw_average()?;
        let grams = self.settings.calibration.to_grams(raw);
        trace!(raw, grams, "weight sample");
        Ok(grams)
    }

    fn read_raw_average(&mut self) -> Result<i32> {
        let samples = self.settings.samples_per_read.max(1);
        let mut sum: i64 = 0;
        for _ in 0..samples {
            let raw = self
                .cell
                .read_raw(self.settings.read_timeout)
                .map_err(|e| map_sensor_error(&*e))?;
            sum += i64::from(raw);
        }
        Ok(div_round_nearest_i64(sum, i64::from(samples)) as i32)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::DoseError;
    use crate::mocks::SeqCell;

    fn settings(reference_unit: f32, samples: u32) -> ScaleSettings {
        ScaleSettings {
            calibration: ScaleCalibration::new(reference_unit),
            samples_per_read: samples,
            read_timeout: Duration::from_millis(10),
        }
    }

    #[test]
    fn averages_the_configured_sample_count() {
        let cell = SeqCell::new(vec![10, 20, 30, 40]);
        let mut scale = ScaleDriver::new(cell, settings(1.0, 4));
        let grams = scale.read_grams().unwrap();
        assert!((grams - 25.0).abs() < f32::EPSILON);
    }

    #[test]
    fn tare_zeroes_the_next_reading() {
        // stable baseline, then a 100 g mass lands on the scale
        let cell = SeqCell::new(vec![8_399_241, 8_399_241 + 214_500]);
        let mut scale = ScaleDriver::new(cell, settings(2145.0, 1));
        let offset = scale.tare().unwrap();
        assert_eq!(offset, 8_399_241);
        let grams = scale.read_grams().unwrap();
        assert!((grams - 100.0).abs() < 1e-3);
    }

    #[test]
    fn average_rounds_ties_away_from_zero() {
        let cell = SeqCell::new(vec![3, 4]);
        let mut scale = ScaleDriver::new(cell, settings(1.0, 2));
        let grams = scale.read_grams().unwrap();
        assert!((grams - 4.0).abs() < f32::EPSILON);
    }

    #[test]
    fn read_failures_map_to_sensor_unavailable() {
        let cell = SeqCell::failing_after(vec![100], 1, "dt line stuck");
        let mut scale = ScaleDriver::new(cell, settings(1.0, 1));
        scale.read_grams().unwrap();
        let err = scale.read_grams().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DoseError>(),
            Some(DoseError::SensorUnavailable(_))
        ));
    }
}
