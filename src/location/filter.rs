// src/location/filter.rs
//! Accuracy gate for incoming fixes

use super::sample::LocationSample;

pub const DEFAULT_ACCURACY_THRESHOLD_METERS: f64 = 50.0;

/// Drops fixes whose horizontal accuracy is not strictly better than the threshold.
///
/// Fast movement recorded with a poor signal is lost along with the noise.
#[derive(Debug, Clone, Copy)]
pub struct AccuracyFilter {
    threshold_meters: f64,
}

impl AccuracyFilter {
    pub fn new(threshold_meters: f64) -> Self {
        Self { threshold_meters }
    }

    pub fn accepts(&self, sample: &LocationSample) -> bool {
        // NaN compares false and is rejected
        sample.accuracy < self.threshold_meters
    }

    pub fn threshold_meters(&self) -> f64 {
        self.threshold_meters
    }
}

impl Default for AccuracyFilter {
    fn default() -> Self {
        Self::new(DEFAULT_ACCURACY_THRESHOLD_METERS)
    }
}
