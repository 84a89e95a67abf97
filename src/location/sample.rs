// src/location/sample.rs
//! A single GPS fix as delivered by a location provider

use crate::trip::geo::haversine_distance;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64, // meters, horizontal
    pub speed: f64,    // m/s
}

impl LocationSample {
    pub fn new(
        timestamp: DateTime<Utc>,
        latitude: f64,
        longitude: f64,
        accuracy: f64,
        speed: f64,
    ) -> Self {
        Self {
            timestamp,
            latitude,
            longitude,
            accuracy,
            speed,
        }
    }

    /// Great-circle distance to another fix in meters
    pub fn distance_to(&self, other: &LocationSample) -> f64 {
        haversine_distance(self.latitude, self.longitude, other.latitude, other.longitude)
    }

    pub fn speed_kmh(&self) -> f64 {
        self.speed * 3.6
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed_conversion() {
        let sample = LocationSample::new(Utc::now(), 48.117, 11.517, 5.0, 10.0);
        assert!((sample.speed_kmh() - 36.0).abs() < 1e-9);
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        let sample = LocationSample::new(Utc::now(), 48.117, 11.517, 5.0, 0.0);
        assert_eq!(sample.distance_to(&sample), 0.0);
    }
}
