// src/trip/geo.rs
//! Great-circle distance and per-segment path length

use super::state::PathSegment;
use crate::location::LocationSample;

/// Mean earth radius in meters
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Haversine distance between two coordinates in meters
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Sum of distances between consecutive points. Empty or single-point paths are 0.
pub fn segment_length(points: &[LocationSample]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| w[0].distance_to(&w[1]))
        .sum()
}

/// Full recomputation over every segment. Nothing is counted across a
/// segment boundary.
pub fn total_distance(segments: &[PathSegment]) -> f64 {
    segments.iter().map(|s| segment_length(s.points())).sum()
}

/// Running total of path length, updated one accepted point at a time.
///
/// Equivalent to `total_distance` over the same segments but O(1) per point.
#[derive(Debug, Clone, Copy, Default)]
pub struct DistanceAccumulator {
    total_meters: f64,
}

impl DistanceAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the step from `previous` (the last point of the same segment, if
    /// any) to `next`. Returns the new total.
    pub fn add(&mut self, previous: Option<&LocationSample>, next: &LocationSample) -> f64 {
        if let Some(prev) = previous {
            let step = prev.distance_to(next);
            if step.is_finite() {
                self.total_meters += step;
            }
        }
        self.total_meters
    }

    pub fn total_meters(&self) -> f64 {
        self.total_meters
    }

    pub fn reset(&mut self) {
        self.total_meters = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn point(lat: f64, lon: f64) -> LocationSample {
        LocationSample::new(Utc::now(), lat, lon, 5.0, 0.0)
    }

    #[test]
    fn test_haversine_known_value() {
        // London to Paris, ~344 km
        let dist = haversine_distance(51.5074, -0.1278, 48.8566, 2.3522);
        assert!((dist - 343_560.0).abs() < 1000.0);
    }

    #[test]
    fn test_one_degree_of_latitude() {
        let dist = haversine_distance(0.0, 0.0, 1.0, 0.0);
        assert!((dist - 111_195.0).abs() < 10.0);
    }

    #[test]
    fn test_segment_length_short_paths() {
        assert_eq!(segment_length(&[]), 0.0);
        assert_eq!(segment_length(&[point(1.0, 1.0)]), 0.0);
    }

    #[test]
    fn test_segments_are_independent() {
        let mut first = PathSegment::new();
        first.push(point(0.0, 0.0));
        first.push(point(0.0, 0.001));
        let mut second = PathSegment::new();
        second.push(point(1.0, 0.0));
        second.push(point(1.0, 0.001));

        let within = segment_length(first.points()) + segment_length(second.points());
        let total = total_distance(&[first, second]);
        assert!((total - within).abs() < 1e-9);
        // A line across the gap would add ~111 km
        assert!(total < 1000.0);
    }

    #[test]
    fn test_accumulator_matches_recompute() {
        let path = [point(0.0, 0.0), point(0.0005, 0.0), point(0.001, 0.0005)];
        let mut acc = DistanceAccumulator::new();
        let mut previous: Option<&LocationSample> = None;
        for p in &path {
            acc.add(previous, p);
            previous = Some(p);
        }
        assert!((acc.total_meters() - segment_length(&path)).abs() < 1e-9);

        acc.reset();
        assert_eq!(acc.total_meters(), 0.0);
    }

    #[test]
    fn test_first_point_adds_nothing() {
        let mut acc = DistanceAccumulator::new();
        assert_eq!(acc.add(None, &point(10.0, 10.0)), 0.0);
    }
}
