// src/store/mod.rs
//! Persistence for finished trips and their location points

pub mod json;
pub mod memory;

pub use json::JsonTripStore;
pub use memory::MemoryTripStore;

use crate::{
    error::{Result, TripError},
    location::LocationSample,
    trip::TripRecord,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored location point. `id` is 0 until the store assigns one.
/// `segment` is the index of the recording interval the point belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub id: i64,
    pub trip_id: i64,
    #[serde(default)]
    pub segment: u32,
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: f64,
}

impl LocationRecord {
    pub fn from_sample(trip_id: i64, sample: &LocationSample) -> Self {
        Self {
            id: 0,
            trip_id,
            segment: 0,
            timestamp: sample.timestamp,
            latitude: sample.latitude,
            longitude: sample.longitude,
            speed: sample.speed,
        }
    }

    pub fn in_segment(mut self, segment: u32) -> Self {
        self.segment = segment;
        self
    }
}

/// Trip persistence.
///
/// Inserting a trip with `id == 0` assigns the next id; a non-zero id
/// replaces the existing row. Locations must belong to a stored trip.
#[async_trait]
pub trait TripStore: Send + Sync {
    /// Returns the id the trip is stored under
    async fn insert_trip(&self, trip: &TripRecord) -> Result<i64>;

    async fn update_trip(&self, trip: &TripRecord) -> Result<()>;

    /// Newest first
    async fn all_trips(&self) -> Result<Vec<TripRecord>>;

    async fn trip_by_id(&self, id: i64) -> Result<Option<TripRecord>>;

    async fn insert_location(&self, location: &LocationRecord) -> Result<i64>;

    async fn insert_locations(&self, locations: &[LocationRecord]) -> Result<()> {
        for location in locations {
            self.insert_location(location).await?;
        }
        Ok(())
    }

    /// Oldest first
    async fn locations_for_trip(&self, trip_id: i64) -> Result<Vec<LocationRecord>>;
}

/// The rows behind both store implementations
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct TripTables {
    next_trip_id: i64,
    next_location_id: i64,
    trips: Vec<TripRecord>,
    locations: Vec<LocationRecord>,
}

impl TripTables {
    pub(crate) fn insert_trip(&mut self, trip: &TripRecord) -> i64 {
        let mut row = trip.clone();
        if row.id == 0 {
            self.next_trip_id = self.next_trip_id.max(self.max_trip_id()) + 1;
            row.id = self.next_trip_id;
        }
        let id = row.id;

        match self.trips.iter_mut().find(|t| t.id == id) {
            Some(existing) => *existing = row,
            None => self.trips.push(row),
        }
        id
    }

    fn max_trip_id(&self) -> i64 {
        self.trips.iter().map(|t| t.id).max().unwrap_or(0)
    }

    pub(crate) fn update_trip(&mut self, trip: &TripRecord) -> Result<()> {
        match self.trips.iter_mut().find(|t| t.id == trip.id) {
            Some(existing) => {
                *existing = trip.clone();
                Ok(())
            }
            None => Err(TripError::Store(format!("No trip with id {}", trip.id))),
        }
    }

    pub(crate) fn all_trips(&self) -> Vec<TripRecord> {
        let mut trips = self.trips.clone();
        trips.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        trips
    }

    pub(crate) fn trip_by_id(&self, id: i64) -> Option<TripRecord> {
        self.trips.iter().find(|t| t.id == id).cloned()
    }

    pub(crate) fn insert_location(&mut self, location: &LocationRecord) -> Result<i64> {
        if !self.trips.iter().any(|t| t.id == location.trip_id) {
            return Err(TripError::Store(format!(
                "Location refers to unknown trip {}",
                location.trip_id
            )));
        }

        let mut row = location.clone();
        if row.id == 0 {
            let max = self.locations.iter().map(|l| l.id).max().unwrap_or(0);
            self.next_location_id = self.next_location_id.max(max) + 1;
            row.id = self.next_location_id;
        }
        let id = row.id;

        match self.locations.iter_mut().find(|l| l.id == id) {
            Some(existing) => *existing = row,
            None => self.locations.push(row),
        }
        Ok(id)
    }

    pub(crate) fn locations_for_trip(&self, trip_id: i64) -> Vec<LocationRecord> {
        let mut locations: Vec<LocationRecord> = self
            .locations
            .iter()
            .filter(|l| l.trip_id == trip_id)
            .cloned()
            .collect();
        locations.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        locations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn trip_at(hour: u32) -> TripRecord {
        TripRecord::begin(Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap())
    }

    #[test]
    fn test_ids_are_assigned_and_replace_on_conflict() {
        let mut tables = TripTables::default();
        let first = tables.insert_trip(&trip_at(8));
        let second = tables.insert_trip(&trip_at(9));
        assert_eq!((first, second), (1, 2));

        let mut replacement = trip_at(10);
        replacement.id = first;
        replacement.distance_meters = 42.0;
        assert_eq!(tables.insert_trip(&replacement), first);
        assert_eq!(tables.all_trips().len(), 2);
        assert_eq!(tables.trip_by_id(first).unwrap().distance_meters, 42.0);
    }

    #[test]
    fn test_trips_newest_first() {
        let mut tables = TripTables::default();
        tables.insert_trip(&trip_at(8));
        tables.insert_trip(&trip_at(12));
        tables.insert_trip(&trip_at(10));

        let hours: Vec<_> = tables
            .all_trips()
            .iter()
            .map(|t| t.start_time.format("%H").to_string())
            .collect();
        assert_eq!(hours, vec!["12", "10", "08"]);
    }

    #[test]
    fn test_update_unknown_trip_fails() {
        let mut tables = TripTables::default();
        let mut trip = trip_at(8);
        trip.id = 7;
        assert!(matches!(tables.update_trip(&trip), Err(TripError::Store(_))));
    }

    #[test]
    fn test_locations_oldest_first_and_need_a_trip() {
        let mut tables = TripTables::default();
        let trip_id = tables.insert_trip(&trip_at(8));
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();

        for offset in [20, 0, 10] {
            let sample = LocationSample::new(base + Duration::seconds(offset), 1.0, 2.0, 5.0, 0.5);
            tables
                .insert_location(&LocationRecord::from_sample(trip_id, &sample))
                .unwrap();
        }

        let offsets: Vec<_> = tables
            .locations_for_trip(trip_id)
            .iter()
            .map(|l| (l.timestamp - base).num_seconds())
            .collect();
        assert_eq!(offsets, vec![0, 10, 20]);

        let orphan = LocationRecord::from_sample(99, &LocationSample::new(base, 0.0, 0.0, 5.0, 0.0));
        assert!(tables.insert_location(&orphan).is_err());
    }
}
