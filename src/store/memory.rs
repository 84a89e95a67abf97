// src/store/memory.rs
//! In-process trip store

use super::{LocationRecord, TripStore, TripTables};
use crate::{error::Result, trip::TripRecord};
use async_trait::async_trait;
use tokio::sync::Mutex;

/// Keeps everything in memory; contents are lost on exit
#[derive(Debug, Default)]
pub struct MemoryTripStore {
    tables: Mutex<TripTables>,
}

impl MemoryTripStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TripStore for MemoryTripStore {
    async fn insert_trip(&self, trip: &TripRecord) -> Result<i64> {
        Ok(self.tables.lock().await.insert_trip(trip))
    }

    async fn update_trip(&self, trip: &TripRecord) -> Result<()> {
        self.tables.lock().await.update_trip(trip)
    }

    async fn all_trips(&self) -> Result<Vec<TripRecord>> {
        Ok(self.tables.lock().await.all_trips())
    }

    async fn trip_by_id(&self, id: i64) -> Result<Option<TripRecord>> {
        Ok(self.tables.lock().await.trip_by_id(id))
    }

    async fn insert_location(&self, location: &LocationRecord) -> Result<i64> {
        self.tables.lock().await.insert_location(location)
    }

    async fn insert_locations(&self, locations: &[LocationRecord]) -> Result<()> {
        let mut tables = self.tables.lock().await;
        for location in locations {
            tables.insert_location(location)?;
        }
        Ok(())
    }

    async fn locations_for_trip(&self, trip_id: i64) -> Result<Vec<LocationRecord>> {
        Ok(self.tables.lock().await.locations_for_trip(trip_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::LocationSample;
    use chrono::Utc;

    #[tokio::test]
    async fn test_round_trip_through_trait_object() {
        let store: Box<dyn TripStore> = Box::new(MemoryTripStore::new());

        let mut trip = TripRecord::begin(Utc::now());
        trip.distance_meters = 1500.0;
        let id = store.insert_trip(&trip).await.unwrap();

        let sample = LocationSample::new(Utc::now(), 55.0, 12.0, 4.0, 2.0);
        store
            .insert_locations(&[LocationRecord::from_sample(id, &sample)])
            .await
            .unwrap();

        let stored = store.trip_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.id, id);
        assert_eq!(stored.distance_meters, 1500.0);

        let points = store.locations_for_trip(id).await.unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].trip_id, id);
        assert!(store.locations_for_trip(id + 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_trip() {
        let store = MemoryTripStore::new();
        let id = store.insert_trip(&TripRecord::begin(Utc::now())).await.unwrap();

        let mut trip = store.trip_by_id(id).await.unwrap().unwrap();
        trip.end_time = Some(Utc::now());
        store.update_trip(&trip).await.unwrap();

        assert!(store.trip_by_id(id).await.unwrap().unwrap().is_finished());
        assert_eq!(store.trip_by_id(id + 5).await.unwrap(), None);
    }
}
