// src/store/json.rs
//! Trip store backed by a single JSON document on disk

use super::{LocationRecord, TripStore, TripTables};
use crate::{
    error::{Result, TripError},
    trip::TripRecord,
};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::Mutex;

/// The whole document is rewritten on every change. Writes go to a sibling
/// temp file first and are renamed into place, so a crash mid-write leaves
/// the previous contents intact.
#[derive(Debug)]
pub struct JsonTripStore {
    path: PathBuf,
    tables: Mutex<TripTables>,
}

impl JsonTripStore {
    /// Load an existing store, or start an empty one that is created on the
    /// first write
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let tables = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                TripError::Store(format!("Failed to parse {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => TripTables::default(),
            Err(e) => return Err(TripError::Io(e)),
        };

        tracing::debug!("Opened trip store at {}", path.display());
        Ok(Self {
            path,
            tables: Mutex::new(tables),
        })
    }

    async fn write(&self, tables: &TripTables) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let contents = serde_json::to_string_pretty(tables)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Apply a change to a copy, write it, then keep it. A failed write
    /// leaves memory and disk in agreement.
    async fn modify<T>(&self, change: impl FnOnce(&mut TripTables) -> Result<T>) -> Result<T> {
        let mut tables = self.tables.lock().await;
        let mut updated = tables.clone();
        let value = change(&mut updated)?;
        self.write(&updated).await?;
        *tables = updated;
        Ok(value)
    }
}

#[async_trait]
impl TripStore for JsonTripStore {
    async fn insert_trip(&self, trip: &TripRecord) -> Result<i64> {
        self.modify(|tables| Ok(tables.insert_trip(trip))).await
    }

    async fn update_trip(&self, trip: &TripRecord) -> Result<()> {
        self.modify(|tables| tables.update_trip(trip)).await
    }

    async fn all_trips(&self) -> Result<Vec<TripRecord>> {
        Ok(self.tables.lock().await.all_trips())
    }

    async fn trip_by_id(&self, id: i64) -> Result<Option<TripRecord>> {
        Ok(self.tables.lock().await.trip_by_id(id))
    }

    async fn insert_location(&self, location: &LocationRecord) -> Result<i64> {
        self.modify(|tables| tables.insert_location(location)).await
    }

    /// One write for the whole batch
    async fn insert_locations(&self, locations: &[LocationRecord]) -> Result<()> {
        self.modify(|tables| {
            for location in locations {
                tables.insert_location(location)?;
            }
            Ok(())
        })
        .await
    }

    async fn locations_for_trip(&self, trip_id: i64) -> Result<Vec<LocationRecord>> {
        Ok(self.tables.lock().await.locations_for_trip(trip_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::LocationSample;
    use chrono::{Duration, Utc};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_file_opens_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("trips.json");

        let store = JsonTripStore::open(&path).await.unwrap();
        assert!(store.all_trips().await.unwrap().is_empty());
        assert!(!path.exists());

        store.insert_trip(&TripRecord::begin(Utc::now())).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_contents_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trips.json");
        let start = Utc::now();

        let trip_id = {
            let store = JsonTripStore::open(&path).await.unwrap();
            let mut trip = TripRecord::begin(start);
            trip.end_time = Some(start + Duration::minutes(5));
            trip.distance_meters = 812.5;
            trip.duration_millis = 300_000;
            let id = store.insert_trip(&trip).await.unwrap();

            let locations: Vec<_> = (0..3)
                .map(|i| {
                    let sample = LocationSample::new(
                        start + Duration::seconds(i),
                        55.0 + i as f64 * 0.001,
                        12.0,
                        5.0,
                        3.0,
                    );
                    LocationRecord::from_sample(id, &sample)
                })
                .collect();
            store.insert_locations(&locations).await.unwrap();
            id
        };

        let reopened = JsonTripStore::open(&path).await.unwrap();
        let trip = reopened.trip_by_id(trip_id).await.unwrap().unwrap();
        assert_eq!(trip.distance_meters, 812.5);
        assert_eq!(trip.duration_millis, 300_000);
        assert_eq!(reopened.locations_for_trip(trip_id).await.unwrap().len(), 3);

        // Ids keep counting after reopen
        let next = reopened.insert_trip(&TripRecord::begin(Utc::now())).await.unwrap();
        assert_eq!(next, trip_id + 1);
    }

    #[tokio::test]
    async fn test_rejected_change_is_not_written() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trips.json");
        let store = JsonTripStore::open(&path).await.unwrap();
        store.insert_trip(&TripRecord::begin(Utc::now())).await.unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        let orphan = LocationRecord::from_sample(
            42,
            &LocationSample::new(Utc::now(), 0.0, 0.0, 5.0, 0.0),
        );
        assert!(store.insert_location(&orphan).await.is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[tokio::test]
    async fn test_points_without_segment_load_as_first_segment() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trips.json");
        std::fs::write(
            &path,
            r#"{
                "trips": [{"id": 1, "start_time": "2024-05-01T08:00:00Z", "end_time": null,
                           "distance_meters": 0.0, "duration_millis": 0}],
                "locations": [{"id": 1, "trip_id": 1, "timestamp": "2024-05-01T08:00:01Z",
                               "latitude": 55.0, "longitude": 12.0, "speed": 0.0}]
            }"#,
        )
        .unwrap();

        let store = JsonTripStore::open(&path).await.unwrap();
        let locations = store.locations_for_trip(1).await.unwrap();
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].segment, 0);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trips.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            JsonTripStore::open(&path).await,
            Err(TripError::Store(_))
        ));
    }
}
