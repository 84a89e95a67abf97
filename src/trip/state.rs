// src/trip/state.rs
//! Trip data model and the observable tracking snapshot

use crate::location::LocationSample;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrackingState {
    #[default]
    Idle,
    Running,
    Paused,
}

impl fmt::Display for TrackingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackingState::Idle => write!(f, "Idle"),
            TrackingState::Running => write!(f, "Running"),
            TrackingState::Paused => write!(f, "Paused"),
        }
    }
}

/// One continuous recording interval. Points are kept in timestamp order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathSegment {
    points: Vec<LocationSample>,
}

impl PathSegment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a point. Points older than the current last point are refused.
    pub fn push(&mut self, sample: LocationSample) -> bool {
        if let Some(last) = self.points.last() {
            if sample.timestamp < last.timestamp {
                return false;
            }
        }
        self.points.push(sample);
        true
    }

    pub fn points(&self) -> &[LocationSample] {
        &self.points
    }

    pub fn last(&self) -> Option<&LocationSample> {
        self.points.last()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Summary of one trip. `id` is 0 until a store assigns one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    pub id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub distance_meters: f64,
    pub duration_millis: u64,
}

impl TripRecord {
    pub fn begin(start_time: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            start_time,
            end_time: None,
            distance_meters: 0.0,
            duration_millis: 0,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }

    /// Mean moving speed in km/h, if any time has been recorded
    pub fn average_speed_kmh(&self) -> Option<f64> {
        if self.duration_millis == 0 {
            return None;
        }
        Some(self.distance_meters / 1000.0 / (self.duration_millis as f64 / 3_600_000.0))
    }
}

/// Everything an observer needs to render live tracking
#[derive(Debug, Clone, PartialEq)]
pub struct TripSnapshot {
    pub state: TrackingState,
    pub path_segments: Arc<Vec<PathSegment>>,
    pub elapsed_millis: u64,
    pub distance_meters: f64,
    pub speed_kmh: f64,
}

impl TripSnapshot {
    pub fn idle() -> Self {
        Self {
            state: TrackingState::Idle,
            path_segments: Arc::new(Vec::new()),
            elapsed_millis: 0,
            distance_meters: 0.0,
            speed_kmh: 0.0,
        }
    }

    pub fn point_count(&self) -> usize {
        self.path_segments.iter().map(PathSegment::len).sum()
    }

    pub fn last_point(&self) -> Option<&LocationSample> {
        self.path_segments.iter().rev().find_map(PathSegment::last)
    }
}

impl Default for TripSnapshot {
    fn default() -> Self {
        Self::idle()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    User,
    Inactivity,
    Shutdown,
}

/// Discrete lifecycle notifications, in the order they happen
#[derive(Debug, Clone, PartialEq)]
pub enum TripEvent {
    Started { start_time: DateTime<Utc> },
    Paused,
    Resumed,
    Stopped { record: TripRecord, reason: StopReason },
    /// The finished trip reached the store
    Saved { trip_id: i64 },
    SaveFailed { trip_id: Option<i64>, message: String },
    /// The trip had no accepted points and was not stored
    Discarded,
}
