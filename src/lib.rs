// src/lib.rs
//! Trip Recorder Library
//!
//! Records GPS trips: filters incoming fixes by accuracy, accumulates
//! distance per path segment, keeps a moving-time clock, auto-stops after
//! inactivity and saves finished trips to a store.

pub mod config;
pub mod display;
pub mod error;
pub mod export;
pub mod format;
pub mod location;
pub mod monitor;
pub mod store;
pub mod trip;

// Re-export main types for convenience
pub use config::TrackerConfig;
pub use error::{Result, TripError};
pub use location::{LocationProvider, LocationSample};
pub use monitor::RecordingSession;
pub use store::{JsonTripStore, MemoryTripStore, TripStore};
pub use trip::{TrackingState, TripEvent, TripRecord, TripSnapshot, TripTracker};
