// src/trip/mod.rs
//! Trip recording: the tracking state machine and its building blocks

pub mod clock;
pub mod geo;
pub mod inactivity;
mod recorder;
pub mod service;
pub mod state;

pub use service::TripTracker;
pub use state::{PathSegment, StopReason, TrackingState, TripEvent, TripRecord, TripSnapshot};

/// Internal wake-ups delivered to the tracker loop alongside commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Signal {
    Tick,
    InactivityTimeout(u64),
}
