// src/location/mod.rs
//! Location samples, accuracy filtering and location sources

pub mod filter;
pub mod gpsd;
pub mod provider;
pub mod sample;

pub use filter::AccuracyFilter;
pub use gpsd::GpsdProvider;
pub use provider::{LocationProvider, LocationRequest, LocationSink, ManualLocationProvider};
pub use sample::LocationSample;
