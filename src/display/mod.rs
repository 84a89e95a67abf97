// src/display/mod.rs
//! Live trip display

pub mod terminal;

pub use terminal::TripDashboard;
