// src/location/provider.rs
//! Interface between the trip recorder and whatever produces location fixes

use super::sample::LocationSample;
use crate::{error::Result, trip::service::Command};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};
use tokio::sync::mpsc;

/// Update cadence hint handed to a provider. Providers treat it as best effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationRequest {
    pub interval: Duration,
    pub min_interval: Duration,
    pub max_delay: Duration,
}

impl LocationRequest {
    pub fn from_interval(interval: Duration) -> Self {
        Self {
            interval,
            min_interval: interval / 2,
            max_delay: interval * 2,
        }
    }
}

/// Delivers samples onto the tracker's command queue. Safe to clone and use
/// from any thread or task.
#[derive(Debug, Clone)]
pub struct LocationSink {
    commands: mpsc::UnboundedSender<Command>,
}

impl LocationSink {
    pub(crate) fn new(commands: mpsc::UnboundedSender<Command>) -> Self {
        Self { commands }
    }

    /// Returns false once the tracker has shut down
    pub fn send(&self, sample: LocationSample) -> bool {
        self.commands.send(Command::Location(sample)).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

/// A source of location fixes.
///
/// `request_updates` is called each time tracking turns on and
/// `remove_updates` each time it turns off. Samples go through the sink.
pub trait LocationProvider: Send + Sync {
    fn has_permission(&self) -> bool;

    fn request_updates(&self, request: LocationRequest, sink: LocationSink) -> Result<()>;

    fn remove_updates(&self);
}

/// Provider for embedders that receive fixes from elsewhere (a platform
/// callback, a replay file) and push them in by hand.
#[derive(Debug)]
pub struct ManualLocationProvider {
    permission: AtomicBool,
    active: AtomicBool,
    requests: AtomicUsize,
    sink: Mutex<Option<LocationSink>>,
    last_request: Mutex<Option<LocationRequest>>,
}

impl ManualLocationProvider {
    pub fn new() -> Self {
        Self::with_permission(true)
    }

    pub fn with_permission(granted: bool) -> Self {
        Self {
            permission: AtomicBool::new(granted),
            active: AtomicBool::new(false),
            requests: AtomicUsize::new(0),
            sink: Mutex::new(None),
            last_request: Mutex::new(None),
        }
    }

    pub fn set_permission(&self, granted: bool) {
        self.permission.store(granted, Ordering::SeqCst);
    }

    /// Whether updates are currently requested
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Number of times updates were requested
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<LocationRequest> {
        self.last_request.lock().ok().and_then(|guard| *guard)
    }

    /// Forward a fix to the tracker. Dropped when updates are not requested.
    pub fn push(&self, sample: LocationSample) -> bool {
        if !self.is_active() {
            return false;
        }
        match self.sink.lock() {
            Ok(guard) => guard.as_ref().map_or(false, |sink| sink.send(sample)),
            Err(_) => false,
        }
    }
}

impl Default for ManualLocationProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationProvider for ManualLocationProvider {
    fn has_permission(&self) -> bool {
        self.permission.load(Ordering::SeqCst)
    }

    fn request_updates(&self, request: LocationRequest, sink: LocationSink) -> Result<()> {
        if let Ok(mut guard) = self.sink.lock() {
            *guard = Some(sink);
        }
        if let Ok(mut guard) = self.last_request.lock() {
            *guard = Some(request);
        }
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn remove_updates(&self) {
        self.active.store(false, Ordering::SeqCst);
        if let Ok(mut guard) = self.sink.lock() {
            *guard = None;
        }
    }
}
