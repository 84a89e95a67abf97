// src/trip/inactivity.rs
//! Auto-stop when consecutive fixes stop moving

use super::Signal;
use crate::location::LocationSample;
use std::time::Duration;
use tokio::{sync::mpsc, task::JoinHandle};

pub const DEFAULT_MOVEMENT_THRESHOLD_METERS: f64 = 10.0;
pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// First fix, or still moving with nothing pending
    Unchanged,
    /// Displacement under threshold; a timeout is now counting down
    Armed,
    /// Already counting down; left as is
    StillIdle,
    /// Movement cancelled a pending timeout
    Cancelled,
}

struct PendingTimeout {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Watches consecutive accepted fixes and raises a timeout signal when the
/// user has not moved for the configured dwell time.
///
/// Each armed timeout carries a generation number. Only the generation that
/// is still pending can be claimed, so a timeout that raced with a cancel
/// never stops a trip, and one timeout stops at most once.
pub struct InactivityDetector {
    movement_threshold_meters: f64,
    timeout: Duration,
    last_accepted: Option<LocationSample>,
    pending: Option<PendingTimeout>,
    next_generation: u64,
    signals: mpsc::UnboundedSender<Signal>,
}

impl InactivityDetector {
    pub(crate) fn new(
        movement_threshold_meters: f64,
        timeout: Duration,
        signals: mpsc::UnboundedSender<Signal>,
    ) -> Self {
        Self {
            movement_threshold_meters,
            timeout,
            last_accepted: None,
            pending: None,
            next_generation: 0,
            signals,
        }
    }

    pub fn set_thresholds(&mut self, movement_threshold_meters: f64, timeout: Duration) {
        self.movement_threshold_meters = movement_threshold_meters;
        self.timeout = timeout;
    }

    /// Feed an accepted fix
    pub fn observe(&mut self, sample: &LocationSample) -> Observation {
        let previous = self.last_accepted.replace(*sample);
        let Some(previous) = previous else {
            return Observation::Unchanged;
        };

        let displacement = previous.distance_to(sample);
        if displacement < self.movement_threshold_meters {
            if self.pending.is_some() {
                return Observation::StillIdle;
            }
            self.arm();
            Observation::Armed
        } else if self.cancel() {
            tracing::debug!("Movement of {:.1} m cancelled inactivity timeout", displacement);
            Observation::Cancelled
        } else {
            Observation::Unchanged
        }
    }

    fn arm(&mut self) {
        self.next_generation += 1;
        let generation = self.next_generation;
        let timeout = self.timeout;
        let signals = self.signals.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = signals.send(Signal::InactivityTimeout(generation));
        });

        tracing::debug!("Inactivity timeout armed for {:?}", timeout);
        self.pending = Some(PendingTimeout { generation, handle });
    }

    /// Cancel any pending timeout. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => {
                pending.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel and forget the last fix, so detection starts over on resume
    pub fn reset(&mut self) {
        self.cancel();
        self.last_accepted = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Consume a fired timeout. True only for the generation still pending.
    pub fn claim(&mut self, generation: u64) -> bool {
        match &self.pending {
            Some(pending) if pending.generation == generation => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }
}

impl Drop for InactivityDetector {
    fn drop(&mut self) {
        self.cancel();
    }
}
