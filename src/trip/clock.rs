// src/trip/clock.rs
//! Moving-time clock and the periodic tick that publishes it

use super::Signal;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{sync::mpsc, task::JoinHandle, time::Instant};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(50);

/// Elapsed running time that excludes paused intervals
#[derive(Debug, Clone, Copy, Default)]
pub struct ElapsedClock {
    accumulated: Duration,
    run_started: Option<Instant>,
}

impl ElapsedClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin or resume a run. Already running is a no-op.
    pub fn start(&mut self, now: Instant) {
        if self.run_started.is_none() {
            self.run_started = Some(now);
        }
    }

    /// Fold the current run into the accumulated total
    pub fn pause(&mut self, now: Instant) {
        if let Some(started) = self.run_started.take() {
            self.accumulated += now.saturating_duration_since(started);
        }
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        match self.run_started {
            Some(started) => self.accumulated + now.saturating_duration_since(started),
            None => self.accumulated,
        }
    }

    pub fn is_running(&self) -> bool {
        self.run_started.is_some()
    }

    pub fn reset(&mut self) {
        self.accumulated = Duration::ZERO;
        self.run_started = None;
    }
}

/// Periodic task that wakes the tracker loop while a run is active.
///
/// Every run gets its own flag, so a ticker that outlives its run sees a
/// cleared flag on its next wake and exits without ticking.
pub struct Ticker {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Ticker {
    pub(crate) fn spawn(period: Duration, signals: mpsc::UnboundedSender<Signal>) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let handle = tokio::spawn(async move {
            while flag.load(Ordering::Acquire) {
                if signals.send(Signal::Tick).is_err() {
                    break;
                }
                tokio::time::sleep(period).await;
            }
        });

        Self { running, handle }
    }

    pub fn cancel(self) {
        self.running.store(false, Ordering::Release);
        self.handle.abort();
    }
}
