// src/trip/service.rs
//! Single-owner task around the trip recorder, and the handle used to drive it

use super::{
    recorder::TripRecorder,
    state::{StopReason, TripEvent, TripRecord, TripSnapshot},
    Signal,
};
use crate::{
    config::TrackerConfig,
    error::{Result, TripError},
    location::{LocationProvider, LocationSample, LocationSink},
    store::TripStore,
};
use std::sync::{Arc, Mutex};
use tokio::{
    sync::{broadcast, mpsc, oneshot, watch},
    task::JoinHandle,
};

const EVENT_CAPACITY: usize = 64;

/// Everything that mutates trip state arrives on one queue, in order
#[derive(Debug)]
pub(crate) enum Command {
    Start(oneshot::Sender<Result<()>>),
    Pause(oneshot::Sender<()>),
    Stop(oneshot::Sender<Option<TripRecord>>),
    Location(LocationSample),
    Configure(TrackerConfig),
    Snapshot(oneshot::Sender<TripSnapshot>),
    Shutdown,
}

/// Event loop that owns the recorder
struct TripService {
    recorder: TripRecorder,
    commands: mpsc::UnboundedReceiver<Command>,
    signals: mpsc::UnboundedReceiver<Signal>,
}

impl TripService {
    async fn run(mut self) {
        tracing::debug!("Trip service started");

        loop {
            tokio::select! {
                // Commands win ties, so a queued pause/stop or moving fix is
                // handled before a timeout that fired at the same moment.
                biased;
                command = self.commands.recv() => {
                    let Some(command) = command else { break };
                    if !self.handle(command) {
                        break;
                    }
                }
                Some(signal) = self.signals.recv() => self.recorder.on_signal(signal),
            }
        }

        self.recorder.stop(StopReason::Shutdown);
        tracing::debug!("Trip service stopped");
    }

    /// Returns false when the loop should end
    fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Start(reply) => {
                let _ = reply.send(self.recorder.start());
            }
            Command::Pause(reply) => {
                self.recorder.pause();
                let _ = reply.send(());
            }
            Command::Stop(reply) => {
                let _ = reply.send(self.recorder.stop(StopReason::User));
            }
            Command::Location(sample) => self.recorder.on_location(sample),
            Command::Configure(config) => self.recorder.apply_config(config),
            Command::Snapshot(reply) => {
                let _ = reply.send(self.recorder.snapshot());
            }
            Command::Shutdown => return false,
        }
        true
    }
}

struct TrackerInner {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<TripSnapshot>,
    events: broadcast::Sender<TripEvent>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for TrackerInner {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}

/// Cloneable handle to a running trip tracker.
///
/// Dropping the last clone shuts the tracker down; an active trip is then
/// stopped and saved with [`StopReason::Shutdown`].
#[derive(Clone)]
pub struct TripTracker {
    inner: Arc<TrackerInner>,
}

impl TripTracker {
    /// Spawn the tracker task on the current tokio runtime
    pub fn spawn(
        config: TrackerConfig,
        provider: Arc<dyn LocationProvider>,
        store: Arc<dyn TripStore>,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        let (snapshots_tx, snapshots_rx) = watch::channel(TripSnapshot::idle());
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);

        let recorder = TripRecorder::new(
            config,
            provider,
            store,
            LocationSink::new(commands_tx.clone()),
            signals_tx,
            snapshots_tx,
            events_tx.clone(),
        );

        let service = TripService {
            recorder,
            commands: commands_rx,
            signals: signals_rx,
        };
        let task = tokio::spawn(service.run());

        Self {
            inner: Arc::new(TrackerInner {
                commands: commands_tx,
                snapshots: snapshots_rx,
                events: events_tx,
                task: Mutex::new(Some(task)),
            }),
        }
    }

    fn send(&self, command: Command) -> Result<()> {
        self.inner.commands.send(command)?;
        Ok(())
    }

    /// Start a new trip or resume a paused one
    pub async fn start(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Start(tx))?;
        rx.await?
    }

    pub async fn pause(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Pause(tx))?;
        Ok(rx.await?)
    }

    /// Stop and finalize the active trip. Saving happens in the background;
    /// watch [`TripTracker::events`] for the outcome.
    pub async fn stop(&self) -> Result<Option<TripRecord>> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Stop(tx))?;
        Ok(rx.await?)
    }

    /// Queue a fix from any thread
    pub fn on_location(&self, sample: LocationSample) -> Result<()> {
        self.send(Command::Location(sample))
    }

    pub fn location_sink(&self) -> LocationSink {
        LocationSink::new(self.inner.commands.clone())
    }

    pub fn configure(&self, config: TrackerConfig) -> Result<()> {
        config.validate()?;
        self.send(Command::Configure(config))
    }

    /// Snapshot taken after every previously queued command has been handled
    pub async fn snapshot(&self) -> Result<TripSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Snapshot(tx))?;
        Ok(rx.await?)
    }

    /// Most recently published snapshot
    pub fn current(&self) -> TripSnapshot {
        self.inner.snapshots.borrow().clone()
    }

    /// Live snapshots; a new receiver sees the latest value immediately
    pub fn subscribe(&self) -> watch::Receiver<TripSnapshot> {
        self.inner.snapshots.clone()
    }

    pub fn events(&self) -> broadcast::Receiver<TripEvent> {
        self.inner.events.subscribe()
    }

    /// Stop the tracker task and wait for it to finish
    pub async fn shutdown(&self) -> Result<()> {
        let _ = self.inner.commands.send(Command::Shutdown);

        let task = self.inner.task.lock().ok().and_then(|mut guard| guard.take());
        if let Some(task) = task {
            task.await
                .map_err(|e| TripError::Other(format!("Trip service task failed: {}", e)))?;
        }
        Ok(())
    }
}
