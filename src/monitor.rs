// src/monitor.rs
//! Interactive recording session: keyboard commands, live dashboard and
//! event reporting around one trip tracker

use crate::{
    display::TripDashboard,
    error::{Result, TripError},
    trip::{StopReason, TripEvent, TripTracker},
};
use std::{
    io::BufRead,
    str::FromStr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, RwLock,
    },
    time::Duration,
};
use tokio::sync::{broadcast, mpsc};

const SAVE_WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Start,
    Pause,
    Stop,
    Quit,
}

impl FromStr for ControlCommand {
    type Err = TripError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "s" | "start" | "resume" => Ok(ControlCommand::Start),
            "p" | "pause" => Ok(ControlCommand::Pause),
            "x" | "stop" => Ok(ControlCommand::Stop),
            "q" | "quit" | "exit" => Ok(ControlCommand::Quit),
            other => Err(TripError::Parse(format!("Unknown command: {}", other))),
        }
    }
}

/// One-line description of a lifecycle event for the status line
pub fn describe_event(event: &TripEvent) -> String {
    match event {
        TripEvent::Started { start_time } => {
            format!("Trip started at {}", start_time.format("%H:%M:%S UTC"))
        }
        TripEvent::Paused => "Trip paused".to_string(),
        TripEvent::Resumed => "Trip resumed".to_string(),
        TripEvent::Stopped { reason, .. } => match reason {
            StopReason::User => "Trip stopped".to_string(),
            StopReason::Inactivity => "Trip stopped after inactivity".to_string(),
            StopReason::Shutdown => "Trip stopped on shutdown".to_string(),
        },
        TripEvent::Saved { trip_id } => format!("Trip {} saved", trip_id),
        TripEvent::SaveFailed { message, .. } => format!("Saving trip failed: {}", message),
        TripEvent::Discarded => "Trip had no fixes and was not saved".to_string(),
    }
}

/// Coordinates one interactive recording session
pub struct RecordingSession {
    tracker: TripTracker,
    status: Arc<RwLock<String>>,
    running: Arc<AtomicBool>,
}

impl RecordingSession {
    pub fn new(tracker: TripTracker) -> Self {
        Self {
            tracker,
            status: Arc::new(RwLock::new(String::new())),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn tracker(&self) -> &TripTracker {
        &self.tracker
    }

    pub fn status(&self) -> String {
        self.status.read().map(|s| s.clone()).unwrap_or_default()
    }

    fn set_status(&self, message: impl Into<String>) {
        if let Ok(mut status) = self.status.write() {
            *status = message.into();
        }
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Apply one command. Returns false once the session should end.
    pub async fn handle(&self, command: ControlCommand) -> Result<bool> {
        match command {
            ControlCommand::Start => match self.tracker.start().await {
                Ok(()) => {}
                Err(TripError::PermissionDenied) => {
                    self.set_status("Location permission missing; grant it and press s again");
                }
                Err(e) => return Err(e),
            },
            ControlCommand::Pause => self.tracker.pause().await?,
            ControlCommand::Stop => {
                self.tracker.stop().await?;
            }
            ControlCommand::Quit => {
                self.stop();
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Run until quit or Ctrl+C, then stop and save any active trip
    pub async fn run(&self) -> Result<()> {
        let running = Arc::clone(&self.running);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                running.store(false, Ordering::Relaxed);
            }
        });

        let status = Arc::clone(&self.status);
        let mut events = self.tracker.events();
        let reporter = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if let Ok(mut status) = status.write() {
                            *status = describe_event(&event);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        let mut commands = spawn_input_reader();
        let control = async {
            while self.is_running() {
                tokio::select! {
                    line = commands.recv() => {
                        let Some(line) = line else {
                            self.stop();
                            break;
                        };
                        match line.parse::<ControlCommand>() {
                            Ok(command) => {
                                if !self.handle(command).await? {
                                    break;
                                }
                            }
                            Err(e) => self.set_status(e.to_string()),
                        }
                    }
                    _ = tokio::time::sleep(Duration::from_millis(200)) => {}
                }
            }
            Ok::<(), TripError>(())
        };

        let dashboard = TripDashboard::new();
        let result = tokio::try_join!(
            dashboard.run(
                self.tracker.subscribe(),
                Arc::clone(&self.status),
                Arc::clone(&self.running),
            ),
            control,
        );
        self.stop();
        reporter.abort();

        self.finish().await?;
        result.map(|_| ())
    }

    /// Stop any active trip and wait for it to reach the store
    pub async fn finish(&self) -> Result<()> {
        let mut events = self.tracker.events();
        if self.tracker.stop().await?.is_some() {
            match tokio::time::timeout(SAVE_WAIT, wait_for_outcome(&mut events)).await {
                Ok(Some(event)) => println!("{}", describe_event(&event)),
                Ok(None) => {}
                Err(_) => tracing::warn!("Timed out waiting for trip to be saved"),
            }
        }
        self.tracker.shutdown().await
    }
}

async fn wait_for_outcome(events: &mut broadcast::Receiver<TripEvent>) -> Option<TripEvent> {
    loop {
        match events.recv().await {
            Ok(event @ (TripEvent::Saved { .. } | TripEvent::SaveFailed { .. } | TripEvent::Discarded)) => {
                return Some(event)
            }
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

/// Blocking stdin lives on its own thread so it never holds up runtime
/// shutdown
fn spawn_input_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}
