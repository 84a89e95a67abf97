// src/location/gpsd.rs
//! gpsd client that feeds position reports to the trip recorder

use super::{
    provider::{LocationProvider, LocationRequest, LocationSink},
    sample::LocationSample,
};
use crate::error::{Result, TripError};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
    task::JoinHandle,
    time::Instant,
};

#[derive(Debug, Deserialize)]
struct GpsdMessage {
    class: String,
    #[serde(flatten)]
    data: HashMap<String, serde_json::Value>,
}

/// Connect to a gpsd daemon and return a stream reader
pub async fn connect_gpsd(host: &str, port: u16) -> Result<BufReader<TcpStream>> {
    let mut stream = TcpStream::connect(format!("{}:{}", host, port))
        .await
        .map_err(|e| TripError::Connection(format!("Failed to connect to gpsd at {}:{}: {}", host, port, e)))?;

    // Send WATCH command to start receiving JSON data
    let watch_cmd = "?WATCH={\"enable\":true,\"json\":true}\n";
    stream
        .write_all(watch_cmd.as_bytes())
        .await
        .map_err(|e| TripError::Connection(format!("Failed to send WATCH command: {}", e)))?;

    Ok(BufReader::new(stream))
}

/// Parse one line of gpsd JSON into a location sample.
///
/// Returns `Ok(None)` for other report classes, for TPV reports without a
/// 2D/3D fix, and for fixes that carry no horizontal error estimate.
pub fn parse_tpv(line: &str) -> Result<Option<LocationSample>> {
    let msg: GpsdMessage = serde_json::from_str(line)
        .map_err(|e| TripError::Parse(format!("Failed to parse gpsd JSON: {}", e)))?;

    if msg.class != "TPV" {
        if msg.class == "VERSION" {
            if let Some(release) = msg.data.get("release").and_then(|v| v.as_str()) {
                tracing::info!("Connected to gpsd version {}", release);
            }
        }
        return Ok(None);
    }

    let field = |name: &str| msg.data.get(name).and_then(|v| v.as_f64());

    let mode = msg.data.get("mode").and_then(|v| v.as_u64()).unwrap_or(0);
    if mode < 2 {
        return Ok(None);
    }

    let (latitude, longitude) = match (field("lat"), field("lon")) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => return Ok(None),
    };

    let accuracy = match (field("eph"), field("epx"), field("epy")) {
        (Some(eph), _, _) => eph,
        (None, Some(epx), Some(epy)) => epx.hypot(epy),
        _ => {
            tracing::debug!("TPV report without error estimate, skipping");
            return Ok(None);
        }
    };

    let timestamp = msg
        .data
        .get("time")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    Ok(Some(LocationSample::new(
        timestamp,
        latitude,
        longitude,
        accuracy,
        field("speed").unwrap_or(0.0),
    )))
}

/// Location provider backed by a gpsd daemon.
///
/// Each `request_updates` opens a fresh connection in a background task that
/// runs until `remove_updates` clears its running flag.
pub struct GpsdProvider {
    host: String,
    port: u16,
    running: Mutex<Option<Arc<AtomicBool>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl GpsdProvider {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            running: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    async fn stream_reports(
        host: String,
        port: u16,
        request: LocationRequest,
        sink: LocationSink,
        running: Arc<AtomicBool>,
    ) {
        let mut reader = match connect_gpsd(&host, port).await {
            Ok(reader) => reader,
            Err(e) => {
                tracing::error!("{}", e);
                return;
            }
        };
        tracing::info!("Streaming locations from gpsd at {}:{}", host, port);

        let mut line = String::new();
        let mut last_sent: Option<Instant> = None;

        while running.load(Ordering::Relaxed) {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    tracing::warn!("gpsd closed the connection");
                    break;
                }
                Ok(_) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match parse_tpv(line) {
                        Ok(Some(sample)) => {
                            // gpsd reports at device rate; honour the requested cadence
                            if last_sent.map_or(false, |t| t.elapsed() < request.min_interval) {
                                continue;
                            }
                            if !running.load(Ordering::Relaxed) || !sink.send(sample) {
                                break;
                            }
                            last_sent = Some(Instant::now());
                        }
                        Ok(None) => {}
                        Err(e) => tracing::warn!("{}", e),
                    }
                }
                Err(e) => {
                    tracing::error!("Error reading from gpsd: {}", e);
                    break;
                }
            }
        }
        tracing::debug!("gpsd stream stopped");
    }
}

impl LocationProvider for GpsdProvider {
    fn has_permission(&self) -> bool {
        true
    }

    fn request_updates(&self, request: LocationRequest, sink: LocationSink) -> Result<()> {
        self.remove_updates();

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TripError::Other(format!("gpsd provider needs a tokio runtime: {}", e)))?;

        let running = Arc::new(AtomicBool::new(true));
        let handle = runtime.spawn(Self::stream_reports(
            self.host.clone(),
            self.port,
            request,
            sink,
            Arc::clone(&running),
        ));

        if let Ok(mut guard) = self.running.lock() {
            *guard = Some(running);
        }
        if let Ok(mut guard) = self.task.lock() {
            *guard = Some(handle);
        }
        Ok(())
    }

    fn remove_updates(&self) {
        if let Ok(mut guard) = self.running.lock() {
            if let Some(flag) = guard.take() {
                flag.store(false, Ordering::Relaxed);
            }
        }
        if let Ok(mut guard) = self.task.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}

impl Drop for GpsdProvider {
    fn drop(&mut self) {
        self.remove_updates();
    }
}
