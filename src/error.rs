// src/error.rs
//! Error types for the trip recorder

use std::fmt;

pub type Result<T> = std::result::Result<T, TripError>;

#[derive(Debug)]
pub enum TripError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Connection(String),
    Parse(String),
    /// Location permission has not been granted; prompt the user and retry `start()`.
    PermissionDenied,
    Config(String),
    Store(String),
    /// The tracker service task is no longer running.
    ServiceStopped,
    Other(String),
}

impl fmt::Display for TripError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TripError::Io(e) => write!(f, "IO error: {}", e),
            TripError::Json(e) => write!(f, "JSON error: {}", e),
            TripError::Connection(msg) => write!(f, "Connection error: {}", msg),
            TripError::Parse(msg) => write!(f, "Parse error: {}", msg),
            TripError::PermissionDenied => write!(f, "Location permission not granted"),
            TripError::Config(msg) => write!(f, "Configuration error: {}", msg),
            TripError::Store(msg) => write!(f, "Trip store error: {}", msg),
            TripError::ServiceStopped => write!(f, "Trip tracker service has stopped"),
            TripError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for TripError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TripError::Io(e) => Some(e),
            TripError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TripError {
    fn from(error: std::io::Error) -> Self {
        TripError::Io(error)
    }
}

impl From<serde_json::Error> for TripError {
    fn from(error: serde_json::Error) -> Self {
        TripError::Json(error)
    }
}

impl From<anyhow::Error> for TripError {
    fn from(error: anyhow::Error) -> Self {
        TripError::Other(error.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for TripError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        TripError::ServiceStopped
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for TripError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        TripError::ServiceStopped
    }
}
