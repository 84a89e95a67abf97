// src/config.rs
//! Tracker settings with JSON file storage

use crate::error::{Result, TripError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// When false, no location updates are requested or accepted while running.
    pub background_tracking_enabled: bool,
    pub location_update_interval_ms: u64,
    pub accuracy_threshold_meters: f64,
    pub movement_threshold_meters: f64,
    pub inactivity_timeout_ms: u64,
    pub clock_tick_ms: u64,
    pub store_path: Option<PathBuf>,
    pub gpsd_host: String,
    pub gpsd_port: u16,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            background_tracking_enabled: true,
            location_update_interval_ms: 5000,
            accuracy_threshold_meters: 50.0,
            movement_threshold_meters: 10.0,
            inactivity_timeout_ms: 10_000,
            clock_tick_ms: 50,
            store_path: None,
            gpsd_host: "localhost".to_string(),
            gpsd_port: 2947,
        }
    }
}

impl TrackerConfig {
    /// Load configuration from the default location, falling back to defaults
    /// when no file exists yet
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| TripError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| TripError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| TripError::Config(format!("Failed to create config directory: {}", e)))?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .map_err(|e| TripError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Reject settings the tracker cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.location_update_interval_ms == 0 {
            return Err(TripError::Config("location update interval must be positive".to_string()));
        }
        if self.inactivity_timeout_ms == 0 {
            return Err(TripError::Config("inactivity timeout must be positive".to_string()));
        }
        if self.clock_tick_ms == 0 {
            return Err(TripError::Config("clock tick must be positive".to_string()));
        }
        if !(self.accuracy_threshold_meters > 0.0) {
            return Err(TripError::Config("accuracy threshold must be positive".to_string()));
        }
        if !(self.movement_threshold_meters > 0.0) {
            return Err(TripError::Config("movement threshold must be positive".to_string()));
        }
        Ok(())
    }

    fn home_dir() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .map_err(|_| TripError::Config("HOME environment variable not set".to_string()))?;
        Ok(PathBuf::from(home))
    }

    pub fn get_config_path() -> Result<PathBuf> {
        Ok(Self::home_dir()?.join(".config").join("trip-recorder").join("config.json"))
    }

    /// Where finished trips are kept, unless `store_path` overrides it
    pub fn resolved_store_path(&self) -> Result<PathBuf> {
        match &self.store_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::home_dir()?
                .join(".local")
                .join("share")
                .join("trip-recorder")
                .join("trips.json")),
        }
    }

    pub fn update_background_tracking(&mut self, enabled: bool) {
        self.background_tracking_enabled = enabled;
    }

    pub fn update_location_interval(&mut self, interval_ms: u64) {
        self.location_update_interval_ms = interval_ms;
    }

    pub fn location_update_interval(&self) -> Duration {
        Duration::from_millis(self.location_update_interval_ms)
    }

    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_millis(self.inactivity_timeout_ms)
    }

    pub fn clock_tick(&self) -> Duration {
        Duration::from_millis(self.clock_tick_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TrackerConfig::default();
        assert!(config.background_tracking_enabled);
        assert_eq!(config.location_update_interval(), Duration::from_secs(5));
        assert_eq!(config.accuracy_threshold_meters, 50.0);
        assert_eq!(config.movement_threshold_meters, 10.0);
        assert_eq!(config.inactivity_timeout(), Duration::from_secs(10));
        assert_eq!(config.clock_tick(), Duration::from_millis(50));
    }

    #[test]
    fn test_settings_updates() {
        let mut config = TrackerConfig::default();
        config.update_background_tracking(false);
        config.update_location_interval(2000);
        assert!(!config.background_tracking_enabled);
        assert_eq!(config.location_update_interval_ms, 2000);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"location_update_interval_ms": 1000}"#).unwrap();

        let config = TrackerConfig::load_from(&path).unwrap();
        assert_eq!(config.location_update_interval_ms, 1000);
        assert!(config.background_tracking_enabled);
        assert_eq!(config.gpsd_port, 2947);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = TrackerConfig::default();
        config.update_background_tracking(false);
        config.save_to(&path).unwrap();

        assert_eq!(TrackerConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrackerConfig::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, TrackerConfig::default());
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = TrackerConfig::default();
        config.update_location_interval(0);
        assert!(matches!(config.validate(), Err(TripError::Config(_))));
    }
}
