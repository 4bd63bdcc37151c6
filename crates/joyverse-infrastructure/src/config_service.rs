//! Configuration service implementation.
//!
//! This module provides a ConfigService that loads the engine configuration
//! from the configuration file (~/.config/joyverse/config.toml), creating it
//! with defaults when missing, and applies environment-variable overrides
//! for the two service URLs.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::warn;

use joyverse_core::error::{JoyverseError, Result};

use crate::paths::config_file_path;

const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";
const DEFAULT_CLASSIFIER_URL: &str = "http://localhost:8000";

/// Engine configuration: service endpoints and loop timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base URL of the Joyverse backend (session persistence)
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    /// Base URL of the FER classifier service
    #[serde(default = "default_classifier_url")]
    pub classifier_url: String,
    /// Seconds between emotion probes while playing
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,
    /// Seconds before the first probe after play starts
    #[serde(default = "default_initial_probe_delay_secs")]
    pub initial_probe_delay_secs: u64,
    /// Seconds between periodic flushes of an unconsumed pending emotion
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
    /// Per-request timeout for classifier calls, in seconds
    #[serde(default = "default_capture_timeout_secs")]
    pub capture_timeout_secs: u64,
    /// Per-request timeout for backend calls, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_backend_url() -> String {
    DEFAULT_BACKEND_URL.to_string()
}
fn default_classifier_url() -> String {
    DEFAULT_CLASSIFIER_URL.to_string()
}
fn default_probe_interval_secs() -> u64 {
    10
}
fn default_initial_probe_delay_secs() -> u64 {
    10
}
fn default_flush_interval_secs() -> u64 {
    30
}
fn default_capture_timeout_secs() -> u64 {
    8
}
fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            classifier_url: default_classifier_url(),
            probe_interval_secs: default_probe_interval_secs(),
            initial_probe_delay_secs: default_initial_probe_delay_secs(),
            flush_interval_secs: default_flush_interval_secs(),
            capture_timeout_secs: default_capture_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl EngineConfig {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }

    pub fn initial_probe_delay(&self) -> Duration {
        Duration::from_secs(self.initial_probe_delay_secs)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_secs(self.capture_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Configuration service that loads and caches the engine configuration.
///
/// The file is read once and cached to avoid repeated I/O; URL overrides
/// from JOYVERSE_BACKEND_URL / JOYVERSE_CLASSIFIER_URL are applied on top
/// of whatever the file holds.
#[derive(Debug, Clone)]
pub struct ConfigService {
    /// Cached configuration loaded from file.
    config: Arc<RwLock<Option<EngineConfig>>>,
    /// Config file location; overridable for tests.
    path: Option<PathBuf>,
}

impl ConfigService {
    /// Creates a service against the default config location.
    ///
    /// The configuration is loaded lazily on first access.
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(None)),
            path: None,
        }
    }

    /// Creates a service reading from an explicit file path.
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            config: Arc::new(RwLock::new(None)),
            path: Some(path),
        }
    }

    /// Gets the engine configuration, loading from file if not cached.
    pub fn get_config(&self) -> EngineConfig {
        {
            let read_lock = self.config.read().unwrap();
            if let Some(ref cached) = *read_lock {
                return cached.clone();
            }
        }

        let loaded = self.load_config().unwrap_or_else(|err| {
            warn!(error = %err, "failed to load engine config, using defaults");
            EngineConfig::default()
        });
        let loaded = apply_env_overrides(loaded);

        {
            let mut write_lock = self.config.write().unwrap();
            *write_lock = Some(loaded.clone());
        }

        loaded
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        let mut write_lock = self.config.write().unwrap();
        *write_lock = None;
    }

    fn load_config(&self) -> Result<EngineConfig> {
        let path = match &self.path {
            Some(path) => path.clone(),
            None => config_file_path()?,
        };

        if !path.exists() {
            let config = EngineConfig::default();
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, toml::to_string_pretty(&config)?)?;
            return Ok(config);
        }

        let content = fs::read_to_string(&path).map_err(|err| {
            JoyverseError::config(format!(
                "failed to read config file at {}: {err}",
                path.display()
            ))
        })?;
        Ok(toml::from_str(&content)?)
    }
}

impl Default for ConfigService {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_env_overrides(mut config: EngineConfig) -> EngineConfig {
    if let Ok(url) = env::var("JOYVERSE_BACKEND_URL") {
        config.backend_url = url;
    }
    if let Ok(url) = env::var("JOYVERSE_CLASSIFIER_URL") {
        config.classifier_url = url;
    }
    config
}
