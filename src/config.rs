//! Configuration module

use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::model::ThresholdConfig;
use crate::routing::{Backend, SelectionStrategy};
use crate::telemetry::StoreConfig;

/// Upper bound on the trailing window, one bucket per second
pub const MAX_HISTORY_SECONDS: u32 = 86_400;

pub const MAX_RECENT_CAPACITY: usize = 100_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("{0}")]
    Constraint(String),
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,

    /// Model artifact (JSON)
    pub model_path: String,

    /// Backend pool for ALLOW traffic
    pub backends: Vec<Backend>,

    /// Sent to backends in the `x-edge-secret` header
    pub shared_secret: String,

    pub strategy: SelectionStrategy,

    pub thresholds: ThresholdConfig,

    /// Recent-events ring capacity
    pub recent_capacity: usize,

    /// Trailing telemetry window in seconds
    pub history_seconds: u32,

    pub forward_timeout: Duration,

    /// Guards the telemetry reset endpoint when set
    pub admin_token: Option<String>,

    /// Environment (development, production)
    pub environment: String,
}

impl Default for Config {
    fn default() -> Self {
        let store = StoreConfig::default();
        Self {
            port: 3000,
            model_path: "model/model.json".to_string(),
            backends: Vec::new(),
            shared_secret: String::new(),
            strategy: SelectionStrategy::default(),
            thresholds: ThresholdConfig::default(),
            recent_capacity: store.recent_capacity,
            history_seconds: store.history_seconds,
            forward_timeout: Duration::from_millis(5000),
            admin_token: None,
            environment: "development".to_string(),
        }
    }
}

/// Parse `key` if set and non-empty, `default` otherwise
fn parse_var<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let backends = lookup("BACKEND_URLS")
            .or_else(|| lookup("RENDER_URLS"))
            .map(|raw| Backend::parse_list(&raw))
            .unwrap_or_default();

        let strategy = match lookup("SELECTION_STRATEGY").filter(|v| !v.trim().is_empty()) {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::Invalid { key: "SELECTION_STRATEGY", value })?,
            None => defaults.strategy,
        };

        let thresholds = ThresholdConfig {
            block: parse_var(&lookup, "BLOCK_THRESHOLD", defaults.thresholds.block)?,
            reroute: parse_var(&lookup, "REROUTE_THRESHOLD", defaults.thresholds.reroute)?,
        };

        let timeout_ms: u64 = parse_var(
            &lookup,
            "FORWARD_TIMEOUT_MS",
            defaults.forward_timeout.as_millis() as u64,
        )?;

        let config = Self {
            port: parse_var(&lookup, "PORT", defaults.port)?,
            model_path: lookup("MODEL_PATH")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.model_path),
            backends,
            shared_secret: lookup("EDGE_SHARED_SECRET").unwrap_or_default(),
            strategy,
            thresholds,
            recent_capacity: parse_var(&lookup, "RECENT_CAPACITY", defaults.recent_capacity)?,
            history_seconds: parse_var(&lookup, "HISTORY_SECONDS", defaults.history_seconds)?,
            forward_timeout: Duration::from_millis(timeout_ms),
            admin_token: lookup("ADMIN_TOKEN").filter(|v| !v.is_empty()),
            environment: lookup("ENVIRONMENT").unwrap_or(defaults.environment),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.thresholds.is_valid() {
            return Err(ConfigError::Constraint(format!(
                "Thresholds must satisfy 0 <= REROUTE_THRESHOLD ({}) <= BLOCK_THRESHOLD ({}) <= 1",
                self.thresholds.reroute, self.thresholds.block
            )));
        }

        if self.recent_capacity == 0 || self.recent_capacity > MAX_RECENT_CAPACITY {
            return Err(ConfigError::Constraint(format!(
                "RECENT_CAPACITY must be between 1 and {}",
                MAX_RECENT_CAPACITY
            )));
        }

        if self.history_seconds < 10 || self.history_seconds > MAX_HISTORY_SECONDS {
            return Err(ConfigError::Constraint(format!(
                "HISTORY_SECONDS must be between 10 and {}",
                MAX_HISTORY_SECONDS
            )));
        }

        if self.forward_timeout.is_zero() {
            return Err(ConfigError::Constraint("FORWARD_TIMEOUT_MS must be positive".to_string()));
        }

        for (i, backend) in self.backends.iter().enumerate() {
            if self.backends[..i].iter().any(|b| b.id == backend.id) {
                return Err(ConfigError::Constraint(format!("Duplicate backend id: {}", backend.id)));
            }
        }

        Ok(())
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            recent_capacity: self.recent_capacity,
            history_seconds: self.history_seconds,
        }
    }

    pub fn has_secret(&self) -> bool {
        !self.shared_secret.is_empty()
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
