//! Configuration
//!
//! Defaults, optionally overlaid by a JSON file, then by environment
//! variables:
//!
//! | Variable                   | Field                          |
//! |----------------------------|--------------------------------|
//! | `SNAKE_HOST`               | `network.host`                 |
//! | `SNAKE_PORT`               | `network.port`                 |
//! | `SNAKE_CONNECT_TIMEOUT_MS` | `network.connect_timeout_ms`   |
//! | `SNAKE_PLAYER_NAME`        | `network.player_name`          |
//! | `SNAKE_CATCH_UP_STEPS`     | `session.catch_up_steps`       |
//! | `SNAKE_RESTART_DELAY`      | `session.restart_delay_ticks`  |

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    DEFAULT_CATCH_UP_STEPS, DEFAULT_HOST, DEFAULT_MAX_PAYLOAD_SIZE, DEFAULT_MAX_PENDING_OUTPUT,
    DEFAULT_PORT, DEFAULT_RECV_CHUNK_SIZE, DEFAULT_RESTART_DELAY_TICKS, MAX_PLAYERS, TICK_RATE,
};

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid JSON for this schema.
    #[error("invalid config file: {0}")]
    Json(#[from] serde_json::Error),

    /// A value is out of range or unparsable.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// Setting name.
        key: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// Transport and protocol settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to bind (host) or dial (join).
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Authority rejects connections beyond this many.
    pub max_connections: usize,
    /// Largest payload accepted in one frame.
    pub max_payload_size: usize,
    /// Unsent bytes a connection may hold; a peer that stops reading is
    /// dropped past this.
    pub max_pending_output: usize,
    /// Bytes reserved per receive call.
    pub recv_chunk_size: usize,
    /// Outbound connect timeout.
    pub connect_timeout_ms: u64,
    /// Seconds between follower pings.
    pub ping_interval_secs: f64,
    /// Name sent in the follower handshake.
    pub player_name: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_connections: MAX_PLAYERS,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            max_pending_output: DEFAULT_MAX_PENDING_OUTPUT,
            recv_chunk_size: DEFAULT_RECV_CHUNK_SIZE,
            connect_timeout_ms: 3000,
            ping_interval_secs: 1.0,
            player_name: "player".to_string(),
        }
    }
}

impl NetworkConfig {
    /// Connect timeout as a duration.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Game loop settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Simulation ticks per second.
    pub tick_rate: u32,
    /// Most ticks a follower simulates in one update.
    pub catch_up_steps: u32,
    /// Ticks between a round ending and the next one starting.
    pub restart_delay_ticks: u32,
    /// Fixed RNG seed for the authority; random when unset.
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_rate: TICK_RATE,
            catch_up_steps: DEFAULT_CATCH_UP_STEPS,
            restart_delay_ticks: DEFAULT_RESTART_DELAY_TICKS,
            seed: None,
        }
    }
}

impl SessionConfig {
    /// Wall-clock time per tick.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }
}

/// Full configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Transport and protocol.
    pub network: NetworkConfig,
    /// Game loop.
    pub session: SessionConfig,
}

impl Config {
    /// Defaults, then `path` if given, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON file. Missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Overlay variables returned by `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("SNAKE_HOST") {
            self.network.host = host;
        }
        if let Some(name) = lookup("SNAKE_PLAYER_NAME") {
            self.network.player_name = name;
        }
        parse_env(&lookup, "SNAKE_PORT", &mut self.network.port)?;
        parse_env(&lookup, "SNAKE_CONNECT_TIMEOUT_MS", &mut self.network.connect_timeout_ms)?;
        parse_env(&lookup, "SNAKE_CATCH_UP_STEPS", &mut self.session.catch_up_steps)?;
        parse_env(&lookup, "SNAKE_RESTART_DELAY", &mut self.session.restart_delay_ticks)?;
        Ok(())
    }

    /// Reject settings the loop cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("session.tick_rate", self.session.tick_rate as u64),
            ("session.catch_up_steps", self.session.catch_up_steps as u64),
            ("network.recv_chunk_size", self.network.recv_chunk_size as u64),
            ("network.max_payload_size", self.network.max_payload_size as u64),
            ("network.connect_timeout_ms", self.network.connect_timeout_ms),
        ];
        for (key, value) in checks {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        if self.network.max_pending_output < self.network.max_payload_size {
            return Err(ConfigError::InvalidValue {
                key: "network.max_pending_output".to_string(),
                reason: "must hold at least one full payload".to_string(),
            });
        }
        let ping = self.network.ping_interval_secs;
        if ping.is_nan() || ping <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "network.ping_interval_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_env<F, T>(lookup: &F, key: &str, target: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = lookup(key) {
        *target = raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
    }
    Ok(())
}
