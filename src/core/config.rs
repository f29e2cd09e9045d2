//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::{LotError, Result};

/// Full configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub limits: LimitsConfig,
    pub logging: LoggingConfig,
    pub paths: PathsConfig,
}

/// Allocation/release concurrency knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Policy evaluations attempted before a lost race surfaces as a conflict.
    pub max_allocation_attempts: u32,
    /// Bounded wait for a lot's exclusive allocation access.
    pub lock_timeout_ms: u64,
}

/// Request field limits applied by the service layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_lot_name_len: usize,
    pub max_license_plate_len: usize,
}

/// Activity log sinks and tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub jsonl_enabled: bool,
    pub sqlite_enabled: bool,
    pub channel_capacity: usize,
    pub jsonl_max_bytes: u64,
    pub jsonl_max_rotated_files: u32,
    pub fsync_interval_secs: u64,
}

/// Filesystem paths used by lota.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub state_file: PathBuf,
    pub sqlite_db: PathBuf,
    pub jsonl_log: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_allocation_attempts: 3,
            lock_timeout_ms: 250,
        }
    }
}

impl EngineConfig {
    /// Lock wait as a `Duration`.
    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_lot_name_len: 100,
            max_license_plate_len: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            jsonl_enabled: true,
            sqlite_enabled: true,
            channel_capacity: 1024,
            jsonl_max_bytes: 50 * 1024 * 1024,
            jsonl_max_rotated_files: 5,
            fsync_interval_secs: 10,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!(
                    "[LOT-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths"
                );
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        let cfg = home_dir.join(".config").join("lota").join("config.toml");
        let data = home_dir.join(".local").join("share").join("lota");
        Self {
            config_file: cfg,
            state_file: data.join("state.json"),
            sqlite_db: data.join("activity.sqlite3"),
            jsonl_log: data.join("activity.jsonl"),
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| LotError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(LotError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for logging.
    ///
    /// FNV-1a over the canonical JSON form, stable across processes.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        // engine
        if let Some(raw) = lookup("LOT_ENGINE_MAX_ALLOCATION_ATTEMPTS") {
            self.engine.max_allocation_attempts =
                parse_env("LOT_ENGINE_MAX_ALLOCATION_ATTEMPTS", &raw)?;
        }
        if let Some(raw) = lookup("LOT_ENGINE_LOCK_TIMEOUT_MS") {
            self.engine.lock_timeout_ms = parse_env("LOT_ENGINE_LOCK_TIMEOUT_MS", &raw)?;
        }

        // limits
        if let Some(raw) = lookup("LOT_LIMITS_MAX_LOT_NAME_LEN") {
            self.limits.max_lot_name_len = parse_env("LOT_LIMITS_MAX_LOT_NAME_LEN", &raw)?;
        }
        if let Some(raw) = lookup("LOT_LIMITS_MAX_LICENSE_PLATE_LEN") {
            self.limits.max_license_plate_len =
                parse_env("LOT_LIMITS_MAX_LICENSE_PLATE_LEN", &raw)?;
        }

        // logging
        if let Some(raw) = lookup("LOT_LOGGING_JSONL_ENABLED") {
            self.logging.jsonl_enabled = parse_env("LOT_LOGGING_JSONL_ENABLED", &raw)?;
        }
        if let Some(raw) = lookup("LOT_LOGGING_SQLITE_ENABLED") {
            self.logging.sqlite_enabled = parse_env("LOT_LOGGING_SQLITE_ENABLED", &raw)?;
        }
        if let Some(raw) = lookup("LOT_LOGGING_CHANNEL_CAPACITY") {
            self.logging.channel_capacity = parse_env("LOT_LOGGING_CHANNEL_CAPACITY", &raw)?;
        }

        // paths
        if let Some(raw) = lookup("LOT_STATE_FILE") {
            self.paths.state_file = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("LOT_SQLITE_DB") {
            self.paths.sqlite_db = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("LOT_JSONL_LOG") {
            self.paths.jsonl_log = PathBuf::from(raw);
        }

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.engine.max_allocation_attempts == 0 {
            return Err(LotError::InvalidConfig {
                details: "engine.max_allocation_attempts must be >= 1".to_string(),
            });
        }
        if self.engine.lock_timeout_ms == 0 {
            return Err(LotError::InvalidConfig {
                details: "engine.lock_timeout_ms must be > 0".to_string(),
            });
        }

        for (name, val) in [
            ("max_lot_name_len", self.limits.max_lot_name_len),
            ("max_license_plate_len", self.limits.max_license_plate_len),
        ] {
            if val == 0 {
                return Err(LotError::InvalidConfig {
                    details: format!("limits.{name} must be >= 1"),
                });
            }
        }

        if self.logging.channel_capacity == 0 {
            return Err(LotError::InvalidConfig {
                details: "logging.channel_capacity must be >= 1".to_string(),
            });
        }
        if self.logging.jsonl_enabled && self.logging.jsonl_max_bytes < 4096 {
            return Err(LotError::InvalidConfig {
                details: format!(
                    "logging.jsonl_max_bytes ({}) must be >= 4096",
                    self.logging.jsonl_max_bytes
                ),
            });
        }

        if self.paths.state_file.as_os_str().is_empty() {
            return Err(LotError::InvalidConfig {
                details: "paths.state_file must not be empty".to_string(),
            });
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env<T>(name: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|error| LotError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}
