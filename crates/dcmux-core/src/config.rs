//! Configuration for the session multiplexer.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $DCMUX_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/dcmux/config.toml
//!   3. ~/.config/dcmux/config.toml

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MuxConfig {
    pub retry: RetryConfig,
    pub limits: LimitsConfig,
}

/// Backoff between download-part retry attempts.
///
/// The download contract retries indefinitely; these knobs only shape the
/// spacing between attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Delay before the first retry, in milliseconds.
    pub initial_ms: u64,
    /// Multiplier applied per attempt.
    pub multiplier: f64,
    /// Ceiling on the delay, in milliseconds.
    pub max_ms: u64,
    /// Randomize each delay by ±50% to avoid synchronized retry storms.
    pub jitter: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum requests held while a session waits for its datacenter
    /// authorization token. Submissions beyond this fail fast.
    pub max_queued_requests: usize,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_ms: 200,
            multiplier: 2.0,
            max_ms: 5_000,
            jitter: true,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_queued_requests: 1024,
        }
    }
}

// ── Retry policy ──────────────────────────────────────────────────────────────

/// Runtime form of [`RetryConfig`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub initial: Duration,
    pub multiplier: f64,
    pub max: Duration,
    pub jitter: bool,
}

impl RetryPolicy {
    /// No delay between attempts. For tests and latency-critical callers
    /// that impose their own pacing.
    pub fn immediate() -> Self {
        Self {
            initial: Duration::ZERO,
            multiplier: 1.0,
            max: Duration::ZERO,
            jitter: false,
        }
    }

    /// Delay to wait before retry number `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if self.initial.is_zero() {
            return Duration::ZERO;
        }
        let base = self.initial.as_secs_f64() * self.multiplier.powi(attempt.min(32) as i32);
        let capped = base.min(self.max.as_secs_f64());
        let scaled = if self.jitter {
            use rand::Rng;
            capped * rand::thread_rng().gen_range(0.5..1.5)
        } else {
            capped
        };
        Duration::from_secs_f64(scaled)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            initial: Duration::from_millis(config.initial_ms),
            multiplier: config.multiplier,
            max: Duration::from_millis(config.max_ms),
            jitter: config.jitter,
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("dcmux")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl MuxConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            MuxConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("DCMUX_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&MuxConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply DCMUX_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("DCMUX_RETRY__INITIAL_MS") {
            if let Ok(ms) = v.parse() {
                self.retry.initial_ms = ms;
            }
        }
        if let Ok(v) = std::env::var("DCMUX_RETRY__MAX_MS") {
            if let Ok(ms) = v.parse() {
                self.retry.max_ms = ms;
            }
        }
        if let Ok(v) = std::env::var("DCMUX_RETRY__JITTER") {
            self.retry.jitter = v == "true" || v == "1";
        }
        if let Ok(v) = std::env::var("DCMUX_LIMITS__MAX_QUEUED_REQUESTS") {
            if let Ok(n) = v.parse() {
                self.limits.max_queued_requests = n;
            }
        }
    }
}
