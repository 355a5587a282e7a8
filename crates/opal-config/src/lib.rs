// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading, validation, and merging for the Opal decorator
//! runtime.
//!
//! This crate provides [`RuntimeConfig`] — the top-level settings
//! `opal-runtime` loads before wiring the other crates together — together
//! with helpers for loading from TOML files, merging overlays, and
//! producing advisory [`ConfigWarning`]s. It deliberately carries no
//! dependency on `opal-exec`/`opal-session`: the defaults here are plain
//! data, converted into those crates' live config types by `opal-runtime`.
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory-level issues that do not prevent operation but deserve attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A recommended optional field is missing.
    MissingOptionalField {
        /// Name of the missing field.
        field: String,
        /// Why it matters.
        hint: String,
    },
    /// A timeout is unusually large.
    LargeTimeout {
        /// Which default this is (`"timeout"` or `"retry_delay"`).
        which: String,
        /// Value in seconds.
        secs: u64,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingOptionalField { field, hint } => {
                write!(f, "missing optional field '{field}': {hint}")
            }
            Self::LargeTimeout { which, secs } => {
                write!(f, "'{which}' is unusually large ({secs}s)")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Default retry behavior applied when a `@retry` call omits a parameter.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RetryDefaults {
    /// Default attempt count.
    pub attempts: u32,
    /// Default base delay, in seconds.
    pub delay_secs: f64,
    /// Default backoff strategy (`"constant"`, `"linear"`, `"exponential"`).
    pub backoff: String,
}

impl Default for RetryDefaults {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay_secs: 1.0,
            backoff: "constant".to_string(),
        }
    }
}

/// Default timeout behavior applied when a `@timeout` call omits its
/// duration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutDefaults {
    /// Default timeout, in seconds.
    pub duration_secs: f64,
}

impl Default for TimeoutDefaults {
    fn default() -> Self {
        Self { duration_secs: 30.0 }
    }
}

/// Defaults for the session pool's eviction policy.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PoolDefaults {
    /// Idle timeout, in seconds, before a pooled session is evicted.
    pub idle_timeout_secs: u64,
    /// Optional cap on the number of distinct pooled sessions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size: Option<usize>,
}

impl Default for PoolDefaults {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 300,
            max_size: None,
        }
    }
}

/// Defaults for the SSH transport.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(default)]
pub struct SshDefaults {
    /// Default `known_hosts` file path, if not overridden per call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub known_hosts_path: Option<String>,
    /// Default private key path, if not overridden per call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<String>,
    /// Whether host key verification is required by default.
    pub strict_host_key: bool,
}

/// Top-level runtime configuration for the Opal decorator runtime.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Log level override (e.g. `"debug"`, `"info"`, `"warn"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    /// Retry defaults.
    pub retry: RetryDefaults,
    /// Timeout defaults.
    pub timeout: TimeoutDefaults,
    /// Session pool defaults.
    pub pool: PoolDefaults,
    /// SSH transport defaults.
    pub ssh: SshDefaults,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            retry: RetryDefaults::default(),
            timeout: TimeoutDefaults::default(),
            pool: PoolDefaults::default(),
            ssh: SshDefaults { strict_host_key: true, ..SshDefaults::default() },
        }
    }
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const VALID_LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];
const VALID_BACKOFF_STRATEGIES: &[&str] = &["constant", "linear", "exponential"];
const LARGE_TIMEOUT_THRESHOLD_SECS: f64 = 3_600.0;

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load a [`RuntimeConfig`] from an optional TOML file path.
///
/// * If `path` is `Some`, reads and parses the file.
/// * If `path` is `None`, returns [`RuntimeConfig::default()`].
///
/// Environment variable overrides are applied on top in both cases.
pub fn load_config(path: Option<&Path>) -> Result<RuntimeConfig, ConfigError> {
    let mut config = match path {
        Some(p) => {
            let content = std::fs::read_to_string(p).map_err(|_| ConfigError::FileNotFound {
                path: p.display().to_string(),
            })?;
            parse_toml(&content)?
        }
        None => RuntimeConfig::default(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Parse a TOML string into a [`RuntimeConfig`].
pub fn parse_toml(content: &str) -> Result<RuntimeConfig, ConfigError> {
    toml::from_str::<RuntimeConfig>(content).map_err(|e| ConfigError::ParseError { reason: e.to_string() })
}

// ---------------------------------------------------------------------------
// Env overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides.
///
/// Recognised variables: `OPAL_LOG_LEVEL`, `OPAL_SSH_KNOWN_HOSTS`,
/// `OPAL_SSH_IDENTITY_FILE`.
pub fn apply_env_overrides(config: &mut RuntimeConfig) {
    if let Ok(val) = std::env::var("OPAL_LOG_LEVEL") {
        config.log_level = Some(val);
    }
    if let Ok(val) = std::env::var("OPAL_SSH_KNOWN_HOSTS") {
        config.ssh.known_hosts_path = Some(val);
    }
    if let Ok(val) = std::env::var("OPAL_SSH_IDENTITY_FILE") {
        config.ssh.identity_file = Some(val);
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a parsed configuration, returning advisory warnings.
///
/// Hard errors (invalid log level, unknown backoff strategy) are returned
/// as a [`ConfigError::ValidationError`]; soft issues come back as warnings.
pub fn validate_config(config: &RuntimeConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<ConfigWarning> = Vec::new();

    if let Some(ref level) = config.log_level {
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            errors.push(format!("invalid log_level '{level}'"));
        }
    }

    if !VALID_BACKOFF_STRATEGIES.contains(&config.retry.backoff.as_str()) {
        errors.push(format!("invalid retry.backoff '{}'", config.retry.backoff));
    }
    if config.retry.attempts == 0 {
        errors.push("retry.attempts must be at least 1".to_string());
    }

    if config.timeout.duration_secs <= 0.0 {
        errors.push("timeout.duration_secs must be positive".to_string());
    } else if config.timeout.duration_secs > LARGE_TIMEOUT_THRESHOLD_SECS {
        warnings.push(ConfigWarning::LargeTimeout {
            which: "timeout.duration_secs".to_string(),
            secs: config.timeout.duration_secs as u64,
        });
    }

    if config.ssh.known_hosts_path.is_none() {
        warnings.push(ConfigWarning::MissingOptionalField {
            field: "ssh.known_hosts_path".to_string(),
            hint: "host key verification will use the user's default known_hosts file".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

// ---------------------------------------------------------------------------
// Merging
// ---------------------------------------------------------------------------

/// Merge two configurations. Values in `overlay` take precedence over
/// `base`.
pub fn merge_configs(base: RuntimeConfig, overlay: RuntimeConfig) -> RuntimeConfig {
    RuntimeConfig {
        log_level: overlay.log_level.or(base.log_level),
        retry: overlay.retry,
        timeout: overlay.timeout,
        pool: overlay.pool,
        ssh: SshDefaults {
            known_hosts_path: overlay.ssh.known_hosts_path.or(base.ssh.known_hosts_path),
            identity_file: overlay.ssh.identity_file.or(base.ssh.identity_file),
            strict_host_key: overlay.ssh.strict_host_key,
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
