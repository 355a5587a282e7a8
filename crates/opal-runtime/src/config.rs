//! Converts `opal-config`'s plain configuration DTOs into the live types
//! `opal-exec` and `opal-session` operate on.

use opal_config::RuntimeConfig;
use opal_exec::{BackoffStrategy, RetryConfig};
use opal_session::{PoolConfig, SshParams};
use std::time::Duration;

/// Build a [`RetryConfig`] from `config.retry`'s defaults, for embedders
/// constructing a retry node directly rather than through decoded call
/// parameters (which already carry their own per-call defaults).
#[must_use]
pub fn retry_config_from(config: &RuntimeConfig) -> RetryConfig {
    let strategy = match config.retry.backoff.as_str() {
        "exponential" => BackoffStrategy::Exponential,
        "linear" => BackoffStrategy::Linear,
        _ => BackoffStrategy::Constant,
    };
    RetryConfig {
        attempts: config.retry.attempts,
        delay: Duration::from_secs_f64(config.retry.delay_secs),
        strategy,
    }
}

/// Build a [`PoolConfig`] from `config.pool`'s defaults.
#[must_use]
pub fn pool_config_from(config: &RuntimeConfig) -> PoolConfig {
    PoolConfig {
        idle_timeout: Duration::from_secs(config.pool.idle_timeout_secs),
        max_size: config.pool.max_size,
    }
}

/// Seed an [`SshParams`] with `config.ssh`'s defaults, for `host`/`port`/
/// `user` to be filled in from a specific call's arguments afterward.
#[must_use]
pub fn ssh_defaults_from(config: &RuntimeConfig) -> SshParams {
    SshParams {
        known_hosts_path: config.ssh.known_hosts_path.clone(),
        key_path: config.ssh.identity_file.clone(),
        strict_host_key: config.ssh.strict_host_key,
        ..SshParams::default()
    }
}
