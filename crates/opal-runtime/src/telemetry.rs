//! Process-wide `tracing` subscriber installation.
//!
//! This is the only place in the workspace that installs a global
//! subscriber; every other crate only emits `tracing` events against
//! whatever the embedding process installed.

use opal_config::RuntimeConfig;
use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber filtered by `config.log_level`, falling back
/// to `opal=info` when unset. `RUST_LOG` still overrides this if set, per
/// [`EnvFilter`]'s usual precedence.
pub fn init(config: &RuntimeConfig) {
    let default_directive = match config.log_level.as_deref() {
        Some(level) => format!("opal={level}"),
        None => "opal=info".to_string(),
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
