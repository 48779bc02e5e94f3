//! Tracing setup driven by `[logging]`.
//!
//! `RUST_LOG` always wins. Otherwise the filter is the configured level plus
//! per-target overrides, with the HTTP and SQL plumbing held at `warn`.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

use crate::config::LoggingConfig;

/// Targets kept quiet unless `[logging.targets]` names them.
const QUIET_TARGETS: &[&str] = &["hyper", "hyper_util", "h2", "reqwest", "sqlx"];

static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

/// Installs the subscriber with default logging settings.
///
/// Called before the config is read so that config errors are logged too.
pub fn init_tracing() {
    let filter = env_filter().unwrap_or_else(|| filter_for(&LoggingConfig::default()));
    let (layer, handle) = reload::Layer::new(filter);
    let _ = FILTER_HANDLE.set(handle);

    let _ = tracing_subscriber::registry()
        .with(layer)
        .with(fmt::layer())
        .try_init();
}

/// Swaps in the filter built from the loaded config.
pub fn apply_logging(config: &LoggingConfig) {
    if env_filter().is_some() {
        return;
    }
    if let Some(handle) = FILTER_HANDLE.get() {
        let _ = handle.modify(|filter| *filter = filter_for(config));
    }
}

fn env_filter() -> Option<EnvFilter> {
    std::env::var_os("RUST_LOG").and_then(|_| EnvFilter::try_from_default_env().ok())
}

/// `level[,target=level...]` directive string for `config`.
pub fn directives(config: &LoggingConfig) -> String {
    let mut parts = vec![config.level.to_ascii_lowercase()];
    for target in QUIET_TARGETS {
        if !config.targets.contains_key(*target) {
            parts.push(format!("{target}=warn"));
        }
    }
    for (target, level) in &config.targets {
        parts.push(format!("{target}={}", level.to_ascii_lowercase()));
    }
    parts.join(",")
}

fn filter_for(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::new(directives(config))
}
