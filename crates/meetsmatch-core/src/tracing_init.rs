//! Tracing/logging initialization for `MeetsMatch` binaries.
//!
//! Installs a `tracing_subscriber` registry with an env-filter and either
//! human-readable or JSON line output.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Build the default filter directive for a crate, e.g. `meetsmatch_api=info`.
pub fn default_directive(crate_name: &str, level: &str) -> String {
    let level = match level.to_ascii_lowercase().as_str() {
        l @ ("trace" | "debug" | "info" | "warn" | "error" | "off") => l.to_string(),
        _ => "info".to_string(),
    };
    format!("{}={level}", crate_name.replace('-', "_"))
}

/// Initialise the global tracing subscriber.
///
/// * `default_filter` -- directive used when `RUST_LOG` is not set
///   (see [`default_directive`]).
/// * `log_json` -- when `true`, emit structured JSON log lines instead of the
///   human-readable format.
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(default_filter: &str, log_json: bool) -> crate::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| crate::Error::Config(format!("Invalid log filter: {e}")))?;

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    result.map_err(|e| crate::Error::Config(format!("Tracing already initialised: {e}")))
}
