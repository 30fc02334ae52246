//! Tracing subscriber setup for binaries and tests.

use std::sync::OnceLock;

use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding a filter directive that overrides the
/// configured level.
pub const LOG_ENV: &str = "GKB_LOG";

/// Installs the global fmt subscriber, writing to stderr.
///
/// The filter comes from `GKB_LOG`, then `RUST_LOG`, then `default_level`.
/// Later calls are no-ops, so tests and binaries can both call it.
pub fn init_logging(default_level: &str) {
    static INSTALLED: OnceLock<()> = OnceLock::new();
    INSTALLED.get_or_init(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV)
            .or_else(|_| EnvFilter::try_from_default_env())
            .or_else(|_| EnvFilter::try_new(default_level))
            .unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .try_init();
    });
}
