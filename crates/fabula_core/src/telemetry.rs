//! Tracing initialization shared by the binaries.

use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber with an env-filter.
///
/// Respects `RUST_LOG`; defaults to `info` when unset. Safe to call more
/// than once — subsequent calls are no-ops, which keeps test binaries happy.
pub fn init_telemetry() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .try_init();
}
