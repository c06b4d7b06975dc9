//! Tracing initialization hook.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initializes the global tracing subscriber with an env filter.
///
/// Configure via `RUST_LOG`, e.g. `RUST_LOG=debug,parlor_store=trace`.
/// Call once from the binary embedding the client; calling it twice
/// panics the way `tracing_subscriber::init` always does.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();
}
