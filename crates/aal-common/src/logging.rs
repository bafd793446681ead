//! Logging bootstrap shared by every AAL-PIP binary.

use tracing_subscriber::EnvFilter;

/// Initializes a `tracing` subscriber with `info` as the default level,
/// honoring `RUST_LOG` when set. Call once at the top of `main()`.
pub fn init(process_name: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    tracing::info!(process = process_name, "starting");
}
