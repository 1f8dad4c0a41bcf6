//! Rate presets and shared setup for the example studies in `src/`.

use tracing_subscriber::EnvFilter;

pub mod presets;

/// Install a global `tracing` subscriber writing to stderr, filtered by
/// `RUST_LOG` (default `info`).
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
