//! Process-wide tracing setup. Grounded on `storage_scrubber::init_logging`'s
//! `tracing_subscriber::registry().with(EnvFilter).with(fmt::Layer)` shape,
//! trimmed of its file-appender branch: this crate is a library embedded by a
//! host process, so it only ever installs a stderr layer and leaves log
//! destination/rotation to whatever binary links it.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a global `tracing` subscriber honoring `RUST_LOG`, defaulting to
/// `info`. Call once, early, from the embedding binary's `main`.
pub fn init_logging() {
    let stderr_logs = fmt::Layer::new()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(stderr_logs)
        .init();
}
