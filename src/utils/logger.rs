//! Logging setup for the `shellbridge` binary

use tracing_subscriber::{EnvFilter, fmt};

/// Install a `tracing` subscriber filtered by `RUST_LOG`.
///
/// Defaults to `shellbridge=info`, or `shellbridge=debug` when `verbose` is
/// set. Calling it again after a subscriber exists does nothing.
pub fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("shellbridge=debug")
        } else {
            EnvFilter::new("shellbridge=info")
        }
    });

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .ok();
}
