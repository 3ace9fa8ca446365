//! Logging initialization. Logs go to stderr; stdout carries command output.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `verbose` forces `debug`; otherwise
/// `RUST_LOG` is honoured with `info` as the fallback.
pub fn init(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_err| return EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
