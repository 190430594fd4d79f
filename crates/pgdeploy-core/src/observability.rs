//! Logging setup shared by binaries.
//!
//! Events go to stderr so that stdout stays free for JSON results.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
#[error("failed to initialize logging: {0}")]
pub struct LoggingError(String);

/// `-q` wins over `-v`; otherwise 0 = INFO, 1 = DEBUG, 2+ = TRACE.
pub fn level_for(verbose: u8, quiet: bool) -> LevelFilter {
    match (quiet, verbose) {
        (true, _) => LevelFilter::ERROR,
        (false, 0) => LevelFilter::INFO,
        (false, 1) => LevelFilter::DEBUG,
        (false, _) => LevelFilter::TRACE,
    }
}

/// Install the global fmt subscriber. `RUST_LOG` directives, when set, refine the level.
pub fn init_logging(verbose: u8, quiet: bool) -> Result<(), LoggingError> {
    let filter = EnvFilter::builder()
        .with_default_directive(level_for(verbose, quiet).into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| LoggingError(e.to_string()))
}
