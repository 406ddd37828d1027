//! Logging setup shared by binaries and tests
//!
//! Installs a `tracing` FmtSubscriber with the configured maximum level.

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Install the global tracing subscriber
///
/// Unrecognized level strings fall back to `info`. Calling this more than
/// once is a no-op, so tests can call it freely.
pub fn init(level: &str) {
    let level = level.parse().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();

    // Keep the first subscriber if one is already installed
    let _ = tracing::subscriber::set_global_default(subscriber);
}
