//! Process-wide `tracing` subscriber for the binary.
//!
//! Library code never logs through a global; it parents its events to the
//! span handed to [`crate::Server`].

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "warn";

/// Install the fmt subscriber on stderr.
///
/// The filter comes from `CHATSYNC_LOG`, then `RUST_LOG`, then `warn`.
/// A non-empty `NO_COLOR` disables ANSI colors.
pub fn init() {
    let no_color = std::env::var("NO_COLOR").map_or(false, |v| !v.is_empty());

    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .init();
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_env("CHATSYNC_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
