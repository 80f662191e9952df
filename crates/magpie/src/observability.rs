//! Tracing initialization for the magpie binary.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// The filter comes from `MAGPIE_LOG`, falling back to `RUST_LOG`, then
/// to `info`. Library crates never install a subscriber; only the binary
/// calls this.
pub fn init() {
    let filter = std::env::var("MAGPIE_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}
