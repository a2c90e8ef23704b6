// src/logging.rs
// =============================================================================
// Logging setup.
//
// Log lines go to stderr so that `--json` output on stdout stays clean.
// The level comes from RUST_LOG and defaults to "info":
//
//   RUST_LOG=debug wikicrawl crawl ...              everything
//   RUST_LOG=wikicrawl=info,reqwest=warn wikicrawl  quieter HTTP stack
// =============================================================================

use tracing_subscriber::EnvFilter;

// Installs the global subscriber. Calling it twice is harmless.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}
