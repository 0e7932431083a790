//! Logging setup for the kiln CLI.
//!
//! Built on the `tracing` ecosystem: the library crates emit events, the
//! CLI installs the subscriber. `RUST_LOG` overrides the flag-derived
//! filter for debugging.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the tracing subscriber. Call once, before any logging occurs.
///
/// Level resolution: `--verbose` wins, then `--quiet`, then `RUST_LOG`,
/// then info for the kiln crates.
pub fn init_logger(verbose: bool, quiet: bool) {
    let filter = if verbose {
        EnvFilter::new("kiln_build=debug,kiln_config=debug,kiln_cli=debug")
    } else if quiet {
        EnvFilter::new("kiln_build=error,kiln_config=error,kiln_cli=error")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("kiln_build=info,kiln_config=info,kiln_cli=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_target(false).without_time())
        .init();
}
