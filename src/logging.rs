//! Tracing initialization for the binary and embedders.

use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Environment variable holding per-module log directives
pub const LOG_ENV: &str = "LETTER_REEL_LOG";

/// Filter used when [`LOG_ENV`] is unset or invalid
pub const DEFAULT_FILTER: &str = "letter_reel=info";

static INIT: Once = Once::new();

/// Initialize the letter-reel logging system.
///
/// Reads `LETTER_REEL_LOG` for directives, e.g.
/// `LETTER_REEL_LOG=letter_reel::app=debug`. An explicit `filter` takes
/// precedence over the environment. Output goes to stderr so it never mixes
/// with the reel drawn on stdout.
///
/// Idempotent; a subscriber installed elsewhere is left in place.
pub fn init_tracing(filter: Option<&str>) {
    INIT.call_once(|| {
        let filter = match filter {
            Some(directives) => EnvFilter::new(directives),
            None => EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        };

        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .with(filter)
            .try_init();
    });
}
