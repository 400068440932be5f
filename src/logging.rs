//! Tracing setup for the command-line tool.
//!
//! Filter precedence: `RUST_LOG`, then `UNQUARANTINE_LOG`, then the level
//! implied by `-v` flags.  Output goes to stderr so the review listing on
//! stdout stays readable.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_ENV: &str = "UNQUARANTINE_LOG";

fn default_level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

pub fn init_logger(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_from_env(LOG_ENV))
        .unwrap_or_else(|_| EnvFilter::new(default_level(verbosity)));

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .with(filter)
        .try_init();
}
