//! Logging initialization.
//!
//! Controlled by two environment variables:
//! - `REWIND_LOG`: an [`EnvFilter`] directive (default `warn`, or `debug` with
//!   `-v`).
//! - `REWIND_LOG_FORMAT=json`: JSON events to stderr instead of the compact
//!   human format.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Filter directive environment variable.
pub const LOG_ENV: &str = "REWIND_LOG";

/// Output format environment variable.
pub const LOG_FORMAT_ENV: &str = "REWIND_LOG_FORMAT";

/// Install the global subscriber. A second call keeps the first subscriber
/// and prints a warning.
pub fn init(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .without_time()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
    if let Err(e) = result {
        eprintln!("warning: logging already initialized: {e}");
    }
}
