//! Tracing setup for the `auspice` binary. Library code only emits events,
//! the subscriber is installed once by `main`.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set. Rejected requests and connection
/// errors are logged at `debug` level by this crate.
pub const DEFAULT_FILTER: &str = "info,auspice=debug";

/// Installs the global subscriber, writing either human readable lines or one
/// JSON object per event to stdout.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    if json {
        subscriber.json().flatten_event(true).init();
    } else {
        subscriber.compact().init();
    }
}
