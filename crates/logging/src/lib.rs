//! FlightGuard Logging
//!
//! `tracing` subscriber setup shared by FlightGuard binaries and tests.
//! `RUST_LOG` always takes precedence over the defaults here.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info";

/// Default filter with `-v`
pub const VERBOSE_FILTER: &str = "info,flightguard=debug";

fn filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER })
    })
}

/// Install the global subscriber for a binary.
///
/// Fails if a global subscriber is already set.
pub fn init(verbose: bool) -> Result<(), tracing_subscriber::util::TryInitError> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter(verbose))
        .try_init()
}

/// Install a test-friendly subscriber once per process. Safe to call from
/// every test.
pub fn init_for_tests() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_test_writer())
            .with(filter(true))
            .try_init();
    });
}
