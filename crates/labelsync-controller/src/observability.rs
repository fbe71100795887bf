//! Process-wide tracing setup.
//!
//! One `fmt` subscriber behind a reloadable `EnvFilter`. `RUST_LOG` takes
//! precedence over the configured level when it parses.

use std::sync::OnceLock;

use labelsync_config::LoggingConfig;
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

/// Install the global subscriber.
///
/// Returns `false` if a global subscriber was already set, in which case
/// nothing changes.
pub fn init_tracing(logging: &LoggingConfig) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let (filter, handle) = reload::Layer::new(filter);

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .is_ok();
    if installed {
        let _ = FILTER_HANDLE.set(handle);
    }
    installed
}

/// Swap the active filter for `level`.
///
/// Returns `false` when the global subscriber was not installed by
/// [`init_tracing`].
pub fn apply_logging_level(level: &str) -> bool {
    FILTER_HANDLE
        .get()
        .is_some_and(|handle| handle.modify(|filter| *filter = EnvFilter::new(level)).is_ok())
}
