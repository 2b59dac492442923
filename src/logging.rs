//! Tracing subscriber set-up for binaries and tests.

use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding the `EnvFilter` directives.
pub const LOG_FILTER_ENV: &str = "TASKQUEUE_LOG";

const DEFAULT_FILTER: &str = "info";

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Installs a formatted subscriber filtered by [`LOG_FILTER_ENV`].
///
/// Falls back to `info` when the variable is unset or invalid. Calling this
/// more than once, or after another global subscriber was installed, is a
/// no-op.
pub fn init_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_env(LOG_FILTER_ENV)
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let installed = tracing_subscriber::registry()
            .with(fmt::layer().with_target(true))
            .with(filter)
            .try_init();
        if installed.is_err() {
            tracing::debug!("global tracing subscriber already set, keeping it");
        }
    });
}
