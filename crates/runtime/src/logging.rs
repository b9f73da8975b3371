//! Logging setup
//!
//! The runtime only emits `tracing` events. Embedders that already install a
//! subscriber need nothing from here; everyone else can call [`init`] once at
//! startup to get human-readable output on stderr.
//!
//! The filter comes from `ALECCI_LOG` using `EnvFilter` syntax, e.g.
//! `ALECCI_LOG=alecci_runtime=trace`. Without it only warnings are shown.

use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "ALECCI_LOG";

const DEFAULT_FILTER: &str = "warn";

static INIT: Once = Once::new();

/// Install a stderr fmt subscriber as the global default
///
/// Safe to call more than once. If another global subscriber is already set,
/// this leaves it in place.
pub fn init() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let installed = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_thread_names(true)
            .try_init();
        if installed.is_err() {
            tracing::debug!("global subscriber already set, leaving it in place");
        }
    });
}
