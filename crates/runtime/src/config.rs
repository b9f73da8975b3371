//! Runtime configuration
//!
//! ## Configuration (Environment Variables)
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `ALECCI_REGISTRY_CAPACITY` | `65536` | Live handles allowed per resource kind |
//! | `ALECCI_THREAD_STACK_SIZE` | platform default | Stack size in bytes for spawned threads |
//! | `ALECCI_THREAD_NAME` | `alecci-worker` | Name prefix for spawned threads |
//! | `ALECCI_LOG` | unset | `tracing` filter used by `logging::init` |
//!
//! Invalid values (non-numeric, zero) are logged as warnings and replaced by
//! the default.

/// Default number of live handles per resource kind
pub const DEFAULT_REGISTRY_CAPACITY: usize = 65536;

/// Default name prefix for spawned threads
pub const DEFAULT_THREAD_NAME: &str = "alecci-worker";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Maximum number of live handles per resource kind
    pub registry_capacity: usize,
    /// Stack size for spawned threads (None = platform default)
    pub thread_stack_size: Option<usize>,
    /// Spawned threads are named `<prefix>-<n>`
    pub thread_name_prefix: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            registry_capacity: DEFAULT_REGISTRY_CAPACITY,
            thread_stack_size: None,
            thread_name_prefix: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let registry_capacity = parse_positive(
            "ALECCI_REGISTRY_CAPACITY",
            std::env::var("ALECCI_REGISTRY_CAPACITY").ok(),
        )
        .unwrap_or(DEFAULT_REGISTRY_CAPACITY);

        let thread_stack_size = parse_positive(
            "ALECCI_THREAD_STACK_SIZE",
            std::env::var("ALECCI_THREAD_STACK_SIZE").ok(),
        );

        let thread_name_prefix = std::env::var("ALECCI_THREAD_NAME")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_THREAD_NAME.to_string());

        Self {
            registry_capacity,
            thread_stack_size,
            thread_name_prefix,
        }
    }

    /// Override the registry capacity (at least 1)
    pub fn with_registry_capacity(mut self, capacity: usize) -> Self {
        self.registry_capacity = capacity.max(1);
        self
    }
}

/// Parse a positive integer from an optional string value.
/// Returns None if the value is missing, zero, or invalid.
/// Logs a warning for invalid values.
fn parse_positive(var: &str, env_value: Option<String>) -> Option<usize> {
    let val = env_value?;
    match val.trim().parse::<usize>() {
        Ok(0) => {
            tracing::warn!(target: "alecci_runtime", "{}=0 is invalid, using default", var);
            None
        }
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!(
                target: "alecci_runtime",
                "{}='{}' is not a valid number, using default",
                var,
                val
            );
            None
        }
    }
}
