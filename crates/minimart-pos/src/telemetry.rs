//! # Log Setup
//!
//! ## Log Levels
//! - `RUST_LOG=debug` - everything at debug
//! - `RUST_LOG=minimart_pos=trace` - trace for the engine only
//! - Unset: the configured filter, [`DEFAULT_LOG_FILTER`] out of the box

use tracing_subscriber::EnvFilter;

/// Engine and store at debug, sqlx statement logging quiet.
/// Targets match by prefix, so `minimart` covers every workspace crate.
pub const DEFAULT_LOG_FILTER: &str = "info,minimart=debug,sqlx=warn";

/// Installs the global fmt subscriber.
///
/// `RUST_LOG` wins over `default_filter`. Calling this twice is harmless;
/// the second call leaves the first subscriber in place.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_does_not_panic() {
        init_tracing(DEFAULT_LOG_FILTER);
        init_tracing("warn");
    }
}
