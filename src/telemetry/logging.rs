//! Tracing subscriber setup for embedding applications
//!
//! The library itself only emits `tracing` events; installing a subscriber
//! is the host application's choice. `RUST_LOG` overrides the default
//! filter when set.

use tracing_subscriber::EnvFilter;

/// Output format for [`init_logging`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

/// Installs a global subscriber. Safe to call more than once; later calls
/// are no-ops.
pub fn init_logging(default_filter: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    match format {
        LogFormat::Plain => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .try_init();
        }
        LogFormat::Json => {
            let _ = tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .try_init();
        }
    }
}
