//! Logging and device counters

mod logging;
mod metrics;

pub use logging::{init_logging, LogFormat};
pub use metrics::DeviceStats;
