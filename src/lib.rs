//! A small framework for host metric collectors, with memory and list-length collectors

pub mod agent;
pub mod collector;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod sink;
pub mod store;
pub mod util;

pub use util::logging::init as init_logging;

/// Re-export of commonly used types for convenience
pub mod prelude {
    pub use crate::agent::{Agent, CollectorKind};
    pub use crate::collector::{Collector, CollectorBase, CollectorConfig, ConfigValue};
    pub use crate::config::{AgentConfig, LogLevel, load_config};
    pub use crate::error::{AgentError, Result};
    pub use crate::scheduler::{CycleOutcome, CycleReport, Scheduler};
    pub use crate::sink::{Metric, MetricKind, MetricSink};
    pub use crate::store::{KeyValueStore, StoreConnector, StoreTarget};
}

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
