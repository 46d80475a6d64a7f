mod config;
mod core;
#[cfg(feature = "list-length")]
mod list_length;
#[cfg(feature = "memory")]
mod memory;

// Re-export public items
pub use self::config::{CollectorConfig, CollectorConfigBuilder, ConfigValue};
pub use self::core::{
    BaseSettings, Collector, CollectorBase, ConfigHelp, base_default_config,
    base_default_config_help, local_hostname,
};
#[cfg(feature = "list-length")]
pub use list_length::{ListLengthCollector, ListLengthSettings, format_key_metric_path};
#[cfg(feature = "memory")]
pub use memory::{
    COMMON_METRICS, MemoryCollector, MemorySettings, MeminfoEntry, PROC_MEMINFO, parse_meminfo_line,
};
