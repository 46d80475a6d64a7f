use config::{self, Environment, File};
use log::{debug, error};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::collector::CollectorConfig;
use crate::error::{AgentError, Result};
use crate::sink::SinkFormat;

/// Prefix of environment variables that override file values
pub const ENV_PREFIX: &str = "HOSTGAUGE";

/// Agent configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AgentConfig {
    /// Logging level
    #[serde(default)]
    pub log_level: LogLevel,
    /// Scheduler bounds
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Where published metrics go
    #[serde(default)]
    pub sink: SinkConfig,
    /// Collector instances keyed by name
    #[serde(default = "default_collectors")]
    pub collectors: BTreeMap<String, CollectorSection>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            scheduler: SchedulerConfig::default(),
            sink: SinkConfig::default(),
            collectors: default_collectors(),
        }
    }
}

/// Only the memory collector runs when nothing is configured
fn default_collectors() -> BTreeMap<String, CollectorSection> {
    let mut collectors = BTreeMap::new();
    collectors.insert(
        "memory".to_string(),
        CollectorSection {
            kind: None,
            options: CollectorConfig::new(),
        },
    );
    collectors
}

/// One `[collectors.<name>]` table
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CollectorSection {
    /// Collector kind; the section name is used when absent
    #[serde(default)]
    pub kind: Option<String>,
    /// Every other key, passed to the collector as overrides
    #[serde(flatten)]
    pub options: CollectorConfig,
}

impl CollectorSection {
    /// Kind name for a section called `name`
    pub fn kind_or<'a>(&'a self, name: &'a str) -> &'a str {
        self.kind.as_deref().unwrap_or(name)
    }
}

/// Scheduler configuration, in seconds
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Upper bound on a single collect() pass
    #[serde(default = "default_collect_timeout")]
    pub collect_timeout: u64,
    /// Upper bound on the random start delay of each collector
    #[serde(default = "default_splay")]
    pub splay: u64,
}

fn default_collect_timeout() -> u64 {
    30
}

fn default_splay() -> u64 {
    1
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            collect_timeout: default_collect_timeout(),
            splay: default_splay(),
        }
    }
}

impl SchedulerConfig {
    pub fn collect_timeout(&self) -> Duration {
        Duration::from_secs(self.collect_timeout.max(1))
    }

    pub fn splay(&self) -> Duration {
        Duration::from_secs(self.splay)
    }
}

/// Sink configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct SinkConfig {
    #[serde(default)]
    pub format: SinkFormat,
}

/// Logging level
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Error level
    Error,
    /// Warning level
    Warn,
    /// Info level
    #[default]
    Info,
    /// Debug level
    Debug,
    /// Trace level
    Trace,
}

/// Load agent configuration from a file, with environment overrides
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AgentConfig> {
    let path = path.as_ref();
    debug!("Loading configuration from {}", path.display());

    if !path.exists() {
        error!("Configuration file {} does not exist", path.display());
        return Err(AgentError::Config(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let extension = match path.extension() {
        Some(ext) => ext.to_string_lossy().to_lowercase(),
        None => {
            error!("Configuration file has no extension");
            return Err(AgentError::Config(format!(
                "Configuration file has no extension: {}",
                path.display()
            )));
        }
    };

    let format = match extension.as_str() {
        "toml" => config::FileFormat::Toml,
        "json" => config::FileFormat::Json,
        "yaml" | "yml" => config::FileFormat::Yaml,
        format => {
            error!("Unsupported configuration format: {}", format);
            return Err(AgentError::Config(format!(
                "Unsupported config format: {}",
                format
            )));
        }
    };

    let builder = config::Config::builder()
        .add_source(File::new(&path.to_string_lossy(), format))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

    deserialize(builder)
}

/// Load agent configuration from a TOML string
pub fn load_config_str(toml: &str) -> Result<AgentConfig> {
    deserialize(
        config::Config::builder().add_source(File::from_str(toml, config::FileFormat::Toml)),
    )
}

fn deserialize(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> Result<AgentConfig> {
    let config = builder
        .build()
        .map_err(|e| AgentError::Config(format!("Failed to build configuration: {}", e)))?;

    let agent_config: AgentConfig = config
        .try_deserialize()
        .map_err(|e| AgentError::Config(format!("Failed to deserialize configuration: {}", e)))?;

    debug!("Configuration loaded successfully: {:?}", agent_config);
    Ok(agent_config)
}
