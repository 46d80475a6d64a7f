//! Builds collectors from an [`AgentConfig`] and runs them
use log::{info, warn};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::collector::{
    Collector, CollectorConfig, ConfigHelp, base_default_config, base_default_config_help,
};
use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::scheduler::{CycleReport, Scheduler};
use crate::sink::{LogSink, MetricSink};

#[cfg(feature = "list-length")]
use crate::collector::ListLengthCollector;
#[cfg(feature = "memory")]
use crate::collector::MemoryCollector;

/// Collector variants this agent knows how to build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorKind {
    Memory,
    ListLength,
}

impl CollectorKind {
    pub const ALL: [CollectorKind; 2] = [CollectorKind::Memory, CollectorKind::ListLength];

    pub fn name(&self) -> &'static str {
        match self {
            CollectorKind::Memory => "memory",
            CollectorKind::ListLength => "list_length",
        }
    }

    /// Whether this build includes the variant
    pub fn is_available(&self) -> bool {
        match self {
            CollectorKind::Memory => cfg!(feature = "memory"),
            CollectorKind::ListLength => cfg!(feature = "list-length"),
        }
    }

    pub fn default_config(&self) -> CollectorConfig {
        match self {
            #[cfg(feature = "memory")]
            CollectorKind::Memory => MemoryCollector::default_config(),
            #[cfg(feature = "list-length")]
            CollectorKind::ListLength => ListLengthCollector::default_config(),
            #[allow(unreachable_patterns)]
            _ => base_default_config(),
        }
    }

    pub fn default_config_help(&self) -> ConfigHelp {
        match self {
            #[cfg(feature = "memory")]
            CollectorKind::Memory => MemoryCollector::default_config_help(),
            #[cfg(feature = "list-length")]
            CollectorKind::ListLength => ListLengthCollector::default_config_help(),
            #[allow(unreachable_patterns)]
            _ => base_default_config_help(),
        }
    }

    /// Construct an instance called `name` from user overrides
    pub fn build(
        &self,
        name: &str,
        overrides: &CollectorConfig,
        sink: Arc<dyn MetricSink>,
    ) -> Result<Arc<dyn Collector>> {
        match self {
            #[cfg(feature = "memory")]
            CollectorKind::Memory => Ok(Arc::new(MemoryCollector::new(name, overrides, sink)?)),
            #[cfg(feature = "list-length")]
            CollectorKind::ListLength => {
                Ok(Arc::new(ListLengthCollector::new(name, overrides, sink)?))
            }
            #[allow(unreachable_patterns)]
            kind => {
                let _ = (overrides, sink);
                Err(AgentError::Config(format!(
                    "collector '{}': kind '{}' is not compiled into this build",
                    name, kind
                )))
            }
        }
    }
}

impl fmt::Display for CollectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CollectorKind {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "memory" | "meminfo" => Ok(CollectorKind::Memory),
            "list_length" | "listlength" | "redis_llen" | "llen" => Ok(CollectorKind::ListLength),
            other => Err(AgentError::Config(format!("unknown collector kind '{}'", other))),
        }
    }
}

/// A configured set of collectors behind one scheduler
pub struct Agent {
    scheduler: Scheduler,
    sink: Arc<dyn MetricSink>,
}

impl Agent {
    /// Build an agent that logs its metrics
    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        let sink: Arc<dyn MetricSink> = Arc::new(LogSink::new("log", config.sink.format));
        Self::with_sink(config, sink)
    }

    /// Build an agent publishing to `sink`
    pub fn with_sink(config: &AgentConfig, sink: Arc<dyn MetricSink>) -> Result<Self> {
        let mut scheduler = Scheduler::from_config(&config.scheduler);

        for (name, section) in &config.collectors {
            let kind: CollectorKind = section
                .kind_or(name)
                .parse()
                .map_err(|e| AgentError::Config(format!("collector '{}': {}", name, e)))?;
            let collector = kind.build(name, &section.options, Arc::clone(&sink))?;
            scheduler.register(collector);
        }

        if scheduler.is_empty() {
            warn!("No enabled collectors configured");
        }

        info!(
            "Agent configured with collectors [{}], publishing to {}",
            scheduler.collector_names().join(", "),
            sink.name()
        );

        Ok(Self { scheduler, sink })
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn sink(&self) -> &Arc<dyn MetricSink> {
        &self.sink
    }

    /// One pass over every collector
    pub async fn run_once(&self) -> CycleReport {
        let report = self.scheduler.run_once().await;
        for (name, outcome) in report.failures() {
            warn!("Collector {} {}", name, outcome);
        }
        report
    }

    /// Poll until Ctrl-C is received
    pub async fn run_until_shutdown(&self) -> Result<()> {
        self.scheduler.start().await?;

        tokio::signal::ctrl_c()
            .await
            .map_err(|e| AgentError::Other(format!("failed to listen for shutdown: {}", e)))?;
        info!("Received interrupt signal, shutting down...");

        self.scheduler.stop().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_str;
    use crate::sink::MemorySink;

    #[test]
    fn kind_names_and_aliases() {
        assert_eq!("memory".parse::<CollectorKind>().unwrap(), CollectorKind::Memory);
        assert_eq!("Redis-Llen".parse::<CollectorKind>().unwrap(), CollectorKind::ListLength);
        assert_eq!("list_length".parse::<CollectorKind>().unwrap(), CollectorKind::ListLength);
        assert!("disk".parse::<CollectorKind>().is_err());

        for kind in CollectorKind::ALL {
            assert_eq!(kind.name().parse::<CollectorKind>().unwrap(), kind);
            assert!(kind.is_available());
        }
    }

    #[test]
    fn help_covers_every_default_option() {
        for kind in CollectorKind::ALL {
            let defaults = kind.default_config();
            let help = kind.default_config_help();
            for (option, _) in defaults.iter() {
                assert!(help.contains_key(option), "{} lacks help for {}", kind, option);
            }
        }
    }

    #[test]
    fn builds_configured_collectors() {
        let config = load_config_str(
            r#"
            [collectors.memory]
            hostname = "h"

            [collectors.queues]
            kind = "redis_llen"
            keys = "a"

            [collectors.idle]
            kind = "memory"
            enabled = false
            "#,
        )
        .unwrap();

        let sink = Arc::new(MemorySink::new("test"));
        let agent = Agent::with_sink(&config, sink).unwrap();

        assert_eq!(agent.scheduler().collector_names(), vec!["memory", "queues"]);
    }

    #[test]
    fn unknown_kind_is_a_config_error() {
        let config = load_config_str("[collectors.disk]\nenabled = true\n").unwrap();
        let sink = Arc::new(MemorySink::new("test"));

        assert!(matches!(Agent::with_sink(&config, sink), Err(AgentError::Config(_))));
    }

    #[test]
    fn bad_option_fails_at_startup() {
        let config = load_config_str("[collectors.queues]\nkind = \"llen\"\nport = \"http\"\n").unwrap();
        let sink = Arc::new(MemorySink::new("test"));

        assert!(matches!(Agent::with_sink(&config, sink), Err(AgentError::Config(_))));
    }
}
