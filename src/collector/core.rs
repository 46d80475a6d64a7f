//! Core collector traits and types
use async_trait::async_trait;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use super::config::CollectorConfig;
use crate::error::{AgentError, Result};
use crate::sink::{MetricSink, join_path};

/// Default polling interval in seconds
pub const DEFAULT_INTERVAL_SECS: i64 = 300;

/// Default first path segment
pub const DEFAULT_PATH_PREFIX: &str = "servers";

/// Help text keyed by option name
pub type ConfigHelp = BTreeMap<String, String>;

/// Options every collector understands
pub fn base_default_config() -> CollectorConfig {
    CollectorConfig::new()
        .with("enabled", true)
        .with("interval", DEFAULT_INTERVAL_SECS)
        .with("path_prefix", DEFAULT_PATH_PREFIX)
        .with("hostname", "")
        .with("path", "")
}

/// Help for the options in [`base_default_config`]
pub fn base_default_config_help() -> ConfigHelp {
    [
        ("enabled", "Enable collecting these metrics"),
        ("interval", "Seconds between polling passes"),
        ("path_prefix", "First segment of every metric path"),
        ("hostname", "Host segment of the metric path, empty to use the local hostname"),
        ("path", "Collector segment of the metric path"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Typed view of the base options
#[derive(Debug, Clone, PartialEq)]
pub struct BaseSettings {
    pub enabled: bool,
    pub interval: Duration,
    pub path_prefix: String,
    pub hostname: String,
    pub path: String,
}

impl BaseSettings {
    /// Coerce the base options out of a merged config
    pub fn from_config(config: &CollectorConfig) -> Result<Self> {
        let interval = config.get_int("interval")?.unwrap_or(DEFAULT_INTERVAL_SECS);
        if interval <= 0 {
            return Err(AgentError::invalid_option("interval", "a positive number of seconds", interval));
        }

        let hostname = match config.get_str("hostname")? {
            Some(name) if !name.trim().is_empty() => name.trim().replace('.', "_"),
            _ => local_hostname(),
        };

        Ok(Self {
            enabled: config.get_bool("enabled")?.unwrap_or(true),
            interval: Duration::from_secs(interval as u64),
            path_prefix: config
                .get_str("path_prefix")?
                .unwrap_or_else(|| DEFAULT_PATH_PREFIX.to_string()),
            hostname,
            path: config.get_str("path")?.unwrap_or_default(),
        })
    }
}

/// Short hostname of this machine, `localhost` if it cannot be determined
pub fn local_hostname() -> String {
    match hostname::get() {
        Ok(name) => {
            let name = name.to_string_lossy();
            match name.split('.').next() {
                Some(short) if !short.is_empty() => short.to_string(),
                _ => "localhost".to_string(),
            }
        }
        Err(e) => {
            warn!("Failed to read hostname, using 'localhost': {}", e);
            "localhost".to_string()
        }
    }
}

/// State shared by every collector: its name, effective config and sink
pub struct CollectorBase {
    name: String,
    config: CollectorConfig,
    settings: BaseSettings,
    sink: Arc<dyn MetricSink>,
}

impl CollectorBase {
    /// Merge `overrides` over `defaults` and resolve the base options
    pub fn new(
        name: impl Into<String>,
        defaults: &CollectorConfig,
        overrides: &CollectorConfig,
        sink: Arc<dyn MetricSink>,
    ) -> Result<Self> {
        let name = name.into();
        let config = CollectorConfig::merge(defaults, overrides);
        let settings = BaseSettings::from_config(&config)
            .map_err(|e| AgentError::Config(format!("collector '{}': {}", name, e)))?;

        debug!(
            "Collector '{}' configured: interval={:?}, enabled={}",
            name, settings.interval, settings.enabled
        );

        Ok(Self {
            name,
            config,
            settings,
            sink,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    pub fn settings(&self) -> &BaseSettings {
        &self.settings
    }

    /// Full metric path for a collector-relative name
    pub fn metric_path(&self, name: &str) -> String {
        join_path([
            self.settings.path_prefix.as_str(),
            self.settings.hostname.as_str(),
            self.settings.path.as_str(),
            name,
        ])
    }

    /// Publish a plain value; sink failures are logged, not returned
    pub async fn publish(&self, name: &str, value: f64) {
        let path = self.metric_path(name);
        if let Err(e) = self.sink.publish(&path, value).await {
            warn!("{}: failed to publish {}: {}", self.name, path, e);
        }
    }

    /// Publish an instantaneous value; sink failures are logged, not returned
    pub async fn publish_gauge(&self, name: &str, value: f64) {
        let path = self.metric_path(name);
        if let Err(e) = self.sink.publish_gauge(&path, value).await {
            warn!("{}: failed to publish {}: {}", self.name, path, e);
        }
    }
}

/// Base trait for all metric collectors.
///
/// `collect` performs one polling pass and never fails: problems with the source are
/// logged and simply produce fewer metrics.
#[async_trait]
pub trait Collector: Send + Sync + 'static {
    /// Shared collector state
    fn base(&self) -> &CollectorBase;

    /// Perform exactly one polling pass
    async fn collect(&self);

    /// Default options, before user overrides
    fn default_config() -> CollectorConfig
    where
        Self: Sized,
    {
        base_default_config()
    }

    /// Help text for each default option
    fn default_config_help() -> ConfigHelp
    where
        Self: Sized,
    {
        base_default_config_help()
    }

    /// Get the collector name
    fn name(&self) -> &str {
        self.base().name()
    }

    /// Effective configuration
    fn config(&self) -> &CollectorConfig {
        self.base().config()
    }

    /// Get the collection interval
    fn interval(&self) -> Duration {
        self.base().settings().interval
    }

    fn enabled(&self) -> bool {
        self.base().settings().enabled
    }

    async fn publish(&self, name: &str, value: f64) {
        self.base().publish(name, value).await
    }

    async fn publish_gauge(&self, name: &str, value: f64) {
        self.base().publish_gauge(name, value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{MemorySink, MetricKind};

    fn base_with(overrides: CollectorConfig, sink: Arc<MemorySink>) -> Result<CollectorBase> {
        let defaults = base_default_config().with("path", "memory");
        CollectorBase::new("test", &defaults, &overrides, sink)
    }

    #[test]
    fn settings_use_defaults() {
        let config = base_default_config().with("hostname", "web01");
        let settings = BaseSettings::from_config(&config).unwrap();

        assert!(settings.enabled);
        assert_eq!(settings.interval, Duration::from_secs(300));
        assert_eq!(settings.path_prefix, "servers");
        assert_eq!(settings.hostname, "web01");
    }

    #[test]
    fn configured_hostname_is_one_segment() {
        let config = base_default_config().with("hostname", "web01.dc1.example");
        let settings = BaseSettings::from_config(&config).unwrap();
        assert_eq!(settings.hostname, "web01_dc1_example");
    }

    #[test]
    fn empty_hostname_falls_back_to_local() {
        let settings = BaseSettings::from_config(&base_default_config()).unwrap();
        assert!(!settings.hostname.is_empty());
        assert!(!settings.hostname.contains('.'));
    }

    #[test]
    fn bad_interval_is_rejected() {
        let sink = Arc::new(MemorySink::new("sink"));
        let err = base_with(CollectorConfig::new().with("interval", 0), sink.clone());
        assert!(matches!(err, Err(AgentError::Config(_))));

        let err = base_with(CollectorConfig::new().with("interval", "soon"), sink);
        assert!(matches!(err, Err(AgentError::Config(_))));
    }

    #[test]
    fn metric_path_composes_segments() {
        let sink = Arc::new(MemorySink::new("sink"));
        let base = base_with(CollectorConfig::new().with("hostname", "h"), sink.clone()).unwrap();
        assert_eq!(base.metric_path("MemFree"), "servers.h.memory.MemFree");

        let base = base_with(
            CollectorConfig::new().with("hostname", "h").with("path_prefix", ""),
            sink,
        )
        .unwrap();
        assert_eq!(base.metric_path("MemFree"), "h.memory.MemFree");
    }

    #[tokio::test]
    async fn publish_goes_through_the_sink() {
        let sink = Arc::new(MemorySink::new("sink"));
        let base = base_with(CollectorConfig::new().with("hostname", "h"), sink.clone()).unwrap();

        base.publish("Dirty", 10.0).await;
        base.publish_gauge("keys.q.size", 2.0).await;

        let metrics = sink.metrics().unwrap();
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0].path, "servers.h.memory.Dirty");
        assert_eq!(metrics[1].kind, MetricKind::Gauge);
    }
}
