//! Length of configured list keys on a remote key-value store
use async_trait::async_trait;
use log::{debug, error, warn};
use std::sync::Arc;
use std::time::Duration;

use super::config::CollectorConfig;
use super::core::{Collector, CollectorBase, ConfigHelp, base_default_config, base_default_config_help};
use crate::error::{AgentError, Result};
use crate::sink::{MetricSink, sanitize_segment};
use crate::store::{ClientState, StoreConnector, StoreTarget, default_connector, open_client};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: i64 = 6379;
pub const DEFAULT_DB: i64 = 0;
pub const DEFAULT_SOCK_TIMEOUT_SECS: i64 = 5;

/// Metric name for a key: `keys.<key>.size`, with dots in the key replaced by `__`
pub fn format_key_metric_path(key: &str) -> String {
    format!("keys.{}.size", sanitize_segment(key))
}

/// Typed view of the list length collector options
#[derive(Debug, Clone, PartialEq)]
pub struct ListLengthSettings {
    pub target: StoreTarget,
    pub keys: Vec<String>,
}

impl ListLengthSettings {
    pub fn from_config(config: &CollectorConfig) -> Result<Self> {
        let port = config.get_int("port")?.unwrap_or(DEFAULT_PORT);
        let port = u16::try_from(port)
            .map_err(|_| AgentError::invalid_option("port", "a TCP port", port))?;

        let timeout = config.get_int("timeout")?.unwrap_or(DEFAULT_SOCK_TIMEOUT_SECS);
        if timeout <= 0 {
            return Err(AgentError::invalid_option("timeout", "a positive number of seconds", timeout));
        }

        let db = config.get_int("db")?.unwrap_or(DEFAULT_DB);
        if db < 0 {
            return Err(AgentError::invalid_option("db", "a database index", db));
        }

        Ok(Self {
            target: StoreTarget {
                host: config.get_str("host")?.unwrap_or_else(|| DEFAULT_HOST.to_string()),
                port,
                db,
                timeout: Duration::from_secs(timeout as u64),
            },
            keys: config.get_list("keys")?.unwrap_or_default(),
        })
    }
}

/// Publishes the length of each configured list as a gauge
pub struct ListLengthCollector {
    base: CollectorBase,
    settings: ListLengthSettings,
    connector: Arc<dyn StoreConnector>,
}

impl ListLengthCollector {
    /// Create a collector using the default store connector
    pub fn new(
        name: impl Into<String>,
        overrides: &CollectorConfig,
        sink: Arc<dyn MetricSink>,
    ) -> Result<Self> {
        Self::with_connector(name, overrides, sink, default_connector())
    }

    /// Create a collector with a specific store connector
    pub fn with_connector(
        name: impl Into<String>,
        overrides: &CollectorConfig,
        sink: Arc<dyn MetricSink>,
        connector: Arc<dyn StoreConnector>,
    ) -> Result<Self> {
        let base = CollectorBase::new(name, &Self::default_config(), overrides, sink)?;
        let settings = ListLengthSettings::from_config(base.config())
            .map_err(|e| AgentError::Config(format!("collector '{}': {}", base.name(), e)))?;

        if settings.keys.is_empty() {
            warn!("{}: no keys configured, only connectivity will be checked", base.name());
        }

        Ok(Self {
            base,
            settings,
            connector,
        })
    }

    pub fn settings(&self) -> &ListLengthSettings {
        &self.settings
    }
}

#[async_trait]
impl Collector for ListLengthCollector {
    fn base(&self) -> &CollectorBase {
        &self.base
    }

    async fn collect(&self) {
        let target = &self.settings.target;
        let mut client = match open_client(self.connector.as_ref(), target).await {
            ClientState::Ready(client) => client,
            ClientState::Unavailable(e) => {
                error!("{}: failed to connect to {}: {}", self.name(), target, e);
                return;
            }
        };

        for key in &self.settings.keys {
            // A failed read leaves unread bytes behind; start over on a fresh connection
            if !client.is_usable() {
                client = match open_client(self.connector.as_ref(), target).await {
                    ClientState::Ready(client) => client,
                    ClientState::Unavailable(e) => {
                        error!(
                            "{}: lost connection to {}, skipping remaining keys: {}",
                            self.name(),
                            target,
                            e
                        );
                        return;
                    }
                };
            }

            match client.llen(key).await {
                Ok(length) => {
                    self.publish_gauge(&format_key_metric_path(key), length as f64).await;
                }
                Err(e) => {
                    warn!("{}: LLEN {} failed on {}: {}", self.name(), key, target, e);
                }
            }
        }

        debug!("{}: polled {} keys on {}", self.name(), self.settings.keys.len(), target);
    }

    fn default_config() -> CollectorConfig {
        base_default_config()
            .with("path", "redis")
            .with("host", DEFAULT_HOST)
            .with("port", DEFAULT_PORT)
            .with("db", DEFAULT_DB)
            .with("timeout", DEFAULT_SOCK_TIMEOUT_SECS)
            .with("keys", "")
    }

    fn default_config_help() -> ConfigHelp {
        let mut help = base_default_config_help();
        help.extend(
            [
                ("host", "Hostname to collect from"),
                ("port", "Port number to collect from"),
                ("db", "Database number to query"),
                ("timeout", "Socket timeout in seconds"),
                ("keys", "Comma-separated list of keys to collect llen from"),
                ("path", "Collector segment of the metric path (default: redis)"),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string())),
        );
        help
    }
}
