//! Client interface for remote key-value stores
use async_trait::async_trait;
use log::debug;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AgentError, Result};

#[cfg(feature = "resp-client")]
pub mod resp;

/// Where and how to reach a store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreTarget {
    pub host: String,
    pub port: u16,
    /// Logical database index
    pub db: i64,
    /// Bound on connect and on each command round-trip
    pub timeout: Duration,
}

impl fmt::Display for StoreTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.host, self.port, self.db)
    }
}

/// An open connection to a store
#[async_trait]
pub trait KeyValueStore: Send {
    /// Lightweight liveness check
    async fn ping(&mut self) -> Result<()>;

    /// Length of the list at `key`; a missing key has length 0
    async fn llen(&mut self, key: &str) -> Result<i64>;

    /// Whether further commands can be sent on this connection
    fn is_usable(&self) -> bool {
        true
    }
}

/// Factory for store connections
#[async_trait]
pub trait StoreConnector: Send + Sync + 'static {
    /// Open a connection to `target`
    async fn connect(&self, target: &StoreTarget) -> Result<Box<dyn KeyValueStore>>;

    /// Get the connector name
    fn name(&self) -> &str;
}

/// Outcome of asking a connector for a verified client
pub enum ClientState {
    Ready(Box<dyn KeyValueStore>),
    Unavailable(AgentError),
}

impl fmt::Debug for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientState::Ready(_) => f.write_str("Ready"),
            ClientState::Unavailable(e) => write!(f, "Unavailable({})", e),
        }
    }
}

/// Connect and ping, folding every failure into [`ClientState::Unavailable`]
pub async fn open_client(connector: &dyn StoreConnector, target: &StoreTarget) -> ClientState {
    let mut client = match connector.connect(target).await {
        Ok(client) => client,
        Err(e) => return ClientState::Unavailable(e),
    };

    match client.ping().await {
        Ok(()) => {
            debug!("Connected to {} via {}", target, connector.name());
            ClientState::Ready(client)
        }
        Err(e) => ClientState::Unavailable(e),
    }
}

/// Connector used when no store client is compiled in
pub struct UnavailableConnector;

#[async_trait]
impl StoreConnector for UnavailableConnector {
    async fn connect(&self, _target: &StoreTarget) -> Result<Box<dyn KeyValueStore>> {
        Err(AgentError::SourceUnavailable(
            "no key-value store client compiled in (enable the `resp-client` feature)".to_string(),
        ))
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}

/// The best connector this build supports
#[cfg(feature = "resp-client")]
pub fn default_connector() -> Arc<dyn StoreConnector> {
    Arc::new(resp::RespConnector)
}

/// The best connector this build supports
#[cfg(not(feature = "resp-client"))]
pub fn default_connector() -> Arc<dyn StoreConnector> {
    Arc::new(UnavailableConnector)
}
