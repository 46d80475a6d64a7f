use async_trait::async_trait;
use std::sync::RwLock;

use super::{Metric, MetricSink};
use crate::error::{AgentError, Result};

/// A minimal in-memory sink, mostly for testing
pub struct MemorySink {
    metrics: RwLock<Vec<Metric>>,
    name: String,
}

impl MemorySink {
    /// Create a new memory sink
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            metrics: RwLock::new(Vec::new()),
            name: name.into(),
        }
    }

    /// Snapshot of every metric received so far, in arrival order
    pub fn metrics(&self) -> Result<Vec<Metric>> {
        let metrics = self
            .metrics
            .read()
            .map_err(|_| AgentError::Publish("Lock poisoned".to_string()))?;
        Ok(metrics.clone())
    }

    /// Take and remove every metric received so far
    pub fn drain(&self) -> Result<Vec<Metric>> {
        let mut metrics = self
            .metrics
            .write()
            .map_err(|_| AgentError::Publish("Lock poisoned".to_string()))?;
        Ok(std::mem::take(&mut *metrics))
    }

    /// Latest value published under `path`
    pub fn value_of(&self, path: &str) -> Result<Option<f64>> {
        let metrics = self
            .metrics
            .read()
            .map_err(|_| AgentError::Publish("Lock poisoned".to_string()))?;
        Ok(metrics.iter().rev().find(|m| m.path == path).map(|m| m.value))
    }

    /// Number of metrics received
    pub fn len(&self) -> Result<usize> {
        let metrics = self
            .metrics
            .read()
            .map_err(|_| AgentError::Publish("Lock poisoned".to_string()))?;
        Ok(metrics.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl MetricSink for MemorySink {
    async fn send(&self, metric: Metric) -> Result<()> {
        let mut metrics = self
            .metrics
            .write()
            .map_err(|_| AgentError::Publish("Lock poisoned".to_string()))?;
        metrics.push(metric);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drain_empties_the_sink() {
        let sink = MemorySink::new("mem");
        sink.publish("x", 1.0).await.unwrap();
        sink.publish("x", 2.0).await.unwrap();

        assert_eq!(sink.value_of("x").unwrap(), Some(2.0));
        assert_eq!(sink.drain().unwrap().len(), 2);
        assert!(sink.is_empty().unwrap());
    }
}
