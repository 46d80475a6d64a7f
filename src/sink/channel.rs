use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{Metric, MetricSink};
use crate::error::{AgentError, Result};

/// Sink that forwards every metric over a bounded channel
pub struct ChannelSink {
    tx: mpsc::Sender<Metric>,
    name: String,
}

impl ChannelSink {
    /// Create a sink and the receiving end of its channel
    pub fn new(name: impl Into<String>, buffer_size: usize) -> (Self, mpsc::Receiver<Metric>) {
        let (tx, rx) = mpsc::channel(buffer_size);
        (
            Self {
                tx,
                name: name.into(),
            },
            rx,
        )
    }
}

#[async_trait]
impl MetricSink for ChannelSink {
    async fn send(&self, metric: Metric) -> Result<()> {
        self.tx
            .send(metric)
            .await
            .map_err(|e| AgentError::Publish(format!("channel closed, dropped {}", e.0.path)))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
