use async_trait::async_trait;
use log::info;
use serde::Deserialize;

use super::{Metric, MetricSink};
use crate::error::{AgentError, Result};

/// Line format used by [`LogSink`]
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SinkFormat {
    /// `<path> <value> <unix seconds>`
    #[default]
    Plain,
    /// One JSON object per metric
    Json,
}

/// Sink that writes metrics to the log at info level
pub struct LogSink {
    format: SinkFormat,
    name: String,
}

impl LogSink {
    pub fn new(name: impl Into<String>, format: SinkFormat) -> Self {
        Self {
            format,
            name: name.into(),
        }
    }

    /// Render a metric the way this sink would log it
    pub fn render(&self, metric: &Metric) -> Result<String> {
        match self.format {
            SinkFormat::Plain => Ok(format!(
                "{} {} {}",
                metric.path,
                metric.value,
                metric.timestamp.timestamp()
            )),
            SinkFormat::Json => serde_json::to_string(metric)
                .map_err(|e| AgentError::Publish(format!("failed to encode metric: {}", e))),
        }
    }
}

#[async_trait]
impl MetricSink for LogSink {
    async fn send(&self, metric: Metric) -> Result<()> {
        let line = self.render(&metric)?;
        info!(target: "hostgauge::metrics", "{}", line);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
