//! Metric sinks: the downstream end of the publishing pipeline

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;

mod channel;
mod logger;
mod memory;

pub use channel::ChannelSink;
pub use logger::{LogSink, SinkFormat};
pub use memory::MemorySink;

/// Separator between metric path segments
pub const PATH_SEPARATOR: char = '.';

/// How downstream storage should interpret a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Plain published value, storage decides the semantics
    Untyped,
    /// Instantaneous value, no rate or delta computation
    Gauge,
}

/// A single published metric
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    /// Dot-segmented hierarchical name
    pub path: String,
    pub value: f64,
    pub kind: MetricKind,
    /// Taken at publish time
    pub timestamp: DateTime<Utc>,
}

impl Metric {
    /// Create a metric stamped with the current time
    pub fn new(path: impl Into<String>, value: f64, kind: MetricKind) -> Self {
        Self {
            path: path.into(),
            value,
            kind,
            timestamp: Utc::now(),
        }
    }
}

/// Consumer of published metrics
#[async_trait]
pub trait MetricSink: Send + Sync + 'static {
    /// Forward a fully-built metric
    async fn send(&self, metric: Metric) -> Result<()>;

    /// Publish a plain value under `path`
    async fn publish(&self, path: &str, value: f64) -> Result<()> {
        self.send(Metric::new(path, value, MetricKind::Untyped)).await
    }

    /// Publish an instantaneous value under `path`
    async fn publish_gauge(&self, path: &str, value: f64) -> Result<()> {
        self.send(Metric::new(path, value, MetricKind::Gauge)).await
    }

    /// Get the sink name
    fn name(&self) -> &str;
}

/// Join path segments, skipping empty ones
pub fn join_path<'a, I>(segments: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    segments
        .into_iter()
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

/// Make a name usable as a single path segment by replacing the separator with `__`
pub fn sanitize_segment(segment: &str) -> String {
    segment.replace(PATH_SEPARATOR, "__")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_path_skips_empty_segments() {
        assert_eq!(join_path(["servers", "", "memory", "MemFree"]), "servers.memory.MemFree");
        assert_eq!(join_path(["", ""]), "");
    }

    #[test]
    fn sanitize_replaces_separator() {
        assert_eq!(sanitize_segment("events.pending"), "events__pending");
        assert_eq!(sanitize_segment("plain"), "plain");
    }

    #[tokio::test]
    async fn provided_methods_tag_kind() {
        let sink = MemorySink::new("test");
        sink.publish("a.b", 1.0).await.unwrap();
        sink.publish_gauge("a.c", 2.0).await.unwrap();

        let metrics = sink.metrics().unwrap();
        assert_eq!(metrics[0].kind, MetricKind::Untyped);
        assert_eq!(metrics[1].kind, MetricKind::Gauge);
        assert_eq!(metrics[1].path, "a.c");
    }
}
