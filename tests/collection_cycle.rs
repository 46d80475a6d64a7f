use hostgauge::collector::{Collector, CollectorConfig, MemoryCollector};
use hostgauge::prelude::*;
use hostgauge::sink::{ChannelSink, MemorySink};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;

const MEMINFO: &str = "\
MemTotal:       8000000 kB
MemFree:        1000000 kB
MemAvailable:   4000000 kB
Dirty:              500 kB
HugePages_Total:      0
";

fn meminfo() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", MEMINFO).unwrap();
    file
}

fn scheduler() -> Scheduler {
    Scheduler::new(Duration::from_secs(5), Duration::ZERO)
}

#[tokio::test]
async fn scheduled_passes_publish_identical_metric_sets() {
    let file = meminfo();
    let sink = Arc::new(MemorySink::new("memory"));
    let overrides = CollectorConfig::new()
        .with("hostname", "web01")
        .with("convert_to_bytes", true);

    let mut scheduler = scheduler();
    scheduler.add_collector(
        MemoryCollector::with_source("memory", &overrides, sink.clone(), file.path()).unwrap(),
    );

    let first_report = scheduler.run_once().await;
    let first: Vec<(String, f64)> = sink.drain().unwrap().into_iter().map(|m| (m.path, m.value)).collect();
    let second_report = scheduler.run_once().await;
    let second: Vec<(String, f64)> = sink.drain().unwrap().into_iter().map(|m| (m.path, m.value)).collect();

    assert_eq!(first_report.completed(), 1);
    assert_eq!(second_report.completed(), 1);
    assert_eq!(
        first,
        vec![("servers.web01.memory.MemAvailable".to_string(), 4_096_000_000.0)]
    );
    assert_eq!(first, second);
}

#[tokio::test]
async fn detailed_metrics_flow_through_a_channel() {
    let file = meminfo();
    let (sink, mut rx) = ChannelSink::new("channel", 16);
    let overrides = CollectorConfig::new()
        .with("hostname", "web01")
        .with("path_prefix", "")
        .with("detailed", true);

    let collector =
        MemoryCollector::with_source("memory", &overrides, Arc::new(sink), file.path()).unwrap();
    collector.collect().await;
    drop(collector);

    let mut paths = Vec::new();
    while let Some(metric) = rx.recv().await {
        assert_eq!(metric.kind, MetricKind::Untyped);
        paths.push(metric.path);
    }

    assert_eq!(
        paths,
        vec![
            "web01.memory.MemTotal",
            "web01.memory.MemFree",
            "web01.memory.MemAvailable",
            "web01.memory.Dirty",
        ]
    );
}

#[tokio::test]
async fn agent_runs_a_single_pass_from_config() {
    let config = hostgauge::config::load_config_str(
        r#"
        [scheduler]
        splay = 0
        collect_timeout = 5

        [collectors.queues]
        kind = "list_length"
        host = "127.0.0.1"
        port = 1
        timeout = 1
        keys = "jobs"
        "#,
    )
    .unwrap();

    let sink = Arc::new(MemorySink::new("test"));
    let agent = Agent::with_sink(&config, sink.clone()).unwrap();
    let report = agent.run_once().await;

    // an unreachable store is logged by the collector, the pass itself completes
    assert_eq!(report.outcome_of("queues"), Some(&CycleOutcome::Completed));
    assert!(sink.is_empty().unwrap());
}
