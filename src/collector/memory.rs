//! Memory statistics from `/proc/meminfo`
use async_trait::async_trait;
use log::{debug, error};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::config::CollectorConfig;
use super::core::{Collector, CollectorBase, ConfigHelp, base_default_config, base_default_config_help};
use crate::error::Result;
use crate::sink::MetricSink;

/// Default system information source
pub const PROC_MEMINFO: &str = "/proc/meminfo";

/// Frequently reported entries, hidden unless `detailed` is set
pub const COMMON_METRICS: [&str; 13] = [
    "MemTotal",
    "MemFree",
    "Buffers",
    "Cached",
    "Active",
    "Dirty",
    "Inactive",
    "SwapTotal",
    "SwapFree",
    "SwapCached",
    "VmallocTotal",
    "VmallocUsed",
    "VmallocChunk",
];

/// One parsed `Name: value unit` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeminfoEntry<'a> {
    pub name: &'a str,
    pub value: i64,
    pub unit: &'a str,
}

/// Parse a single meminfo line.
///
/// Only lines with exactly three tokens and an integer value parse; everything else,
/// including entries without a unit, yields `None`.
pub fn parse_meminfo_line(line: &str) -> Option<MeminfoEntry<'_>> {
    let mut tokens = line.split_whitespace();
    let (name, value, unit) = (tokens.next()?, tokens.next()?, tokens.next()?);
    if tokens.next().is_some() {
        return None;
    }

    Some(MeminfoEntry {
        name: name.strip_suffix(':').unwrap_or(name),
        value: value.parse().ok()?,
        unit,
    })
}

/// Typed view of the memory collector options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySettings {
    pub detailed: bool,
    pub convert_to_bytes: bool,
}

impl MemorySettings {
    pub fn from_config(config: &CollectorConfig) -> Result<Self> {
        Ok(Self {
            detailed: config.get_bool("detailed")?.unwrap_or(false),
            convert_to_bytes: config.get_bool("convert_to_bytes")?.unwrap_or(false),
        })
    }

    /// Whether a parsed entry is left out of the pass
    pub fn skips(&self, name: &str) -> bool {
        COMMON_METRICS.contains(&name) && !self.detailed
    }

    /// Value to publish for a parsed entry
    pub fn value_of(&self, entry: &MeminfoEntry<'_>) -> i64 {
        if self.convert_to_bytes && entry.unit == "kB" {
            entry.value.saturating_mul(1024)
        } else {
            entry.value
        }
    }
}

/// Collects memory utilisation from a meminfo-style file
pub struct MemoryCollector {
    base: CollectorBase,
    settings: MemorySettings,
    source: PathBuf,
}

impl MemoryCollector {
    /// Create a collector reading [`PROC_MEMINFO`]
    pub fn new(
        name: impl Into<String>,
        overrides: &CollectorConfig,
        sink: Arc<dyn MetricSink>,
    ) -> Result<Self> {
        Self::with_source(name, overrides, sink, PROC_MEMINFO)
    }

    /// Create a collector reading an arbitrary meminfo-formatted file
    pub fn with_source(
        name: impl Into<String>,
        overrides: &CollectorConfig,
        sink: Arc<dyn MetricSink>,
        source: impl AsRef<Path>,
    ) -> Result<Self> {
        let base = CollectorBase::new(name, &Self::default_config(), overrides, sink)?;
        let settings = MemorySettings::from_config(base.config())?;

        Ok(Self {
            base,
            settings,
            source: source.as_ref().to_path_buf(),
        })
    }

    pub fn settings(&self) -> MemorySettings {
        self.settings
    }
}

#[async_trait]
impl Collector for MemoryCollector {
    fn base(&self) -> &CollectorBase {
        &self.base
    }

    async fn collect(&self) {
        let data = match tokio::fs::read_to_string(&self.source).await {
            Ok(data) => data,
            Err(e) => {
                error!("{}: cannot read {}: {}", self.name(), self.source.display(), e);
                return;
            }
        };

        let mut published = 0;
        for entry in data.lines().filter_map(parse_meminfo_line) {
            if self.settings.skips(entry.name) {
                continue;
            }

            self.publish(entry.name, self.settings.value_of(&entry) as f64).await;
            published += 1;
        }

        debug!("{}: published {} memory metrics", self.name(), published);
    }

    fn default_config() -> CollectorConfig {
        base_default_config()
            .with("path", "memory")
            .with("detailed", false)
            .with("convert_to_bytes", false)
    }

    fn default_config_help() -> ConfigHelp {
        let mut help = base_default_config_help();
        help.insert(
            "detailed".to_string(),
            "Also publish the common entries (MemTotal, MemFree, ...)".to_string(),
        );
        help.insert(
            "convert_to_bytes".to_string(),
            "Multiply values reported in kB by 1024".to_string(),
        );
        help
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::ConfigValue;
    use crate::sink::MemorySink;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MEMINFO: &str = "\
MemTotal:       16314128 kB
MemFree:          512000 kB
Buffers:          204800 kB
Cached:          4096000 kB
Active:          6000000 kB
Dirty:               500 kB
Inactive:        3000000 kB
SwapTotal:       2097148 kB
SwapFree:        2097148 kB
SwapCached:            0 kB
VmallocTotal:   34359738367 kB
VmallocUsed:       65000 kB
VmallocChunk:          0 kB
MemAvailable:    9000000 kB
Shmem:              1200 kB
HugePages_Total:       0
HugePages_Free:        0
Hugepagesize:       2048 kB
Broken:        lots kB
";

    fn fixture(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    fn collector(overrides: CollectorConfig, file: &NamedTempFile) -> (MemoryCollector, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new("test"));
        let overrides = overrides.with("hostname", "h");
        let collector = MemoryCollector::with_source("memory", &overrides, sink.clone(), file.path()).unwrap();
        (collector, sink)
    }

    fn published_names(sink: &MemorySink) -> Vec<String> {
        sink.metrics()
            .unwrap()
            .into_iter()
            .map(|m| m.path.trim_start_matches("servers.h.memory.").to_string())
            .collect()
    }

    #[test]
    fn parses_well_formed_lines() {
        assert_eq!(
            parse_meminfo_line("MemFree:          512000 kB"),
            Some(MeminfoEntry { name: "MemFree", value: 512000, unit: "kB" })
        );
        assert_eq!(
            parse_meminfo_line("Foo: 7 pages"),
            Some(MeminfoEntry { name: "Foo", value: 7, unit: "pages" })
        );
    }

    #[test]
    fn rejects_malformed_lines() {
        assert_eq!(parse_meminfo_line("HugePages_Total:       0"), None);
        assert_eq!(parse_meminfo_line("Broken:        lots kB"), None);
        assert_eq!(parse_meminfo_line("Too: 1 kB extra"), None);
        assert_eq!(parse_meminfo_line(""), None);
    }

    #[test]
    fn skip_condition_only_hides_common_names_without_detailed() {
        let plain = MemorySettings { detailed: false, convert_to_bytes: false };
        let detailed = MemorySettings { detailed: true, convert_to_bytes: false };

        assert!(plain.skips("MemTotal"));
        assert!(!plain.skips("MemAvailable"));
        assert!(!detailed.skips("MemTotal"));
        assert!(!detailed.skips("MemAvailable"));
    }

    #[tokio::test]
    async fn default_pass_hides_common_entries() {
        let file = fixture(MEMINFO);
        let (collector, sink) = collector(CollectorConfig::new(), &file);

        collector.collect().await;

        let names = published_names(&sink);
        assert_eq!(names, vec!["MemAvailable", "Shmem", "Hugepagesize"]);
        for common in COMMON_METRICS {
            assert!(!names.iter().any(|n| n == common));
        }
    }

    #[tokio::test]
    async fn detailed_pass_publishes_everything_parsed() {
        let file = fixture(MEMINFO);
        let (collector, sink) = collector(CollectorConfig::new().with("detailed", true), &file);

        collector.collect().await;

        let names = published_names(&sink);
        assert_eq!(names.len(), 16);
        for common in COMMON_METRICS {
            assert!(names.iter().any(|n| n == common), "missing {}", common);
        }
        assert_eq!(sink.value_of("servers.h.memory.Dirty").unwrap(), Some(500.0));
    }

    #[tokio::test]
    async fn convert_to_bytes_only_touches_kb() {
        let file = fixture("Dirty: 500 kB\nWeird: 500 pages\n");
        let overrides = CollectorConfig::new()
            .with("detailed", "yes")
            .with("convert_to_bytes", true);
        let (collector, sink) = collector(overrides, &file);

        collector.collect().await;

        assert_eq!(sink.value_of("servers.h.memory.Dirty").unwrap(), Some(512000.0));
        assert_eq!(sink.value_of("servers.h.memory.Weird").unwrap(), Some(500.0));
    }

    #[tokio::test]
    async fn unreadable_source_publishes_nothing() {
        let sink = Arc::new(MemorySink::new("test"));
        let collector = MemoryCollector::with_source(
            "memory",
            &CollectorConfig::new(),
            sink.clone(),
            "/nonexistent/hostgauge/meminfo",
        )
        .unwrap();

        collector.collect().await;

        assert!(sink.is_empty().unwrap());
    }

    #[tokio::test]
    async fn repeated_passes_are_identical() {
        let file = fixture(MEMINFO);
        let (collector, sink) = collector(CollectorConfig::new().with("detailed", true), &file);

        collector.collect().await;
        let first: Vec<(String, f64)> = sink.drain().unwrap().into_iter().map(|m| (m.path, m.value)).collect();
        collector.collect().await;
        let second: Vec<(String, f64)> = sink.drain().unwrap().into_iter().map(|m| (m.path, m.value)).collect();

        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn defaults_include_memory_options() {
        let defaults = MemoryCollector::default_config();
        assert_eq!(defaults.get("detailed"), Some(&ConfigValue::Bool(false)));
        assert_eq!(defaults.get_str("path").unwrap().as_deref(), Some("memory"));
        assert!(MemoryCollector::default_config_help().contains_key("convert_to_bytes"));
    }

    #[test]
    fn malformed_flag_fails_construction() {
        let sink = Arc::new(MemorySink::new("test"));
        let overrides = CollectorConfig::new().with("detailed", "sometimes");
        assert!(MemoryCollector::new("memory", &overrides, sink).is_err());
    }
}
