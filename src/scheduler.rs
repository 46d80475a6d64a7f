//! Periodic dispatch of collectors with per-collector failure isolation
use log::{debug, error, info, warn};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{self, MissedTickBehavior};

use crate::collector::Collector;
use crate::config::SchedulerConfig;
use crate::error::{AgentError, Result};

/// How a single polling pass ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed,
    TimedOut,
    Panicked(String),
    Cancelled,
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleOutcome::Completed => f.write_str("completed"),
            CycleOutcome::TimedOut => f.write_str("timed out"),
            CycleOutcome::Panicked(msg) => write!(f, "panicked: {}", msg),
            CycleOutcome::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Per-collector outcomes of one [`Scheduler::run_once`] pass
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub outcomes: Vec<(String, CycleOutcome)>,
}

impl CycleReport {
    /// Number of collectors whose pass completed
    pub fn completed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| *outcome == CycleOutcome::Completed)
            .count()
    }

    /// Collectors whose pass did not complete
    pub fn failures(&self) -> impl Iterator<Item = &(String, CycleOutcome)> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| *outcome != CycleOutcome::Completed)
    }

    pub fn outcome_of(&self, name: &str) -> Option<&CycleOutcome> {
        self.outcomes.iter().find(|(n, _)| n == name).map(|(_, o)| o)
    }
}

/// Aborts the wrapped task when dropped
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run one `collect()` in its own task, bounded by `limit`.
///
/// Panics and overruns are logged and reported; they never reach the caller.
/// Dropping the returned future cancels the pass.
pub async fn run_cycle(collector: Arc<dyn Collector>, limit: Duration) -> CycleOutcome {
    let name = collector.name().to_string();
    let task = tokio::spawn(async move { collector.collect().await });
    let abort = AbortOnDrop(task.abort_handle());

    match time::timeout(limit, task).await {
        Ok(Ok(())) => {
            debug!("Collector {} finished its pass", name);
            CycleOutcome::Completed
        }
        Ok(Err(e)) if e.is_panic() => {
            error!("Collector {} panicked during collection: {}", name, e);
            CycleOutcome::Panicked(e.to_string())
        }
        Ok(Err(e)) => {
            warn!("Collector {} was cancelled: {}", name, e);
            CycleOutcome::Cancelled
        }
        Err(_) => {
            drop(abort);
            error!("Collector {} did not finish within {:?}", name, limit);
            CycleOutcome::TimedOut
        }
    }
}

fn splay_delay(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::random_range(0..=max_ms))
}

/// Invokes each registered collector at its own interval
pub struct Scheduler {
    collectors: Vec<Arc<dyn Collector>>,
    collect_timeout: Duration,
    splay: Duration,
    running: Arc<RwLock<bool>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    /// Create a scheduler with explicit bounds
    pub fn new(collect_timeout: Duration, splay: Duration) -> Self {
        Self {
            collectors: Vec::new(),
            collect_timeout,
            splay,
            running: Arc::new(RwLock::new(false)),
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(config.collect_timeout(), config.splay())
    }

    /// Register a collector; disabled collectors are skipped and `false` is returned
    pub fn register(&mut self, collector: Arc<dyn Collector>) -> bool {
        if !collector.enabled() {
            info!("Collector {} is disabled, not scheduling it", collector.name());
            return false;
        }

        debug!(
            "Registered collector {} (interval {:?})",
            collector.name(),
            collector.interval()
        );
        self.collectors.push(collector);
        true
    }

    /// Register an owned collector
    pub fn add_collector<C: Collector>(&mut self, collector: C) -> bool {
        self.register(Arc::new(collector))
    }

    pub fn collector_names(&self) -> Vec<&str> {
        self.collectors.iter().map(|c| c.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }

    /// Run every collector once, concurrently, and wait for all of them
    pub async fn run_once(&self) -> CycleReport {
        let passes: Vec<_> = self
            .collectors
            .iter()
            .map(|collector| {
                let name = collector.name().to_string();
                let pass = tokio::spawn(run_cycle(Arc::clone(collector), self.collect_timeout));
                (name, pass)
            })
            .collect();

        let mut report = CycleReport::default();
        for (name, pass) in passes {
            let outcome = pass.await.unwrap_or_else(|e| CycleOutcome::Panicked(e.to_string()));
            report.outcomes.push((name, outcome));
        }
        report
    }

    /// Start one polling loop per collector
    pub async fn start(&self) -> Result<()> {
        let mut running = self.running.write().await;
        if *running {
            return Err(AgentError::Scheduler("scheduler already started".to_string()));
        }
        *running = true;
        drop(running);

        if self.collectors.is_empty() {
            warn!("Scheduler started with no collectors");
        }

        let mut handles = self.handles.lock().await;
        for collector in &self.collectors {
            let collector = Arc::clone(collector);
            let running = Arc::clone(&self.running);
            let limit = self.collect_timeout;
            let splay = splay_delay(self.splay);

            handles.push(tokio::spawn(async move {
                if !splay.is_zero() {
                    time::sleep(splay).await;
                }

                let mut interval_timer = time::interval(collector.interval());
                interval_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

                info!(
                    "Starting collector {} (interval {:?})",
                    collector.name(),
                    collector.interval()
                );

                loop {
                    interval_timer.tick().await;
                    if !*running.read().await {
                        break;
                    }

                    run_cycle(Arc::clone(&collector), limit).await;
                }

                debug!("Collector loop for {} exited", collector.name());
            }));
        }

        info!("Scheduler started with {} collectors", self.collectors.len());
        Ok(())
    }

    /// Stop every polling loop
    pub async fn stop(&self) -> Result<()> {
        let mut running = self.running.write().await;
        *running = false;
        drop(running);

        let mut handles = self.handles.lock().await;
        for handle in handles.drain(..) {
            handle.abort();
        }

        info!("Scheduler stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}
