use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::output::snapshot_log::{BlockBody, SnapshotBlock, SnapshotLog};
use crate::output::summary_csv::SummaryCsv;
use crate::system::counters::CounterCache;
use crate::system::sampler::sample_processes;
use crate::system::source::{EnumerationError, ProcessSource};
use crate::tree::aggregate::{aggregate, render_placeholder};
use crate::tree::forest::ForestIndex;
use crate::tree::node::{SampleSet, SubtreeTotals};
use crate::tree::target::resolve_targets;

/// Floor on the spacing between two samples and on the sleep after a cycle.
pub const MIN_SPACING: Duration = Duration::from_millis(500);

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Enumeration(#[from] EnumerationError),
    #[error("failed to write snapshot log")]
    SnapshotLog(#[source] std::io::Error),
}

/// What one completed cycle produced.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CycleReport {
    pub sampled: usize,
    pub primed: usize,
    pub evicted: usize,
    pub roots: usize,
    pub errors: usize,
    pub totals: SubtreeTotals,
}

/// Loop parameters for [`run`].
#[derive(Clone, Debug)]
pub struct RunSettings {
    pub interval: Duration,
    /// 0 runs until a shutdown signal arrives.
    pub max_cycles: u64,
}

/// Owns everything that lives across cycles.
pub struct Monitor<S: ProcessSource> {
    source: S,
    cache: CounterCache,
    log: SnapshotLog,
    summary: Option<SummaryCsv>,
    filter: Option<String>,
}

impl<S: ProcessSource> Monitor<S> {
    pub fn new(
        source: S,
        log: SnapshotLog,
        summary: Option<SummaryCsv>,
        filter: Option<String>,
    ) -> Self {
        Monitor {
            source,
            cache: CounterCache::new(),
            log,
            summary,
            filter,
        }
    }

    pub fn cache(&self) -> &CounterCache {
        &self.cache
    }

    /// Samples once, appends one block to the snapshot log and, when enabled,
    /// one row to the summary CSV.
    pub fn run_cycle(
        &mut self,
        interval_secs: f64,
        timestamp: &str,
    ) -> Result<CycleReport, CycleError> {
        let entries = self.source.enumerate()?;
        let batch = sample_processes(&self.source, &entries, &mut self.cache, Instant::now());
        debug!(
            sampled = batch.samples.len(),
            primed = batch.primed,
            evicted = batch.evicted,
            failures = batch.failures,
            "sampling pass complete"
        );

        let forest = ForestIndex::build(&batch.samples);
        let block = build_block(
            timestamp,
            self.filter.as_deref(),
            &batch.samples,
            &forest,
            interval_secs,
        );
        self.log.append(&block).map_err(CycleError::SnapshotLog)?;

        let (roots, totals) = match &block.body {
            BlockBody::Trees { roots, totals, .. } => (*roots, *totals),
            BlockBody::NotFound { .. } => (0, SubtreeTotals::default()),
        };
        info!(errors = totals.error_count, roots, "snapshot logged");

        if let Some(summary) = self.summary.as_mut() {
            match self.source.system_summary() {
                Some(system) => {
                    if let Err(err) = summary.append(timestamp, &system) {
                        warn!(error = ?err, "failed to write system summary");
                    }
                }
                None => debug!("system summary unavailable"),
            }
        }

        Ok(CycleReport {
            sampled: batch.samples.len(),
            primed: batch.primed,
            evicted: batch.evicted,
            roots,
            errors: totals.error_count,
            totals,
        })
    }
}

/// Renders one cycle's block from its samples and forest.
///
/// With a filter, only trees holding a matching process are printed; a
/// filter that matches nothing yields a not-found block.
pub fn build_block(
    timestamp: &str,
    filter: Option<&str>,
    samples: &SampleSet,
    forest: &ForestIndex,
    interval_secs: f64,
) -> SnapshotBlock {
    let roots: BTreeSet<u32> = match filter {
        Some(name) => {
            let roots = resolve_targets(name, samples, forest);
            info!(filter = name, roots = roots.len(), "resolved filter roots");
            roots
        }
        None => forest.roots.clone(),
    };

    if roots.is_empty() {
        return SnapshotBlock {
            timestamp: timestamp.to_string(),
            body: BlockBody::NotFound {
                filter: filter.map(str::to_string),
            },
        };
    }

    let mut lines = Vec::new();
    let mut totals = SubtreeTotals::default();
    for &root in &roots {
        if !samples.contains_key(&root) {
            warn!(pid = root, "root disappeared before rendering");
            lines.push(render_placeholder(root, 0, "Disappeared"));
            totals += SubtreeTotals::missing();
            continue;
        }
        let (tree_lines, tree_totals) = aggregate(root, forest, samples, interval_secs);
        lines.extend(tree_lines);
        totals += tree_totals;
    }

    SnapshotBlock {
        timestamp: timestamp.to_string(),
        body: BlockBody::Trees {
            lines,
            roots: roots.len(),
            totals,
        },
    }
}

/// How long to sleep once a cycle took `elapsed` out of `interval`.
pub fn sleep_after(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed).max(MIN_SPACING)
}

/// Runs cycles until `max_cycles` is reached or a shutdown signal arrives.
/// Returns the number of cycles that completed.
///
/// Enumeration failures skip the cycle and wait a full interval; a snapshot
/// log write failure ends the loop.
pub async fn run<S: ProcessSource>(
    monitor: &mut Monitor<S>,
    settings: &RunSettings,
) -> Result<u64, CycleError> {
    run_until(monitor, settings, shutdown_signal()).await
}

/// [`run`] with a caller-supplied shutdown future.
pub async fn run_until<S, F>(
    monitor: &mut Monitor<S>,
    settings: &RunSettings,
    shutdown: F,
) -> Result<u64, CycleError>
where
    S: ProcessSource,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut completed = 0;
    // Start of the last cycle that stored baselines; rates cover the time since.
    let mut last_start = tokio::time::Instant::now();

    loop {
        let since_last = last_start.elapsed();
        if since_last < MIN_SPACING && pause(MIN_SPACING - since_last, shutdown.as_mut()).await {
            break;
        }

        let started = tokio::time::Instant::now();
        let measured = started.duration_since(last_start);
        let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
        info!(
            %timestamp,
            interval_secs = %format!("{:.2}", measured.as_secs_f64()),
            "snapshot cycle started"
        );

        let wait = match monitor.run_cycle(measured.as_secs_f64(), &timestamp) {
            Ok(report) => {
                completed += 1;
                last_start = started;
                debug!(
                    sampled = report.sampled,
                    primed = report.primed,
                    evicted = report.evicted,
                    "cycle counters"
                );
                let elapsed = started.elapsed();
                let wait = sleep_after(settings.interval, elapsed);
                info!(
                    processing_secs = %format!("{:.2}", elapsed.as_secs_f64()),
                    sleep_secs = %format!("{:.2}", wait.as_secs_f64()),
                    "cycle finished"
                );
                wait
            }
            Err(CycleError::Enumeration(err)) => {
                // Baselines stay from the last good cycle, so `last_start` does too.
                error!(error = %err, "skipping cycle");
                settings.interval
            }
            Err(err) => return Err(err),
        };

        if settings.max_cycles > 0 && completed >= settings.max_cycles {
            info!(cycles = completed, "cycle limit reached");
            break;
        }
        if pause(wait, shutdown.as_mut()).await {
            break;
        }
    }

    Ok(completed)
}

/// Sleeps for `duration`; returns true when shutdown fired first.
async fn pause<F: Future<Output = ()>>(duration: Duration, shutdown: Pin<&mut F>) -> bool {
    tokio::select! {
        _ = shutdown => {
            info!("shutdown requested, stopping monitor");
            true
        }
        _ = tokio::time::sleep(duration) => false,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C"),
        _ = terminate => info!("received SIGTERM"),
    }
}
