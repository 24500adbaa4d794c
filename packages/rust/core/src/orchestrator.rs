//! Run orchestration: one unit of work per link, drained as they complete.
//!
//! The orchestrator owns the strategy registry, the session pool and the
//! agent for its whole lifetime. All units run interleaved on the calling
//! task; parallelism is bounded by the pool size, not by the number of links.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::time::Instant;

use futures::FutureExt;
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{info, instrument, warn};

use profilecrawl_browser::{ExtractionAgent, SessionPool, SessionProvider, TeardownReport};
use profilecrawl_shared::{Link, Result, RunConfig, RunId, Subject, TaskOutcome};
use profilecrawl_strategies::StrategyRegistry;

use crate::diagnostics::{DiagnosticSink, FsDiagnostics};
use crate::merger::{MergedReport, ReportPaths, ResultMerger};
use crate::task::run_extraction;

/// Reason recorded for links still running when the global deadline fires.
pub const DEADLINE_EXCEEDED: &str = "deadline exceeded";

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called once per link, before any unit is polled.
    fn task_started(&self, strategy: &str, link: &Link);
    /// Called as each outcome arrives.
    fn task_finished(&self, outcome: &TaskOutcome);
    /// Called when the run completes.
    fn done(&self, report: &MergedReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn task_started(&self, _strategy: &str, _link: &Link) {}
    fn task_finished(&self, _outcome: &TaskOutcome) {}
    fn done(&self, _report: &MergedReport) {}
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct Orchestrator<P: SessionProvider, A> {
    config: RunConfig,
    registry: StrategyRegistry,
    pool: SessionPool<P>,
    agent: A,
    diagnostics: Box<dyn DiagnosticSink>,
}

impl<P, A> Orchestrator<P, A>
where
    P: SessionProvider,
    A: ExtractionAgent<P::Session>,
{
    /// Validate the config and warm up the session pool.
    ///
    /// Fails when the pool cannot be built; no link is processed in that case.
    #[instrument(skip_all, fields(concurrency = config.concurrency))]
    pub async fn start(
        config: RunConfig,
        registry: StrategyRegistry,
        provider: P,
        agent: A,
    ) -> Result<Self> {
        config.validate()?;
        let pool = SessionPool::warm_up(provider, config.concurrency).await?;
        let diagnostics = Box::new(FsDiagnostics::new(&config.out_dir, config.verbose));

        Ok(Self {
            config,
            registry,
            pool,
            agent,
            diagnostics,
        })
    }

    /// Replace the default filesystem diagnostics.
    pub fn with_diagnostics(mut self, sink: impl DiagnosticSink + 'static) -> Self {
        self.diagnostics = Box::new(sink);
        self
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Extract every link of `subject` and merge the outcomes.
    ///
    /// Produces exactly one outcome per link. Per-link failures, panics and
    /// the global deadline all end up as failed outcomes, never as `Err`.
    #[instrument(skip_all, fields(subject = %subject.name, links = subject.links.len()))]
    pub async fn run(&self, subject: &Subject, progress: &dyn ProgressReporter) -> MergedReport {
        let run_id = RunId::new();
        let start = Instant::now();
        info!(%run_id, "starting extraction run");

        let mut merger = ResultMerger::new(subject.name.clone());
        let mut pending: BTreeMap<usize, (String, &Link)> = BTreeMap::new();
        let mut units = FuturesUnordered::new();

        for (index, link) in subject.links.iter().enumerate() {
            let strategy = self.registry.classify(&link.url);
            let name = strategy.name().to_string();
            progress.task_started(&name, link);
            pending.insert(index, (name.clone(), link));

            units.push(async move {
                let unit = run_extraction(
                    subject,
                    link,
                    strategy.as_ref(),
                    &self.pool,
                    &self.agent,
                    self.diagnostics.as_ref(),
                    self.config.max_steps,
                );
                let outcome = AssertUnwindSafe(unit)
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        let reason = format!("task panicked: {}", panic_message(panic.as_ref()));
                        warn!(strategy = %name, url = %link.url, "{reason}");
                        TaskOutcome::failure(name, link.clone(), reason)
                    });
                (index, outcome)
            });
        }

        let drain = async {
            while let Some((index, outcome)) = units.next().await {
                pending.remove(&index);
                progress.task_finished(&outcome);
                merger.record(outcome);
            }
        };

        let completed = match self.config.run_timeout {
            Some(limit) => tokio::time::timeout(limit, drain).await.is_ok(),
            None => {
                drain.await;
                true
            }
        };

        // Dropping the remaining units returns their sessions.
        drop(units);

        if !completed {
            warn!(unfinished = pending.len(), "run deadline exceeded");
            for (strategy, link) in pending.into_values() {
                let outcome = TaskOutcome::failure(strategy, link.clone(), DEADLINE_EXCEEDED);
                progress.task_finished(&outcome);
                merger.record(outcome);
            }
        }

        let report = merger.finalize();
        info!(
            %run_id,
            successes = report.successes(),
            failures = report.failures(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "extraction run complete"
        );
        progress.done(&report);
        report
    }

    /// Tear down every session. Individual failures are collected, not fatal.
    #[instrument(skip_all)]
    pub async fn shutdown(self) -> TeardownReport {
        self.pool.shutdown().await
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ---------------------------------------------------------------------------
// profile_subject
// ---------------------------------------------------------------------------

/// Everything a full run produced.
#[derive(Debug)]
pub struct ProfileRun {
    pub report: MergedReport,
    pub paths: ReportPaths,
    pub teardown: TeardownReport,
}

/// Warm up, extract every link, write the merged report, tear down.
///
/// The pool is torn down even when writing the report fails.
pub async fn profile_subject<P, A>(
    subject: &Subject,
    config: RunConfig,
    registry: StrategyRegistry,
    provider: P,
    agent: A,
    progress: &dyn ProgressReporter,
) -> Result<ProfileRun>
where
    P: SessionProvider,
    A: ExtractionAgent<P::Session>,
{
    subject.validate()?;
    let out_dir: PathBuf = config.out_dir.clone();

    let orchestrator = Orchestrator::start(config, registry, provider, agent).await?;
    let report = orchestrator.run(subject, progress).await;
    let written = report.write(&out_dir);
    let teardown = orchestrator.shutdown().await;

    if !teardown.is_clean() {
        warn!(failures = ?teardown.failures, "session teardown was not clean");
    }

    Ok(ProfileRun {
        report,
        paths: written?,
        teardown,
    })
}
