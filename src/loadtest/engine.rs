//! Run orchestration for the signup, start, and ping workflows.
//!
//! [`LoadTestEngine`] is the composition point. Each run turns generated
//! [`WorkItem`]s into tasks, hands them to the [`Executor`], streams every
//! outcome to the live display and the latency recorder as it completes,
//! then aggregates and persists:
//!
//! - **signup**: both CSV reports.
//! - **start**: the session store, in completion order, sentinels excluded.
//! - **ping**: nothing; the counts are the result.
//!
//! Configuration problems are reported by [`LoadTestEngine::new`] before any
//! task exists. Once a run starts, individual request failures never abort
//! it.

use std::sync::Arc;
use std::time::Duration;

use crate::loadtest::client::HttpAdapter;
use crate::loadtest::config::HarnessConfig;
use crate::loadtest::display::{LiveDisplay, StatusLine};
use crate::loadtest::error::{LoadTestError, RequestError};
use crate::loadtest::generator::{
    ping_items, signup_items, start_items, IdentityGenerator, WorkItem, WorkKind,
};
use crate::loadtest::metrics::{LatencyRecorder, LatencySnapshot};
use crate::loadtest::pool::{batch_count, ExecutionReport, Executor, ExecutorSettings};
use crate::loadtest::report::{
    aggregate, write_failure_report, write_success_report, Aggregate, FailureRow, Outcome,
    SuccessRow,
};
use crate::loadtest::session::{PingOutcome, SessionClient, SessionId, StartOutcome};
use crate::loadtest::signup::{SignupOutcome, SignupSequencer};
use crate::loadtest::store::SessionStore;

/// Outcome of any work item.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Signup(SignupOutcome),
    Start(StartOutcome),
    Ping(PingOutcome),
}

impl TaskOutcome {
    pub fn into_signup(self) -> Option<SignupOutcome> {
        match self {
            Self::Signup(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub fn into_start(self) -> Option<StartOutcome> {
        match self {
            Self::Start(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub fn into_ping(self) -> Option<PingOutcome> {
        match self {
            Self::Ping(outcome) => Some(outcome),
            _ => None,
        }
    }
}

impl Outcome for TaskOutcome {
    fn is_ok(&self) -> bool {
        match self {
            Self::Signup(o) => o.is_ok(),
            Self::Start(o) => o.is_ok(),
            Self::Ping(o) => o.is_ok(),
        }
    }

    fn error(&self) -> Option<&RequestError> {
        match self {
            Self::Signup(o) => o.error(),
            Self::Start(o) => o.error(),
            Self::Ping(o) => o.error(),
        }
    }

    fn elapsed(&self) -> Duration {
        match self {
            Self::Signup(o) => o.elapsed(),
            Self::Start(o) => o.elapsed(),
            Self::Ping(o) => o.elapsed(),
        }
    }
}

impl StatusLine for TaskOutcome {
    fn describe(&self) -> String {
        match self {
            Self::Signup(o) => o.describe(),
            Self::Start(o) => o.describe(),
            Self::Ping(o) => o.describe(),
        }
    }
}

/// Per-item request logic for every workflow.
struct Workflows {
    signup: SignupSequencer,
    sessions: SessionClient,
}

impl Workflows {
    fn from_config(
        adapter: Arc<dyn HttpAdapter>,
        config: &HarnessConfig,
    ) -> Result<Self, LoadTestError> {
        let signup = SignupSequencer::from_config(Arc::clone(&adapter), config)?;
        let sessions = SessionClient::new(
            adapter,
            config.endpoint_url(&config.endpoints.start)?,
            config.endpoint_url(&config.endpoints.ping)?,
            config.settings.timeout_as_duration(),
        );
        Ok(Self { signup, sessions })
    }

    async fn execute(&self, item: WorkItem) -> TaskOutcome {
        match item {
            WorkItem::Signup(identity) => TaskOutcome::Signup(self.signup.run(identity).await),
            WorkItem::Start { index, device_id } => {
                TaskOutcome::Start(self.sessions.start(index, &device_id).await)
            },
            WorkItem::Ping { session, .. } => TaskOutcome::Ping(self.sessions.ping(session).await),
        }
    }
}

/// Counts and timings shared by every workflow result.
#[derive(Debug, Clone, PartialEq)]
pub struct RunStats {
    pub total: usize,
    pub ok: usize,
    pub fail: usize,
    pub batches: usize,
    pub elapsed: Duration,
    pub latency: LatencySnapshot,
}

impl RunStats {
    fn new<T, R>(agg: &Aggregate<T>, report: &ExecutionReport<R>, latency: LatencySnapshot) -> Self {
        Self {
            total: agg.total(),
            ok: agg.ok.len(),
            fail: agg.fail.len(),
            batches: report.batches,
            elapsed: report.elapsed,
            latency,
        }
    }

    /// `ok=<n> fail=<n>`
    pub fn summary_line(&self) -> String {
        format!("ok={} fail={}", self.ok, self.fail)
    }

    /// Tasks completed per second over the whole run.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total as f64 / secs
        } else {
            0.0
        }
    }
}

/// Result of a signup run.
#[derive(Debug, Clone)]
pub struct SignupRunResult {
    pub stats: RunStats,
    pub success_rows: Vec<SuccessRow>,
    pub failure_rows: Vec<FailureRow>,
}

/// Result of a start run.
#[derive(Debug, Clone)]
pub struct StartRunResult {
    pub stats: RunStats,
    /// Session ids written to the store, in completion order.
    pub persisted: Vec<SessionId>,
}

/// Result of a ping run.
#[derive(Debug, Clone)]
pub struct PingRunResult {
    pub stats: RunStats,
}

impl PingRunResult {
    /// `pinged=<total> total=<total> ok=<ok>`
    pub fn summary_line(&self) -> String {
        format!(
            "pinged={} total={} ok={}",
            self.stats.total, self.stats.total, self.stats.ok
        )
    }
}

/// Top-level entry point for the three workflows.
pub struct LoadTestEngine {
    config: Arc<HarnessConfig>,
    workflows: Arc<Workflows>,
    no_color: bool,
    live_output: bool,
}

impl LoadTestEngine {
    /// Validates `config` and resolves every endpoint URL.
    ///
    /// Fails with [`LoadTestError::MissingConfig`] when no base URL is set.
    pub fn new(
        config: Arc<HarnessConfig>,
        adapter: Arc<dyn HttpAdapter>,
    ) -> Result<Self, LoadTestError> {
        config.validate()?;
        let workflows = Arc::new(Workflows::from_config(adapter, &config)?);
        Ok(Self {
            config,
            workflows,
            no_color: false,
            live_output: true,
        })
    }

    /// Disables colored output.
    pub fn with_no_color(mut self, no_color: bool) -> Self {
        self.no_color = no_color;
        self
    }

    /// Enables or disables per-completion status lines and the progress bar.
    pub fn with_live_output(mut self, enabled: bool) -> Self {
        self.live_output = enabled;
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Number of batches a run of `total` items will use.
    pub fn planned_batches(&self, total: usize) -> usize {
        batch_count(total, self.config.settings.batch_size)
    }

    async fn execute(
        &self,
        items: Vec<WorkItem>,
        kind: WorkKind,
    ) -> (ExecutionReport<TaskOutcome>, LatencySnapshot) {
        let display = if self.live_output {
            LiveDisplay::new(items.len(), &kind.to_string(), self.no_color)
        } else {
            LiveDisplay::hidden()
        };
        let mut recorder = LatencyRecorder::new();
        let executor = Executor::new(ExecutorSettings::from_settings(&self.config.settings));

        tracing::info!(
            workflow = %kind,
            tasks = items.len(),
            concurrency = executor.settings().concurrency,
            batches = self.planned_batches(items.len()),
            "run starting"
        );

        let workflows = Arc::clone(&self.workflows);
        let report = executor
            .run(
                items,
                move |item| {
                    let workflows = Arc::clone(&workflows);
                    async move { workflows.execute(item).await }
                },
                |outcome| {
                    recorder.record(outcome);
                    display.on_result(outcome);
                },
            )
            .await;
        display.finish();

        (report, recorder.snapshot())
    }

    /// Runs `count` signups and writes the success and failure reports.
    pub async fn run_signup(&self) -> Result<SignupRunResult, LoadTestError> {
        let generator = IdentityGenerator::new(self.config.signup.email_domain.as_str());
        let items = signup_items(&generator, self.config.settings.count);
        let (mut report, latency) = self.execute(items, WorkKind::Signup).await;

        let outcomes: Vec<SignupOutcome> = std::mem::take(&mut report.results)
            .into_iter()
            .filter_map(TaskOutcome::into_signup)
            .collect();
        let agg = aggregate(outcomes);

        let password = self.workflows.signup.password();
        let success_rows: Vec<SuccessRow> = agg
            .ok
            .iter()
            .filter_map(|o| SuccessRow::from_outcome(o, password))
            .collect();
        let failure_rows: Vec<FailureRow> =
            agg.fail.iter().filter_map(FailureRow::from_outcome).collect();

        // Both reports are attempted before the first error is returned.
        let success_written =
            write_success_report(&self.config.output.success_report, &success_rows);
        let failure_written =
            write_failure_report(&self.config.output.failure_report, &failure_rows);
        for err in [&success_written, &failure_written]
            .into_iter()
            .filter_map(|r| r.as_ref().err())
        {
            tracing::warn!(error = %err, "signup report not written");
        }
        success_written.and(failure_written)?;

        let stats = RunStats::new(&agg, &report, latency);
        tracing::info!(ok = stats.ok, fail = stats.fail, "signup run finished");
        Ok(SignupRunResult {
            stats,
            success_rows,
            failure_rows,
        })
    }

    /// Starts `count` sessions and persists every real session id.
    pub async fn run_start(&self) -> Result<StartRunResult, LoadTestError> {
        let items = start_items(self.config.settings.count);
        let (mut report, latency) = self.execute(items, WorkKind::Start).await;

        let outcomes: Vec<StartOutcome> = std::mem::take(&mut report.results)
            .into_iter()
            .filter_map(TaskOutcome::into_start)
            .collect();
        let agg = aggregate(outcomes);

        // `aggregate` keeps relative order, so this is completion order.
        let persisted: Vec<SessionId> = agg
            .ok
            .iter()
            .filter_map(|o| o.session.as_ref().ok().cloned())
            .collect();
        SessionStore::new(&self.config.output.sessions).write(&persisted)?;

        let stats = RunStats::new(&agg, &report, latency);
        tracing::info!(
            ok = stats.ok,
            fail = stats.fail,
            persisted = persisted.len(),
            "start run finished"
        );
        Ok(StartRunResult { stats, persisted })
    }

    /// Pings every persisted session once.
    ///
    /// An empty or missing store is a successful run with zero pings.
    pub async fn run_ping(&self) -> Result<PingRunResult, LoadTestError> {
        let sessions = SessionStore::new(&self.config.output.sessions).read()?;
        let (mut report, latency) = self.execute(ping_items(sessions), WorkKind::Ping).await;

        let outcomes: Vec<PingOutcome> = std::mem::take(&mut report.results)
            .into_iter()
            .filter_map(TaskOutcome::into_ping)
            .collect();
        let agg = aggregate(outcomes);

        let stats = RunStats::new(&agg, &report, latency);
        tracing::info!(total = stats.total, ok = stats.ok, "ping run finished");
        Ok(PingRunResult { stats })
    }
}
