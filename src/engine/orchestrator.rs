//! Execution orchestrator -- walks a run's case list sequentially or through
//! a bounded worker pool.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use crate::alert::Notifier;
use crate::catalog::{TestCase, TestStatus};
use crate::engine::executor::{ExecContext, ExecOptions, ExecutorRegistry};
use crate::engine::tracker::StatusTracker;
use crate::engine::{EngineError, RunMode, TestResult};
use crate::storage::{self, Pool};

/// Without an explicit cap a parallel run never uses more workers than this.
const DEFAULT_MAX_WORKERS: usize = 10;

/// Per-run knobs assembled by the scheduler.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub execution_id: String,
    pub max_parallel: Option<usize>,
    pub exec: ExecOptions,
    pub artifacts_dir: PathBuf,
}

/// Runs case lists through the executor registry, persisting each result as
/// it arrives and feeding the live status view.
pub struct Engine {
    pool: Pool,
    registry: Arc<ExecutorRegistry>,
    notifier: Arc<dyn Notifier>,
    tracker: Arc<StatusTracker>,
}

impl Engine {
    pub fn new(
        pool: Pool,
        registry: Arc<ExecutorRegistry>,
        notifier: Arc<dyn Notifier>,
        tracker: Arc<StatusTracker>,
    ) -> Self {
        Engine {
            pool,
            registry,
            notifier,
            tracker,
        }
    }

    /// Execute the given catalog ids, one result per id. Duplicate ids run
    /// twice; ids with no catalog entry are dropped. Individual check
    /// failures land in the results; only orchestration problems error.
    pub async fn run(
        &self,
        case_ids: &[i64],
        mode: RunMode,
        opts: &RunOptions,
    ) -> Result<Vec<TestResult>, EngineError> {
        let cases = storage::find_cases_by_ids(&self.pool, case_ids)?;
        let ctx = ExecContext {
            execution_id: opts.execution_id.clone(),
            options: opts.exec.clone(),
            artifacts_dir: opts.artifacts_dir.clone(),
        };

        info!(
            execution_id = %ctx.execution_id,
            mode = %mode,
            cases = cases.len(),
            "Starting run"
        );

        match mode {
            RunMode::Sequential => self.run_sequential(&cases, &ctx).await,
            RunMode::Parallel => self.run_parallel(cases, &ctx, opts.max_parallel).await,
        }
    }

    async fn run_sequential(
        &self,
        cases: &[TestCase],
        ctx: &ExecContext,
    ) -> Result<Vec<TestResult>, EngineError> {
        let mut results = Vec::with_capacity(cases.len());
        for case in cases {
            let mut result = execute_case(&self.registry, case, ctx).await;
            debug!(case = %case.name, status = %result.status, "Check finished");

            result.id = Some(storage::save_result(&self.pool, &result)?);
            self.tracker.append_result(&ctx.execution_id, &result).await;
            if result.is_failed() {
                self.notifier.on_test_failed(&ctx.execution_id, &result).await;
            }
            results.push(result);
        }
        Ok(results)
    }

    async fn run_parallel(
        &self,
        cases: Vec<TestCase>,
        ctx: &ExecContext,
        max_parallel: Option<usize>,
    ) -> Result<Vec<TestResult>, EngineError> {
        if cases.is_empty() {
            return Ok(Vec::new());
        }

        let cap = worker_cap(max_parallel, cases.len());
        debug!(execution_id = %ctx.execution_id, workers = cap, "Parallel pool sized");
        let semaphore = Arc::new(Semaphore::new(cap));

        let metas: Vec<(i64, String, crate::catalog::TestKind)> = cases
            .iter()
            .map(|case| (case.id, case.name.clone(), case.kind))
            .collect();

        let mut handles = Vec::with_capacity(cases.len());
        for case in cases {
            let semaphore = semaphore.clone();
            let pool = self.pool.clone();
            let registry = self.registry.clone();
            let notifier = self.notifier.clone();
            let tracker = self.tracker.clone();
            let ctx = ctx.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire().await.unwrap();
                let mut result = execute_case(&registry, &case, &ctx).await;
                debug!(case = %case.name, status = %result.status, "Check finished");

                match storage::save_result(&pool, &result) {
                    Ok(row_id) => result.id = Some(row_id),
                    Err(e) => error!(
                        execution_id = %ctx.execution_id,
                        case = %case.name,
                        "Failed to persist result: {e}"
                    ),
                }
                tracker.append_result(&ctx.execution_id, &result).await;
                if result.is_failed() {
                    notifier.on_test_failed(&ctx.execution_id, &result).await;
                }
                result
            }));
        }

        let mut results = Vec::with_capacity(metas.len());
        for ((case_id, case_name, kind), outcome) in metas.into_iter().zip(join_all(handles).await)
        {
            match outcome {
                Ok(result) => results.push(result),
                Err(e) => {
                    // A crashed worker still yields a FAILED result so the
                    // run can complete with a full result set.
                    error!(execution_id = %ctx.execution_id, case = %case_name, "Worker crashed: {e}");
                    let mut result = TestResult {
                        id: None,
                        case_id,
                        case_name,
                        kind,
                        status: TestStatus::Failed,
                        message: format!("executor task failed: {e}"),
                        executed_at: Utc::now(),
                        execution_id: ctx.execution_id.clone(),
                        screenshot_path: None,
                        request_path: None,
                        response_path: None,
                    };
                    match storage::save_result(&self.pool, &result) {
                        Ok(row_id) => result.id = Some(row_id),
                        Err(e) => error!(
                            execution_id = %ctx.execution_id,
                            "Failed to persist synthesized result: {e}"
                        ),
                    }
                    self.tracker.append_result(&ctx.execution_id, &result).await;
                    self.notifier.on_test_failed(&ctx.execution_id, &result).await;
                    results.push(result);
                }
            }
        }
        Ok(results)
    }
}

/// Requested cap when positive, otherwise one worker per case up to the
/// default ceiling.
fn worker_cap(requested: Option<usize>, cases: usize) -> usize {
    requested
        .filter(|cap| *cap > 0)
        .unwrap_or_else(|| cases.min(DEFAULT_MAX_WORKERS))
        .max(1)
}

/// Dispatch one case to the executor registered for its kind and tag the
/// outcome with the run id.
async fn execute_case(
    registry: &ExecutorRegistry,
    case: &TestCase,
    ctx: &ExecContext,
) -> TestResult {
    let mut result = match registry.executor_for(case.kind) {
        Some(executor) => executor.execute(case, ctx).await,
        None => TestResult::skipped(
            case,
            format!("no executor registered for kind {}", case.kind),
        ),
    };
    result.execution_id = ctx.execution_id.clone();
    result
}
