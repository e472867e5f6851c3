//! Run scheduling -- immediate dispatch, deferred one-shot runs, and the
//! recurring full-catalog trigger.

pub mod recurring;

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{error, info};

use crate::alert::Notifier;
use crate::engine::{
    Engine, ExecOptions, ExecutionRecord, RunMode, RunOptions, StatusTracker, SuiteRegistry,
};
use crate::storage::Pool;

static RUN_SEQ: AtomicU64 = AtomicU64::new(0);

/// Unique run identifier: submission millis plus a process-wide sequence so
/// two runs submitted in the same millisecond never collide.
fn next_execution_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let seq = RUN_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("exec_{millis}_{seq}")
}

/// A request to run part of the catalog.
///
/// Explicit ids win over a suite id. With neither, the run executes nothing
/// and completes empty.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RunRequest {
    pub test_case_ids: Vec<i64>,
    pub suite_id: Option<String>,
    pub mode: RunMode,
    pub max_parallel_tests: Option<usize>,
    pub headless: Option<bool>,
    /// Defer the run until this instant. Past or missing means immediate.
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Accepts run requests, owns run identity and initial state, and hands the
/// actual execution to a background task.
pub struct RunScheduler {
    engine: Arc<Engine>,
    tracker: Arc<StatusTracker>,
    notifier: Arc<dyn Notifier>,
    suites: SuiteRegistry,
    exec_defaults: ExecOptions,
    artifacts_dir: PathBuf,
}

impl RunScheduler {
    pub fn new(
        pool: Pool,
        engine: Arc<Engine>,
        tracker: Arc<StatusTracker>,
        notifier: Arc<dyn Notifier>,
        exec_defaults: ExecOptions,
        artifacts_dir: PathBuf,
    ) -> Self {
        RunScheduler {
            engine,
            tracker,
            notifier,
            suites: SuiteRegistry::new(pool),
            exec_defaults,
            artifacts_dir,
        }
    }

    /// Submit a run and return its execution id without waiting for any
    /// checks to execute.
    ///
    /// An immediate run is already RUNNING when this returns; a deferred run
    /// is QUEUED and a background task moves it to RUNNING at its instant.
    pub async fn submit(&self, request: RunRequest) -> Result<String> {
        let execution_id = next_execution_id();

        let case_ids = if request.test_case_ids.is_empty() {
            match &request.suite_id {
                Some(suite_id) => self.suites.resolve(suite_id)?,
                None => Vec::new(),
            }
        } else {
            request.test_case_ids.clone()
        };

        let deferred = request.scheduled_at.filter(|at| *at > Utc::now());
        let record = match deferred {
            Some(at) => {
                info!(execution_id, scheduled_at = %at, cases = case_ids.len(), "Run queued");
                ExecutionRecord::queued(&execution_id, request.mode, case_ids.clone())
            }
            None => {
                info!(execution_id, cases = case_ids.len(), mode = %request.mode, "Run dispatched");
                ExecutionRecord::running(&execution_id, request.mode, case_ids.clone())
            }
        };
        self.tracker.insert(record).await?;

        let opts = RunOptions {
            execution_id: execution_id.clone(),
            max_parallel: request.max_parallel_tests,
            exec: ExecOptions {
                headless: request.headless.unwrap_or(self.exec_defaults.headless),
                ..self.exec_defaults.clone()
            },
            artifacts_dir: self.artifacts_dir.clone(),
        };

        let engine = self.engine.clone();
        let tracker = self.tracker.clone();
        let notifier = self.notifier.clone();
        let mode = request.mode;
        let run_id = execution_id.clone();

        tokio::spawn(async move {
            if let Some(at) = deferred {
                let wait = (at - Utc::now()).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;
                if let Err(e) = tracker.mark_running(&run_id).await {
                    error!(execution_id = %run_id, "Failed to persist RUNNING transition: {e}");
                }
            }

            match engine.run(&case_ids, mode, &opts).await {
                Ok(results) => {
                    if let Err(e) = tracker.complete(&run_id, results.clone()).await {
                        error!(execution_id = %run_id, "Failed to persist completion: {e}");
                    }
                    notifier.on_run_completed(&run_id, &results).await;
                }
                Err(e) => {
                    error!(execution_id = %run_id, "Run failed: {e}");
                    if let Err(e) = tracker.fail(&run_id, &e.to_string()).await {
                        error!(execution_id = %run_id, "Failed to persist failure: {e}");
                    }
                }
            }
        });

        Ok(execution_id)
    }
}
