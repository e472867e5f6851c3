//! Run lifecycle tracking -- an in-memory live view per run plus a durable
//! summary row that survives restarts.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::warn;

use crate::engine::{RunMode, TestResult};
use crate::storage::{self, Pool};

/// Lifecycle of one run. Transitions only move forward; COMPLETED and
/// FAILED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunState {
    Queued,
    Running,
    Completed,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Queued => "QUEUED",
            RunState::Running => "RUNNING",
            RunState::Completed => "COMPLETED",
            RunState::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<RunState> {
        match s.to_uppercase().as_str() {
            "QUEUED" => Some(RunState::Queued),
            "RUNNING" => Some(RunState::Running),
            "COMPLETED" => Some(RunState::Completed),
            "FAILED" => Some(RunState::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable summary of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub execution_id: String,
    #[serde(rename = "status")]
    pub state: RunState,
    pub mode: RunMode,
    pub case_ids: Vec<i64>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_tests: Option<u32>,
    pub passed_tests: Option<u32>,
    pub failed_tests: Option<u32>,
    pub error_message: Option<String>,
}

impl ExecutionRecord {
    fn new(execution_id: &str, state: RunState, mode: RunMode, case_ids: Vec<i64>) -> Self {
        ExecutionRecord {
            execution_id: execution_id.to_string(),
            state,
            mode,
            case_ids,
            start_time: None,
            end_time: None,
            total_tests: None,
            passed_tests: None,
            failed_tests: None,
            error_message: None,
        }
    }

    /// A deferred run waiting for its scheduled instant.
    pub fn queued(execution_id: &str, mode: RunMode, case_ids: Vec<i64>) -> Self {
        Self::new(execution_id, RunState::Queued, mode, case_ids)
    }

    /// A run dispatched immediately; the start time is now.
    pub fn running(execution_id: &str, mode: RunMode, case_ids: Vec<i64>) -> Self {
        let mut record = Self::new(execution_id, RunState::Running, mode, case_ids);
        record.start_time = Some(Utc::now());
        record
    }
}

/// Live view of one run: the summary fields plus every result produced so
/// far, in arrival order.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionStatus {
    #[serde(flatten)]
    pub record: ExecutionRecord,
    pub results: Vec<TestResult>,
}

/// Tracks every run the process has seen.
///
/// The live map is updated first so pollers observe each transition
/// immediately; the durable row follows. Entries are kept for the process
/// lifetime, matching how callers poll finished runs for their outcome.
pub struct StatusTracker {
    live: RwLock<HashMap<String, ExecutionStatus>>,
    pool: Pool,
}

impl StatusTracker {
    pub fn new(pool: Pool) -> Self {
        StatusTracker {
            live: RwLock::new(HashMap::new()),
            pool,
        }
    }

    /// Register a run in its initial state, live map first, then durably.
    pub async fn insert(&self, record: ExecutionRecord) -> Result<()> {
        {
            let mut live = self.live.write().await;
            live.insert(
                record.execution_id.clone(),
                ExecutionStatus {
                    record: record.clone(),
                    results: Vec::new(),
                },
            );
        }
        storage::save_execution_record(&self.pool, &record)
    }

    /// Move a queued run to RUNNING and stamp its start time.
    pub async fn mark_running(&self, execution_id: &str) -> Result<()> {
        let record = {
            let mut live = self.live.write().await;
            let Some(status) = live.get_mut(execution_id) else {
                warn!(execution_id, "Cannot mark unknown run as running");
                return Ok(());
            };
            if status.record.state.is_terminal() {
                warn!(execution_id, state = %status.record.state, "Ignoring transition out of terminal state");
                return Ok(());
            }
            status.record.state = RunState::Running;
            status.record.start_time = Some(Utc::now());
            status.record.clone()
        };
        storage::save_execution_record(&self.pool, &record)
    }

    /// Append one result to the run's live view. The durable result row is
    /// written separately by the orchestrator.
    pub async fn append_result(&self, execution_id: &str, result: &TestResult) {
        let mut live = self.live.write().await;
        match live.get_mut(execution_id) {
            Some(status) => status.results.push(result.clone()),
            None => warn!(execution_id, "Dropping result for unknown run"),
        }
    }

    /// Finish a run as COMPLETED, replacing the live result list with the
    /// final one and deriving the counters from it.
    pub async fn complete(&self, execution_id: &str, results: Vec<TestResult>) -> Result<()> {
        let total = results.len() as u32;
        let passed = results.iter().filter(|r| r.is_passed()).count() as u32;
        let failed = results.iter().filter(|r| r.is_failed()).count() as u32;

        let record = {
            let mut live = self.live.write().await;
            let Some(status) = live.get_mut(execution_id) else {
                warn!(execution_id, "Cannot complete unknown run");
                return Ok(());
            };
            if status.record.state.is_terminal() {
                warn!(execution_id, state = %status.record.state, "Ignoring transition out of terminal state");
                return Ok(());
            }
            status.record.state = RunState::Completed;
            status.record.end_time = Some(Utc::now());
            status.record.total_tests = Some(total);
            status.record.passed_tests = Some(passed);
            status.record.failed_tests = Some(failed);
            status.results = results;
            status.record.clone()
        };
        storage::save_execution_record(&self.pool, &record)
    }

    /// Finish a run as FAILED with the orchestration error that killed it.
    pub async fn fail(&self, execution_id: &str, error: &str) -> Result<()> {
        let record = {
            let mut live = self.live.write().await;
            let Some(status) = live.get_mut(execution_id) else {
                warn!(execution_id, "Cannot fail unknown run");
                return Ok(());
            };
            if status.record.state.is_terminal() {
                warn!(execution_id, state = %status.record.state, "Ignoring transition out of terminal state");
                return Ok(());
            }
            status.record.state = RunState::Failed;
            status.record.end_time = Some(Utc::now());
            status.record.error_message = Some(error.to_string());
            status.record.clone()
        };
        storage::save_execution_record(&self.pool, &record)
    }

    pub async fn get(&self, execution_id: &str) -> Option<ExecutionStatus> {
        self.live.read().await.get(execution_id).cloned()
    }

    pub async fn all(&self) -> HashMap<String, ExecutionStatus> {
        self.live.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CheckSpec, TestCase, TestKind, TestStatus};
    use crate::storage::open_pool;

    fn test_pool() -> (tempfile::TempDir, Pool) {
        let dir = tempfile::tempdir().unwrap();
        let pool = open_pool(dir.path().join("t.db").to_str().unwrap()).unwrap();
        (dir, pool)
    }

    fn result_for(id: i64, status: TestStatus) -> TestResult {
        let case = TestCase {
            id,
            name: format!("case-{id}"),
            kind: TestKind::Api,
            description: String::new(),
            status: TestStatus::Pending,
            check: CheckSpec::Http {
                method: "GET".to_string(),
                url: "https://example.com".to_string(),
                body: None,
                expect_status: 200,
            },
        };
        match status {
            TestStatus::Passed => TestResult::passed(&case, "ok"),
            TestStatus::Failed => TestResult::failed(&case, "boom"),
            _ => TestResult::skipped(&case, "skip"),
        }
    }

    #[tokio::test]
    async fn test_queued_to_running_to_completed() {
        let (_dir, pool) = test_pool();
        let tracker = StatusTracker::new(pool.clone());

        tracker
            .insert(ExecutionRecord::queued("exec_a", RunMode::Sequential, vec![1]))
            .await
            .unwrap();
        assert_eq!(tracker.get("exec_a").await.unwrap().record.state, RunState::Queued);

        tracker.mark_running("exec_a").await.unwrap();
        let live = tracker.get("exec_a").await.unwrap();
        assert_eq!(live.record.state, RunState::Running);
        assert!(live.record.start_time.is_some());

        tracker
            .complete("exec_a", vec![result_for(1, TestStatus::Passed)])
            .await
            .unwrap();
        let live = tracker.get("exec_a").await.unwrap();
        assert_eq!(live.record.state, RunState::Completed);
        assert_eq!(live.record.total_tests, Some(1));
        assert_eq!(live.record.passed_tests, Some(1));
        assert_eq!(live.record.failed_tests, Some(0));
        assert!(live.record.end_time.is_some());

        // Durable row mirrors the terminal state.
        let record = storage::find_execution_record(&pool, "exec_a").unwrap().unwrap();
        assert_eq!(record.state, RunState::Completed);
    }

    #[tokio::test]
    async fn test_terminal_states_are_sticky() {
        let (_dir, pool) = test_pool();
        let tracker = StatusTracker::new(pool);

        tracker
            .insert(ExecutionRecord::running("exec_b", RunMode::Sequential, vec![]))
            .await
            .unwrap();
        tracker.fail("exec_b", "storage exploded").await.unwrap();

        tracker.mark_running("exec_b").await.unwrap();
        tracker.complete("exec_b", Vec::new()).await.unwrap();

        let live = tracker.get("exec_b").await.unwrap();
        assert_eq!(live.record.state, RunState::Failed);
        assert_eq!(live.record.error_message.as_deref(), Some("storage exploded"));
    }

    #[tokio::test]
    async fn test_counts_cover_skipped() {
        let (_dir, pool) = test_pool();
        let tracker = StatusTracker::new(pool);

        tracker
            .insert(ExecutionRecord::running("exec_c", RunMode::Parallel, vec![1, 2, 3]))
            .await
            .unwrap();
        let results = vec![
            result_for(1, TestStatus::Passed),
            result_for(2, TestStatus::Failed),
            result_for(3, TestStatus::Skipped),
        ];
        let skipped = results
            .iter()
            .filter(|r| r.status == TestStatus::Skipped)
            .count() as u32;
        tracker.complete("exec_c", results).await.unwrap();

        let record = tracker.get("exec_c").await.unwrap().record;
        assert_eq!(record.total_tests, Some(3));
        assert_eq!(
            record.total_tests,
            Some(record.passed_tests.unwrap() + record.failed_tests.unwrap() + skipped)
        );
    }

    #[tokio::test]
    async fn test_durable_record_survives_tracker_recreation() {
        let (_dir, pool) = test_pool();

        let tracker = StatusTracker::new(pool.clone());
        tracker
            .insert(ExecutionRecord::running("exec_e", RunMode::Sequential, vec![1]))
            .await
            .unwrap();
        tracker
            .complete("exec_e", vec![result_for(1, TestStatus::Passed)])
            .await
            .unwrap();
        drop(tracker);

        // A fresh tracker has no live entry, but the record is still there.
        let tracker = StatusTracker::new(pool.clone());
        assert!(tracker.get("exec_e").await.is_none());
        let record = storage::find_execution_record(&pool, "exec_e").unwrap().unwrap();
        assert_eq!(record.state, RunState::Completed);
        assert_eq!(record.total_tests, Some(1));
    }

    #[tokio::test]
    async fn test_append_result_feeds_live_view() {
        let (_dir, pool) = test_pool();
        let tracker = StatusTracker::new(pool);

        tracker
            .insert(ExecutionRecord::running("exec_d", RunMode::Sequential, vec![1, 2]))
            .await
            .unwrap();
        tracker
            .append_result("exec_d", &result_for(1, TestStatus::Passed))
            .await;

        let live = tracker.get("exec_d").await.unwrap();
        assert_eq!(live.results.len(), 1);
        assert_eq!(live.record.state, RunState::Running);
    }
}
