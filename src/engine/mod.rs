//! Execution engine -- runs catalog cases through registered executors and
//! tracks each run's lifecycle.

pub mod executor;
pub mod http_check;
pub mod orchestrator;
pub mod page_check;
pub mod suites;
pub mod tracker;

pub use executor::{ExecContext, ExecOptions, ExecutorRegistry, TestExecutor};
pub use orchestrator::{Engine, RunOptions};
pub use suites::SuiteRegistry;
pub use tracker::{ExecutionRecord, ExecutionStatus, RunState, StatusTracker};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{TestCase, TestKind, TestStatus};

/// Failure of run orchestration itself. Individual check failures never
/// surface here; they become FAILED results instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// How a run walks its case list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunMode {
    Sequential,
    #[default]
    Parallel,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Sequential => "SEQUENTIAL",
            RunMode::Parallel => "PARALLEL",
        }
    }

    /// Anything that is not explicitly sequential runs in parallel.
    pub fn parse(s: &str) -> Option<RunMode> {
        match s.to_uppercase().as_str() {
            "SEQUENTIAL" => Some(RunMode::Sequential),
            "PARALLEL" => Some(RunMode::Parallel),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of executing one catalog case within one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    /// Storage row id, set once the result has been persisted.
    pub id: Option<i64>,
    pub case_id: i64,
    pub case_name: String,
    pub kind: TestKind,
    pub status: TestStatus,
    pub message: String,
    pub executed_at: DateTime<Utc>,
    /// Run this result belongs to. Tagged by the orchestrator before the
    /// result is persisted or reported anywhere.
    pub execution_id: String,
    pub screenshot_path: Option<String>,
    pub request_path: Option<String>,
    pub response_path: Option<String>,
}

impl TestResult {
    fn with_status(case: &TestCase, status: TestStatus, message: impl Into<String>) -> Self {
        TestResult {
            id: None,
            case_id: case.id,
            case_name: case.name.clone(),
            kind: case.kind,
            status,
            message: message.into(),
            executed_at: Utc::now(),
            execution_id: String::new(),
            screenshot_path: None,
            request_path: None,
            response_path: None,
        }
    }

    pub fn passed(case: &TestCase, message: impl Into<String>) -> Self {
        Self::with_status(case, TestStatus::Passed, message)
    }

    pub fn failed(case: &TestCase, message: impl Into<String>) -> Self {
        Self::with_status(case, TestStatus::Failed, message)
    }

    pub fn skipped(case: &TestCase, message: impl Into<String>) -> Self {
        Self::with_status(case, TestStatus::Skipped, message)
    }

    pub fn is_passed(&self) -> bool {
        self.status == TestStatus::Passed
    }

    pub fn is_failed(&self) -> bool {
        self.status == TestStatus::Failed
    }
}
