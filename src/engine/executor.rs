//! Executor capability -- the seam between run orchestration and the code
//! that actually performs a check.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::catalog::{TestCase, TestKind};
use crate::engine::http_check::HttpCheckExecutor;
use crate::engine::page_check::PageCheckExecutor;
use crate::engine::TestResult;

/// Knobs forwarded to executors without the orchestrator interpreting them.
#[derive(Debug, Clone)]
pub struct ExecOptions {
    pub headless: bool,
    pub page_timeout: Duration,
    pub api_timeout: Duration,
}

impl Default for ExecOptions {
    fn default() -> Self {
        ExecOptions {
            headless: true,
            page_timeout: Duration::from_secs(90),
            api_timeout: Duration::from_secs(15),
        }
    }
}

/// Per-run context handed to every executor invocation.
#[derive(Debug, Clone)]
pub struct ExecContext {
    pub execution_id: String,
    pub options: ExecOptions,
    pub artifacts_dir: PathBuf,
}

impl ExecContext {
    /// Directory for artifacts captured while executing one case, namespaced
    /// by run so repeated runs never clobber each other.
    pub fn case_artifact_dir(&self, case_id: i64) -> PathBuf {
        self.artifacts_dir
            .join(&self.execution_id)
            .join(case_id.to_string())
    }
}

/// Executes one kind of check.
///
/// The contract is total: implementations report every internal failure as a
/// FAILED result rather than returning an error or panicking, so one broken
/// check can never take down the run around it.
#[async_trait]
pub trait TestExecutor: Send + Sync {
    async fn execute(&self, case: &TestCase, ctx: &ExecContext) -> TestResult;
}

/// Maps a case kind to the executor that can run it.
pub struct ExecutorRegistry {
    executors: HashMap<TestKind, Arc<dyn TestExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        ExecutorRegistry {
            executors: HashMap::new(),
        }
    }

    /// The built-in wiring: page checks for UI cases, request checks for API
    /// cases.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(TestKind::Ui, Arc::new(PageCheckExecutor::new()));
        registry.register(TestKind::Api, Arc::new(HttpCheckExecutor::new()));
        registry
    }

    pub fn register(&mut self, kind: TestKind, executor: Arc<dyn TestExecutor>) {
        self.executors.insert(kind, executor);
    }

    pub fn executor_for(&self, kind: TestKind) -> Option<Arc<dyn TestExecutor>> {
        self.executors.get(&kind).cloned()
    }
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
