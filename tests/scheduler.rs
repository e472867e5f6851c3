//! Run submission tests: immediate dispatch, deferred runs, suite resolution.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use checksuite::alert::{LogNotifier, Notifier};
use checksuite::catalog::{seed, TestCase, TestKind, TestStatus};
use checksuite::engine::{
    Engine, ExecContext, ExecOptions, ExecutorRegistry, RunMode, RunState, StatusTracker,
    TestExecutor, TestResult,
};
use checksuite::scheduler::{RunRequest, RunScheduler};
use checksuite::storage::{self, Pool};

/// Always passes after a fixed delay, without touching the network.
struct StaticExecutor {
    delay: Duration,
}

#[async_trait]
impl TestExecutor for StaticExecutor {
    async fn execute(&self, case: &TestCase, _ctx: &ExecContext) -> TestResult {
        tokio::time::sleep(self.delay).await;
        TestResult::passed(case, "static pass")
    }
}

fn test_pool() -> (tempfile::TempDir, Pool) {
    let dir = tempfile::tempdir().unwrap();
    let pool = storage::open_pool(dir.path().join("t.db").to_str().unwrap()).unwrap();
    (dir, pool)
}

fn build_scheduler(
    dir: &tempfile::TempDir,
    pool: &Pool,
    delay: Duration,
) -> (Arc<RunScheduler>, Arc<StatusTracker>) {
    let executor: Arc<dyn TestExecutor> = Arc::new(StaticExecutor { delay });
    let mut registry = ExecutorRegistry::new();
    registry.register(TestKind::Ui, executor.clone());
    registry.register(TestKind::Api, executor);

    let tracker = Arc::new(StatusTracker::new(pool.clone()));
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier::new(pool.clone()));
    let engine = Arc::new(Engine::new(
        pool.clone(),
        Arc::new(registry),
        notifier.clone(),
        tracker.clone(),
    ));
    let scheduler = Arc::new(RunScheduler::new(
        pool.clone(),
        engine,
        tracker.clone(),
        notifier,
        ExecOptions::default(),
        dir.path().join("artifacts"),
    ));
    (scheduler, tracker)
}

async fn wait_terminal(
    tracker: &StatusTracker,
    execution_id: &str,
) -> checksuite::engine::ExecutionStatus {
    for _ in 0..250 {
        if let Some(status) = tracker.get(execution_id).await {
            if status.record.state.is_terminal() {
                return status;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("run {execution_id} never reached a terminal state");
}

#[tokio::test]
async fn test_immediate_run_is_running_before_submit_returns() {
    let (dir, pool) = test_pool();
    seed::seed(&pool).unwrap();
    let cases = storage::list_cases(&pool).unwrap();
    let ids: Vec<i64> = cases.iter().take(2).map(|c| c.id).collect();

    let (scheduler, tracker) = build_scheduler(&dir, &pool, Duration::from_millis(200));
    let execution_id = scheduler
        .submit(RunRequest {
            test_case_ids: ids,
            mode: RunMode::Sequential,
            ..Default::default()
        })
        .await
        .unwrap();

    // The run is visible and RUNNING the moment submit returns.
    let status = tracker.get(&execution_id).await.unwrap();
    assert_eq!(status.record.state, RunState::Running);
    assert!(status.record.start_time.is_some());

    let finished = wait_terminal(&tracker, &execution_id).await;
    assert_eq!(finished.record.state, RunState::Completed);
    assert_eq!(finished.record.total_tests, Some(2));
    assert_eq!(finished.record.passed_tests, Some(2));
    assert_eq!(finished.results.len(), 2);
}

#[tokio::test]
async fn test_deferred_run_waits_for_its_instant() {
    let (dir, pool) = test_pool();
    seed::seed(&pool).unwrap();
    let case = storage::list_cases(&pool).unwrap().remove(0);

    let (scheduler, tracker) = build_scheduler(&dir, &pool, Duration::ZERO);
    let execution_id = scheduler
        .submit(RunRequest {
            test_case_ids: vec![case.id],
            mode: RunMode::Sequential,
            scheduled_at: Some(Utc::now() + chrono::Duration::milliseconds(500)),
            ..Default::default()
        })
        .await
        .unwrap();

    let status = tracker.get(&execution_id).await.unwrap();
    assert_eq!(status.record.state, RunState::Queued);
    assert!(status.record.start_time.is_none());

    // Well before the scheduled instant the run is still queued.
    tokio::time::sleep(Duration::from_millis(150)).await;
    let status = tracker.get(&execution_id).await.unwrap();
    assert_eq!(status.record.state, RunState::Queued);

    let finished = wait_terminal(&tracker, &execution_id).await;
    assert_eq!(finished.record.state, RunState::Completed);
    assert!(finished.record.start_time.is_some());
    assert_eq!(finished.record.total_tests, Some(1));

    // The durable row carries the same terminal state.
    let record = storage::find_execution_record(&pool, &execution_id)
        .unwrap()
        .unwrap();
    assert_eq!(record.state, RunState::Completed);
}

#[tokio::test]
async fn test_past_schedule_runs_immediately() {
    let (dir, pool) = test_pool();
    seed::seed(&pool).unwrap();
    let case = storage::list_cases(&pool).unwrap().remove(0);

    let (scheduler, tracker) = build_scheduler(&dir, &pool, Duration::from_millis(100));
    let execution_id = scheduler
        .submit(RunRequest {
            test_case_ids: vec![case.id],
            scheduled_at: Some(Utc::now() - chrono::Duration::minutes(5)),
            ..Default::default()
        })
        .await
        .unwrap();

    let status = tracker.get(&execution_id).await.unwrap();
    assert_eq!(status.record.state, RunState::Running);

    let finished = wait_terminal(&tracker, &execution_id).await;
    assert_eq!(finished.record.state, RunState::Completed);
}

#[tokio::test]
async fn test_suite_id_resolves_to_its_cases() {
    let (dir, pool) = test_pool();
    seed::seed(&pool).unwrap();

    let (scheduler, tracker) = build_scheduler(&dir, &pool, Duration::ZERO);
    let execution_id = scheduler
        .submit(RunRequest {
            suite_id: Some("blaze_smoke".to_string()),
            mode: RunMode::Parallel,
            max_parallel_tests: Some(4),
            ..Default::default()
        })
        .await
        .unwrap();

    let finished = wait_terminal(&tracker, &execution_id).await;
    assert_eq!(finished.record.state, RunState::Completed);
    assert_eq!(finished.record.total_tests, Some(10));
    assert!(finished.results.iter().all(|r| r.kind == TestKind::Ui));
    assert!(finished
        .results
        .iter()
        .all(|r| r.status == TestStatus::Passed));
}

#[tokio::test]
async fn test_explicit_ids_win_over_suite_id() {
    let (dir, pool) = test_pool();
    seed::seed(&pool).unwrap();
    let case = storage::find_case_by_name(&pool, "ReqRes_CreateUser")
        .unwrap()
        .unwrap();

    let (scheduler, tracker) = build_scheduler(&dir, &pool, Duration::ZERO);
    let execution_id = scheduler
        .submit(RunRequest {
            test_case_ids: vec![case.id],
            suite_id: Some("blaze_smoke".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    let finished = wait_terminal(&tracker, &execution_id).await;
    assert_eq!(finished.record.total_tests, Some(1));
    assert_eq!(finished.results[0].case_name, "ReqRes_CreateUser");
}

#[tokio::test]
async fn test_unknown_suite_completes_empty() {
    let (dir, pool) = test_pool();
    let (scheduler, tracker) = build_scheduler(&dir, &pool, Duration::ZERO);

    let execution_id = scheduler
        .submit(RunRequest {
            suite_id: Some("nonexistent".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    let finished = wait_terminal(&tracker, &execution_id).await;
    assert_eq!(finished.record.state, RunState::Completed);
    assert_eq!(finished.record.total_tests, Some(0));
    assert!(finished.results.is_empty());
}
