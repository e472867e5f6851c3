//! Alert delivery for failing checks and finished runs.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::config::AlertConfig;
use crate::engine::TestResult;
use crate::storage::{self, Pool};

/// A delivered alert, as kept in storage for later inspection.
#[derive(Debug, Clone, Serialize)]
pub struct AlertRecord {
    pub id: String,
    pub execution_id: String,
    pub kind: String,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

/// Consumer of run lifecycle notifications.
///
/// Delivery is fire-and-forget: implementations log their own problems and
/// never propagate them into the run that triggered them.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn on_test_failed(&self, execution_id: &str, result: &TestResult);
    async fn on_run_completed(&self, execution_id: &str, results: &[TestResult]);
}

/// Build the notifier selected by configuration. A webhook URL upgrades the
/// plain log notifier to one that also posts JSON payloads.
pub fn from_config(pool: &Pool, cfg: &AlertConfig) -> Arc<dyn Notifier> {
    match &cfg.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(pool.clone(), url.clone())),
        None => Arc::new(LogNotifier::new(pool.clone())),
    }
}

fn pass_rate(passed: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        passed as f64 * 100.0 / total as f64
    }
}

/// Logs alerts and records them in the alerts table.
pub struct LogNotifier {
    pool: Pool,
}

impl LogNotifier {
    pub fn new(pool: Pool) -> Self {
        LogNotifier { pool }
    }

    fn record(&self, execution_id: &str, kind: &str, summary: &str) {
        if let Err(e) = storage::save_alert(&self.pool, execution_id, kind, summary) {
            warn!(execution_id, kind, "Failed to record alert: {e}");
        }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn on_test_failed(&self, execution_id: &str, result: &TestResult) {
        warn!(
            execution_id,
            case = %result.case_name,
            "Check failed: {}",
            result.message
        );
        self.record(
            execution_id,
            "test_failed",
            &format!("{}: {}", result.case_name, result.message),
        );
    }

    async fn on_run_completed(&self, execution_id: &str, results: &[TestResult]) {
        let total = results.len();
        let passed = results.iter().filter(|r| r.is_passed()).count();
        let failed = results.iter().filter(|r| r.is_failed()).count();
        info!(
            execution_id,
            total,
            passed,
            failed,
            pass_rate = format!("{:.1}", pass_rate(passed, total)),
            "Run completed"
        );
        self.record(
            execution_id,
            "run_completed",
            &format!("{passed}/{total} passed, {failed} failed"),
        );
    }
}

/// Posts alert payloads to an HTTP endpoint on top of the log notifier.
pub struct WebhookNotifier {
    log: LogNotifier,
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(pool: Pool, url: String) -> Self {
        WebhookNotifier {
            log: LogNotifier::new(pool),
            client: Client::new(),
            url,
        }
    }

    async fn post(&self, payload: serde_json::Value) {
        match self.client.post(&self.url).json(&payload).send().await {
            Ok(response) if !response.status().is_success() => {
                warn!(url = %self.url, status = %response.status(), "Webhook rejected alert");
            }
            Ok(_) => {}
            Err(e) => warn!(url = %self.url, "Failed to deliver webhook: {e}"),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn on_test_failed(&self, execution_id: &str, result: &TestResult) {
        self.log.on_test_failed(execution_id, result).await;
        self.post(json!({
            "event": "test_failed",
            "execution_id": execution_id,
            "case": result.case_name,
            "message": result.message,
            "executed_at": result.executed_at.to_rfc3339(),
        }))
        .await;
    }

    async fn on_run_completed(&self, execution_id: &str, results: &[TestResult]) {
        self.log.on_run_completed(execution_id, results).await;
        let total = results.len();
        let passed = results.iter().filter(|r| r.is_passed()).count();
        let failed_cases: Vec<&str> = results
            .iter()
            .filter(|r| r.is_failed())
            .map(|r| r.case_name.as_str())
            .collect();
        self.post(json!({
            "event": "run_completed",
            "execution_id": execution_id,
            "total": total,
            "passed": passed,
            "failed": failed_cases.len(),
            "pass_rate": pass_rate(passed, total),
            "failed_cases": failed_cases,
        }))
        .await;
    }
}
