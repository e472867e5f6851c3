//! Recurring full-catalog trigger driven by a cron expression.

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use cron::Schedule;
use tracing::{error, info, warn};

use crate::engine::RunMode;
use crate::scheduler::{RunRequest, RunScheduler};
use crate::storage::{self, Pool};

/// Sleep until each cron fire time and submit the whole catalog as one
/// parallel run. Returns only when the expression cannot be used.
pub async fn run_loop(scheduler: Arc<RunScheduler>, pool: Pool, cron_expr: &str) {
    let schedule = match Schedule::from_str(cron_expr) {
        Ok(s) => s,
        Err(e) => {
            error!(cron_expr, "Invalid recurring cron expression: {e}");
            return;
        }
    };
    info!(cron_expr, "Recurring catalog run armed");

    loop {
        let Some(next) = schedule.upcoming(Utc).next() else {
            warn!(cron_expr, "Cron expression has no upcoming fire time");
            return;
        };
        let wait = (next - Utc::now()).to_std().unwrap_or_default();
        tokio::time::sleep(wait).await;

        let case_ids: Vec<i64> = match storage::list_cases(&pool) {
            Ok(cases) => cases.iter().map(|case| case.id).collect(),
            Err(e) => {
                error!("Failed to load catalog for recurring run: {e}");
                continue;
            }
        };

        let request = RunRequest {
            test_case_ids: case_ids,
            mode: RunMode::Parallel,
            ..Default::default()
        };
        match scheduler.submit(request).await {
            Ok(execution_id) => {
                info!(execution_id, "Recurring catalog run submitted");
            }
            Err(e) => error!("Failed to submit recurring run: {e}"),
        }
    }
}
