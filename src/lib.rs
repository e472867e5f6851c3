//! checksuite -- scheduled regression checks for UI and API test suites.
//!
//! This crate provides the core library for the check catalog, run
//! orchestration, live status tracking, scheduling, alerting, and reporting.

pub mod alert;
pub mod api;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod report;
pub mod scheduler;
pub mod storage;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use crate::api::state::AppState;
use crate::config::Config;
use crate::engine::{Engine, ExecutorRegistry, StatusTracker, SuiteRegistry};
use crate::report::ReportGenerator;
use crate::scheduler::RunScheduler;

/// Start the checksuite daemon: API server, recurring trigger, run engine.
pub async fn serve(config: Config) -> Result<()> {
    // 1. Initialize storage and the standard catalog
    tracing::info!(db_path = %config.database.path, "Initializing database");
    let pool = storage::open_pool(&config.database.path)?;
    catalog::seed::seed(&pool)?;

    // 2. Wire the engine
    let registry = Arc::new(ExecutorRegistry::standard());
    let notifier = alert::from_config(&pool, &config.alerts);
    let tracker = Arc::new(StatusTracker::new(pool.clone()));
    let engine = Arc::new(Engine::new(
        pool.clone(),
        registry,
        notifier.clone(),
        tracker.clone(),
    ));
    let scheduler = Arc::new(RunScheduler::new(
        pool.clone(),
        engine,
        tracker.clone(),
        notifier,
        config.exec_options(),
        PathBuf::from(&config.artifacts.dir),
    ));

    // 3. Arm the recurring full-catalog run (background task)
    if config.scheduler.enabled {
        let recurring = scheduler.clone();
        let recurring_pool = pool.clone();
        let cron = config.scheduler.cron.clone();
        tokio::spawn(async move {
            scheduler::recurring::run_loop(recurring, recurring_pool, &cron).await;
        });
    }

    // 4. Start the API server
    let reports = Arc::new(ReportGenerator::new(
        pool.clone(),
        PathBuf::from(&config.reports.dir),
    ));
    let state = AppState {
        suites: SuiteRegistry::new(pool.clone()),
        pool,
        scheduler,
        tracker,
        reports,
    };

    let addr: std::net::SocketAddr = config.server.bind.parse()?;
    let app = api::router(state);

    tracing::info!(%addr, "checksuite listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
