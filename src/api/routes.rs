//! API route definitions.

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use super::state::AppState;
use crate::catalog::NewTestCase;
use crate::engine::SuiteRegistry;
use crate::scheduler::RunRequest;
use crate::storage;

type ApiError = (StatusCode, Json<Value>);

fn internal_error(e: anyhow::Error) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": e.to_string() })),
    )
}

fn not_found(what: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("{what} not found") })),
    )
}

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/catalog", get(list_catalog).post(create_case))
        .route("/catalog/{id}", get(get_case))
        .route("/suites", get(list_suites))
        .route("/suites/{suite_id}", get(resolve_suite))
        .route("/runs", post(submit_run).get(list_runs))
        .route("/runs/{execution_id}", get(run_status))
        .route("/runs/{execution_id}/record", get(run_record))
        .route("/alerts", get(list_alerts))
        .route("/reports/{execution_id}/html", get(report_html))
        .route("/reports/{execution_id}/csv", get(report_csv))
        .route("/reports/{execution_id}/log", get(report_log))
}

async fn health() -> Json<Value> {
    Json(json!({
        "data": {
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION")
        },
        "meta": {
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION")
        }
    }))
}

async fn list_catalog(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let cases = storage::list_cases(&state.pool).map_err(internal_error)?;
    let total = cases.len();
    Ok(Json(json!({ "data": cases, "meta": { "total": total } })))
}

async fn create_case(
    State(state): State<AppState>,
    Json(def): Json<NewTestCase>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let case = storage::insert_case(&state.pool, &def).map_err(internal_error)?;
    Ok((StatusCode::CREATED, Json(json!({ "data": case }))))
}

async fn get_case(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    match storage::find_case(&state.pool, id).map_err(internal_error)? {
        Some(case) => Ok(Json(json!({ "data": case }))),
        None => Err(not_found("test case")),
    }
}

async fn list_suites() -> Json<Value> {
    let suites = SuiteRegistry::known_suites();
    Json(json!({ "data": suites, "meta": { "total": suites.len() } }))
}

async fn resolve_suite(
    State(state): State<AppState>,
    Path(suite_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let ids = state.suites.resolve(&suite_id).map_err(internal_error)?;
    let total = ids.len();
    Ok(Json(json!({
        "data": { "suite_id": suite_id, "test_case_ids": ids },
        "meta": { "total": total }
    })))
}

async fn submit_run(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let execution_id = state
        .scheduler
        .submit(request)
        .await
        .map_err(internal_error)?;
    let status = state
        .tracker
        .get(&execution_id)
        .await
        .map(|s| s.record.state.to_string());
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "data": { "execution_id": execution_id, "status": status } })),
    ))
}

async fn list_runs(State(state): State<AppState>) -> Json<Value> {
    let runs = state.tracker.all().await;
    let total = runs.len();
    Json(json!({ "data": runs, "meta": { "total": total } }))
}

async fn run_status(
    State(state): State<AppState>,
    Path(execution_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    match state.tracker.get(&execution_id).await {
        Some(status) => Ok(Json(json!({ "data": status }))),
        None => Err(not_found("execution")),
    }
}

async fn run_record(
    State(state): State<AppState>,
    Path(execution_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    match storage::find_execution_record(&state.pool, &execution_id).map_err(internal_error)? {
        Some(record) => Ok(Json(json!({ "data": record }))),
        None => Err(not_found("execution record")),
    }
}

async fn list_alerts(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let alerts = storage::recent_alerts(&state.pool, 100).map_err(internal_error)?;
    let total = alerts.len();
    Ok(Json(json!({ "data": alerts, "meta": { "total": total } })))
}

async fn report_html(
    State(state): State<AppState>,
    Path(execution_id): Path<String>,
) -> Result<Html<String>, ApiError> {
    let report = state.reports.html(&execution_id).map_err(internal_error)?;
    Ok(Html(report.content))
}

async fn report_csv(
    State(state): State<AppState>,
    Path(execution_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state.reports.csv(&execution_id).map_err(internal_error)?;
    Ok(([(header::CONTENT_TYPE, "text/csv")], report.content))
}

async fn report_log(
    State(state): State<AppState>,
    Path(execution_id): Path<String>,
) -> Result<String, ApiError> {
    let report = state.reports.log(&execution_id).map_err(internal_error)?;
    Ok(report.content)
}
