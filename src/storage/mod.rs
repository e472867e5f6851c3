//! SQLite storage layer -- schema, queries, migrations.

pub mod schema;

use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use r2d2::Pool as R2D2Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use crate::alert::AlertRecord;
use crate::catalog::{CheckSpec, NewTestCase, TestCase, TestKind, TestStatus};
use crate::engine::tracker::{ExecutionRecord, RunState};
use crate::engine::{RunMode, TestResult};

/// Connection Pool type
pub type Pool = R2D2Pool<SqliteConnectionManager>;

/// Open (or create) the SQLite database and return a connection pool.
pub fn open_pool(path: &str) -> Result<Pool> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory {}", parent.display()))?;
        }
    }

    let manager = SqliteConnectionManager::file(path).with_init(|c| {
        c.execute_batch(
            "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA temp_store = MEMORY;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;",
        )
    });

    let pool = R2D2Pool::new(manager)?;

    // Run migrations on a single connection
    let conn = pool.get()?;
    schema::migrate(&conn)?;

    Ok(pool)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("Invalid timestamp in database: {raw}"))?
        .with_timezone(&Utc))
}

fn parse_opt_ts(raw: Option<String>) -> Result<Option<DateTime<Utc>>> {
    raw.as_deref().map(parse_ts).transpose()
}

// ---- Catalog queries ----

fn case_from_row(row: &Row<'_>) -> rusqlite::Result<(i64, String, String, String, String, String)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn parse_case(raw: (i64, String, String, String, String, String)) -> Result<TestCase> {
    let (id, name, kind, description, status, check_json) = raw;
    Ok(TestCase {
        id,
        kind: TestKind::parse(&kind).ok_or_else(|| anyhow!("Unknown test kind: {kind}"))?,
        status: TestStatus::parse(&status).ok_or_else(|| anyhow!("Unknown test status: {status}"))?,
        check: serde_json::from_str::<CheckSpec>(&check_json)
            .with_context(|| format!("Invalid check definition for case '{name}'"))?,
        name,
        description,
    })
}

const CASE_COLUMNS: &str = "id, name, kind, description, status, check_json";

/// Insert a catalog entry, or return the existing one when the name is
/// already taken.
pub fn insert_case(pool: &Pool, def: &NewTestCase) -> Result<TestCase> {
    if let Some(existing) = find_case_by_name(pool, &def.name)? {
        return Ok(existing);
    }

    let conn = pool.get()?;
    let check_json = serde_json::to_string(&def.check)?;
    conn.execute(
        "INSERT INTO test_cases (name, kind, description, check_json)
         VALUES (?1, ?2, ?3, ?4)",
        params![def.name, def.kind.as_str(), def.description, check_json],
    )?;

    Ok(TestCase {
        id: conn.last_insert_rowid(),
        name: def.name.clone(),
        kind: def.kind,
        description: def.description.clone(),
        status: TestStatus::Pending,
        check: def.check.clone(),
    })
}

pub fn find_case(pool: &Pool, id: i64) -> Result<Option<TestCase>> {
    let conn = pool.get()?;
    let raw = conn
        .query_row(
            &format!("SELECT {CASE_COLUMNS} FROM test_cases WHERE id = ?1"),
            params![id],
            case_from_row,
        )
        .optional()?;
    raw.map(parse_case).transpose()
}

pub fn find_case_by_name(pool: &Pool, name: &str) -> Result<Option<TestCase>> {
    let conn = pool.get()?;
    let raw = conn
        .query_row(
            &format!("SELECT {CASE_COLUMNS} FROM test_cases WHERE name = ?1"),
            params![name],
            case_from_row,
        )
        .optional()?;
    raw.map(parse_case).transpose()
}

/// Resolve a list of catalog ids, preserving request order and duplicates.
/// Ids with no matching row are dropped.
pub fn find_cases_by_ids(pool: &Pool, ids: &[i64]) -> Result<Vec<TestCase>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut unique: Vec<i64> = ids.to_vec();
    unique.sort_unstable();
    unique.dedup();

    let conn = pool.get()?;
    let placeholders = vec!["?"; unique.len()].join(",");
    let sql = format!("SELECT {CASE_COLUMNS} FROM test_cases WHERE id IN ({placeholders})");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(unique.iter()), case_from_row)?;

    let mut by_id: HashMap<i64, TestCase> = HashMap::new();
    for row in rows {
        let case = parse_case(row?)?;
        by_id.insert(case.id, case);
    }

    Ok(ids.iter().filter_map(|id| by_id.get(id).cloned()).collect())
}

pub fn list_cases(pool: &Pool) -> Result<Vec<TestCase>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(&format!("SELECT {CASE_COLUMNS} FROM test_cases ORDER BY id"))?;
    let rows = stmt.query_map([], case_from_row)?;

    let mut cases = Vec::new();
    for row in rows {
        cases.push(parse_case(row?)?);
    }
    Ok(cases)
}

pub fn count_cases(pool: &Pool) -> Result<i64> {
    let conn = pool.get()?;
    let count = conn.query_row("SELECT COUNT(*) FROM test_cases", [], |row| row.get(0))?;
    Ok(count)
}

// ---- Result queries ----

/// Persist one check outcome, returning the assigned row id.
pub fn save_result(pool: &Pool, result: &TestResult) -> Result<i64> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO test_results
            (case_id, execution_id, status, message, executed_at,
             screenshot_path, request_path, response_path)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            result.case_id,
            result.execution_id,
            result.status.as_str(),
            result.message,
            result.executed_at.to_rfc3339(),
            result.screenshot_path,
            result.request_path,
            result.response_path,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Load every persisted result for one run, joined back to the catalog for
/// the case name and kind, in persistence order.
pub fn find_results_by_execution(pool: &Pool, execution_id: &str) -> Result<Vec<TestResult>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT r.id, r.case_id, c.name, c.kind, r.status, r.message, r.executed_at,
                r.execution_id, r.screenshot_path, r.request_path, r.response_path
         FROM test_results r
         JOIN test_cases c ON c.id = r.case_id
         WHERE r.execution_id = ?1
         ORDER BY r.id",
    )?;
    let rows = stmt.query_map(params![execution_id], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, String>(6)?,
            row.get::<_, String>(7)?,
            row.get::<_, Option<String>>(8)?,
            row.get::<_, Option<String>>(9)?,
            row.get::<_, Option<String>>(10)?,
        ))
    })?;

    let mut results = Vec::new();
    for row in rows {
        let (id, case_id, name, kind, status, message, executed_at, execution_id, screenshot, request, response) = row?;
        results.push(TestResult {
            id: Some(id),
            case_id,
            case_name: name,
            kind: TestKind::parse(&kind).ok_or_else(|| anyhow!("Unknown test kind: {kind}"))?,
            status: TestStatus::parse(&status).ok_or_else(|| anyhow!("Unknown test status: {status}"))?,
            message,
            executed_at: parse_ts(&executed_at)?,
            execution_id,
            screenshot_path: screenshot,
            request_path: request,
            response_path: response,
        });
    }
    Ok(results)
}

// ---- Execution record queries ----

/// Upsert the durable summary row for a run, keyed by execution id.
pub fn save_execution_record(pool: &Pool, record: &ExecutionRecord) -> Result<()> {
    let conn = pool.get()?;
    let case_ids_json = serde_json::to_string(&record.case_ids)?;
    conn.execute(
        "INSERT INTO execution_records
            (execution_id, status, mode, case_ids_json, start_time, end_time,
             total_tests, passed_tests, failed_tests, error_message)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT(execution_id) DO UPDATE SET
            status = excluded.status,
            start_time = excluded.start_time,
            end_time = excluded.end_time,
            total_tests = excluded.total_tests,
            passed_tests = excluded.passed_tests,
            failed_tests = excluded.failed_tests,
            error_message = excluded.error_message",
        params![
            record.execution_id,
            record.state.as_str(),
            record.mode.as_str(),
            case_ids_json,
            record.start_time.map(|t| t.to_rfc3339()),
            record.end_time.map(|t| t.to_rfc3339()),
            record.total_tests,
            record.passed_tests,
            record.failed_tests,
            record.error_message,
        ],
    )?;
    Ok(())
}

pub fn find_execution_record(pool: &Pool, execution_id: &str) -> Result<Option<ExecutionRecord>> {
    let conn = pool.get()?;
    let raw = conn
        .query_row(
            "SELECT execution_id, status, mode, case_ids_json, start_time, end_time,
                    total_tests, passed_tests, failed_tests, error_message
             FROM execution_records WHERE execution_id = ?1",
            params![execution_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<u32>>(6)?,
                    row.get::<_, Option<u32>>(7)?,
                    row.get::<_, Option<u32>>(8)?,
                    row.get::<_, Option<String>>(9)?,
                ))
            },
        )
        .optional()?;

    let Some((execution_id, status, mode, case_ids_json, start, end, total, passed, failed, error)) = raw
    else {
        return Ok(None);
    };

    Ok(Some(ExecutionRecord {
        state: RunState::parse(&status).ok_or_else(|| anyhow!("Unknown run state: {status}"))?,
        mode: RunMode::parse(&mode).ok_or_else(|| anyhow!("Unknown run mode: {mode}"))?,
        case_ids: serde_json::from_str(&case_ids_json)
            .with_context(|| format!("Invalid case id list for run {execution_id}"))?,
        execution_id,
        start_time: parse_opt_ts(start)?,
        end_time: parse_opt_ts(end)?,
        total_tests: total,
        passed_tests: passed,
        failed_tests: failed,
        error_message: error,
    }))
}

// ---- Alert queries ----

/// Record an alert delivery, returning its id.
pub fn save_alert(pool: &Pool, execution_id: &str, kind: &str, summary: &str) -> Result<Uuid> {
    let conn = pool.get()?;
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO alerts (id, execution_id, kind, summary, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id.to_string(), execution_id, kind, summary, Utc::now().to_rfc3339()],
    )?;
    Ok(id)
}

pub fn recent_alerts(pool: &Pool, limit: u32) -> Result<Vec<AlertRecord>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT id, execution_id, kind, summary, created_at
         FROM alerts ORDER BY created_at DESC, id DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
        ))
    })?;

    let mut alerts = Vec::new();
    for row in rows {
        let (id, execution_id, kind, summary, created_at) = row?;
        alerts.push(AlertRecord {
            id,
            execution_id,
            kind,
            summary,
            created_at: parse_ts(&created_at)?,
        });
    }
    Ok(alerts)
}
