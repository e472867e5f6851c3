//! Database schema and migrations.

use anyhow::Result;
use rusqlite::Connection;

/// Run all pending migrations.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS test_cases (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            kind TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'PENDING',
            check_json TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS test_results (
            id INTEGER PRIMARY KEY,
            case_id INTEGER NOT NULL,
            execution_id TEXT NOT NULL,
            status TEXT NOT NULL,
            message TEXT NOT NULL DEFAULT '',
            executed_at TEXT NOT NULL,
            screenshot_path TEXT,
            request_path TEXT,
            response_path TEXT,
            FOREIGN KEY (case_id) REFERENCES test_cases(id)
        );

        CREATE TABLE IF NOT EXISTS execution_records (
            id INTEGER PRIMARY KEY,
            execution_id TEXT NOT NULL UNIQUE,
            status TEXT NOT NULL,
            mode TEXT NOT NULL,
            case_ids_json TEXT NOT NULL DEFAULT '[]',
            start_time TEXT,
            end_time TEXT,
            total_tests INTEGER,
            passed_tests INTEGER,
            failed_tests INTEGER,
            error_message TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS alerts (
            id TEXT PRIMARY KEY,
            execution_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            summary TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_test_results_execution ON test_results(execution_id);
        CREATE INDEX IF NOT EXISTS idx_test_results_case ON test_results(case_id);
        CREATE INDEX IF NOT EXISTS idx_execution_records_status ON execution_records(status);
        CREATE INDEX IF NOT EXISTS idx_alerts_execution ON alerts(execution_id);",
    )?;

    Ok(())
}
