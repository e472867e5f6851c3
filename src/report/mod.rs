//! Run reports -- HTML, CSV, and plain-text digests rendered from persisted
//! results.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use askama::Template;
use chrono::Utc;
use tracing::info;

use crate::catalog::TestStatus;
use crate::engine::TestResult;
use crate::storage::{self, Pool};

/// One generated report: where it was written and what it contains.
pub struct Report {
    pub path: PathBuf,
    pub content: String,
}

struct ReportRow {
    case_id: i64,
    name: String,
    kind: String,
    status: String,
    executed_at: String,
    message: String,
}

impl ReportRow {
    fn from_result(result: &TestResult) -> Self {
        ReportRow {
            case_id: result.case_id,
            name: result.case_name.clone(),
            kind: result.kind.to_string(),
            status: result.status.to_string(),
            executed_at: result.executed_at.to_rfc3339(),
            message: result.message.clone(),
        }
    }
}

#[derive(Template)]
#[template(path = "report.html")]
struct ReportTemplate<'a> {
    execution_id: &'a str,
    generated_at: String,
    total: usize,
    passed: usize,
    failed: usize,
    skipped: usize,
    pass_rate: String,
    rows: &'a [ReportRow],
}

/// Renders reports for finished runs into the report directory.
pub struct ReportGenerator {
    pool: Pool,
    dir: PathBuf,
}

impl ReportGenerator {
    pub fn new(pool: Pool, dir: PathBuf) -> Self {
        ReportGenerator { pool, dir }
    }

    fn rows(&self, execution_id: &str) -> Result<Vec<ReportRow>> {
        let results = storage::find_results_by_execution(&self.pool, execution_id)?;
        Ok(results.iter().map(ReportRow::from_result).collect())
    }

    fn counts(results: &[ReportRow]) -> (usize, usize, usize) {
        let passed = results
            .iter()
            .filter(|r| r.status == TestStatus::Passed.as_str())
            .count();
        let failed = results
            .iter()
            .filter(|r| r.status == TestStatus::Failed.as_str())
            .count();
        let skipped = results
            .iter()
            .filter(|r| r.status == TestStatus::Skipped.as_str())
            .count();
        (passed, failed, skipped)
    }

    fn write(&self, file_name: &str, content: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create report directory {}", self.dir.display()))?;
        let path = self.dir.join(file_name);
        fs::write(&path, content)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        info!(path = %path.display(), "Report written");
        Ok(path)
    }

    /// Render the HTML report for one run.
    pub fn html(&self, execution_id: &str) -> Result<Report> {
        let rows = self.rows(execution_id)?;
        let (passed, failed, skipped) = Self::counts(&rows);
        let total = rows.len();
        let rate = if total == 0 {
            0.0
        } else {
            passed as f64 * 100.0 / total as f64
        };

        let template = ReportTemplate {
            execution_id,
            generated_at: Utc::now().to_rfc3339(),
            total,
            passed,
            failed,
            skipped,
            pass_rate: format!("{rate:.1}"),
            rows: &rows,
        };
        let content = template.render().context("Failed to render HTML report")?;
        let path = self.write(
            &format!("test_report_{execution_id}_{}.html", timestamp()),
            &content,
        )?;
        Ok(Report { path, content })
    }

    /// Render the CSV export for one run.
    pub fn csv(&self, execution_id: &str) -> Result<Report> {
        let rows = self.rows(execution_id)?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record([
            "Test Case ID",
            "Test Case Name",
            "Type",
            "Status",
            "Executed At",
            "Message",
        ])?;
        for row in &rows {
            writer.write_record(&[
                row.case_id.to_string(),
                row.name.clone(),
                row.kind.clone(),
                row.status.clone(),
                row.executed_at.clone(),
                row.message.clone(),
            ])?;
        }
        let content = String::from_utf8(writer.into_inner()?)?;
        let path = self.write(
            &format!("test_report_{execution_id}_{}.csv", timestamp()),
            &content,
        )?;
        Ok(Report { path, content })
    }

    /// Render the plain-text digest for one run.
    pub fn log(&self, execution_id: &str) -> Result<Report> {
        let rows = self.rows(execution_id)?;
        let (passed, failed, skipped) = Self::counts(&rows);

        let mut content = format!("=== Execution log for {execution_id} ===\n");
        for row in &rows {
            content.push_str(&format!(
                "[{}] {} {} ({}): {}\n",
                row.executed_at, row.status, row.name, row.kind, row.message
            ));
        }
        content.push_str(&format!(
            "Total: {}, Passed: {passed}, Failed: {failed}, Skipped: {skipped}\n",
            rows.len()
        ));

        let path = self.write(
            &format!("test_logs_{execution_id}_{}.txt", timestamp()),
            &content,
        )?;
        Ok(Report { path, content })
    }
}

fn timestamp() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CheckSpec, NewTestCase, TestCase, TestKind};
    use crate::storage::open_pool;

    fn seeded_run(pool: &Pool, execution_id: &str) -> TestCase {
        let case = storage::insert_case(
            pool,
            &NewTestCase {
                name: "Ping".to_string(),
                kind: TestKind::Api,
                description: String::new(),
                check: CheckSpec::Http {
                    method: "GET".to_string(),
                    url: "https://example.com".to_string(),
                    body: None,
                    expect_status: 200,
                },
            },
        )
        .unwrap();

        let mut passed = TestResult::passed(&case, "GET returned 200");
        passed.execution_id = execution_id.to_string();
        storage::save_result(pool, &passed).unwrap();

        let mut failed = TestResult::failed(&case, "expected 200 got 503");
        failed.execution_id = execution_id.to_string();
        storage::save_result(pool, &failed).unwrap();

        case
    }

    fn generator() -> (tempfile::TempDir, ReportGenerator, Pool) {
        let dir = tempfile::tempdir().unwrap();
        let pool = open_pool(dir.path().join("t.db").to_str().unwrap()).unwrap();
        let generator = ReportGenerator::new(pool.clone(), dir.path().join("reports"));
        (dir, generator, pool)
    }

    #[test]
    fn test_html_report_contains_counts_and_rows() {
        let (_dir, generator, pool) = generator();
        seeded_run(&pool, "exec_r_0");

        let report = generator.html("exec_r_0").unwrap();
        assert!(report.path.exists());
        assert!(report.content.contains("exec_r_0"));
        assert!(report.content.contains("Ping"));
        assert!(report.content.contains("expected 200 got 503"));
        assert!(report.content.contains("50.0"));
    }

    #[test]
    fn test_csv_report_has_header_and_one_line_per_result() {
        let (_dir, generator, pool) = generator();
        seeded_run(&pool, "exec_r_1");

        let report = generator.csv("exec_r_1").unwrap();
        let lines: Vec<_> = report.content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "Test Case ID,Test Case Name,Type,Status,Executed At,Message"
        );
        assert!(lines[1].contains("PASSED"));
        assert!(lines[2].contains("FAILED"));
    }

    #[test]
    fn test_log_digest_for_empty_run() {
        let (_dir, generator, _pool) = generator();
        let report = generator.log("exec_none").unwrap();
        assert!(report.content.contains("Total: 0"));
    }
}
