//! Test-case catalog -- check definitions resolved against storage-assigned ids.

pub mod seed;

use serde::{Deserialize, Serialize};

/// Kind of check a catalog entry performs. Executors are registered per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestKind {
    Ui,
    Api,
}

impl TestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestKind::Ui => "UI",
            TestKind::Api => "API",
        }
    }

    pub fn parse(s: &str) -> Option<TestKind> {
        match s.to_uppercase().as_str() {
            "UI" => Some(TestKind::Ui),
            "API" => Some(TestKind::Api),
            _ => None,
        }
    }
}

impl std::fmt::Display for TestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a catalog entry or of a single check outcome.
///
/// Catalog entries sit at `Pending` until a run touches them; results only
/// ever carry `Passed`, `Failed`, or `Skipped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestStatus {
    Pending,
    Passed,
    Failed,
    Skipped,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Pending => "PENDING",
            TestStatus::Passed => "PASSED",
            TestStatus::Failed => "FAILED",
            TestStatus::Skipped => "SKIPPED",
        }
    }

    pub fn parse(s: &str) -> Option<TestStatus> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(TestStatus::Pending),
            "PASSED" => Some(TestStatus::Passed),
            "FAILED" => Some(TestStatus::Failed),
            "SKIPPED" => Some(TestStatus::Skipped),
            _ => None,
        }
    }
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured definition of what a check does.
///
/// Stored as JSON on the catalog row so executors never have to parse
/// behavior out of the case name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum CheckSpec {
    /// One HTTP request; passes when the response status matches.
    Http {
        method: String,
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<serde_json::Value>,
        expect_status: u16,
    },
    /// One page fetch; passes when the title and all markers are present.
    Page {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expect_title: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        expect_markers: Vec<String>,
    },
}

/// One catalog entry. Created at seed time or through the API, read-only
/// during execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub id: i64,
    pub name: String,
    pub kind: TestKind,
    pub description: String,
    pub status: TestStatus,
    pub check: CheckSpec,
}

/// Payload for creating a catalog entry; the id and lifecycle status are
/// assigned by storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTestCase {
    pub name: String,
    pub kind: TestKind,
    #[serde(default)]
    pub description: String,
    pub check: CheckSpec,
}
