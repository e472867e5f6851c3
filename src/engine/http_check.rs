//! API check executor -- one HTTP request with a status assertion.

use std::fs;

use reqwest::{Client, Method};
use serde_json::json;
use tracing::{debug, warn};

use crate::catalog::{CheckSpec, TestCase};
use crate::engine::executor::{ExecContext, TestExecutor};
use crate::engine::TestResult;

/// How much of a response body is kept in the artifact file.
const BODY_EXCERPT_CHARS: usize = 2048;

pub struct HttpCheckExecutor {
    client: Client,
}

impl HttpCheckExecutor {
    pub fn new() -> Self {
        HttpCheckExecutor {
            client: Client::new(),
        }
    }
}

impl Default for HttpCheckExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl TestExecutor for HttpCheckExecutor {
    async fn execute(&self, case: &TestCase, ctx: &ExecContext) -> TestResult {
        let CheckSpec::Http {
            method,
            url,
            body,
            expect_status,
        } = &case.check
        else {
            return TestResult::skipped(case, "check definition is not an HTTP request");
        };

        let method = match Method::from_bytes(method.as_bytes()) {
            Ok(m) => m,
            Err(_) => {
                return TestResult::failed(case, format!("unsupported HTTP method '{method}'"));
            }
        };

        debug!(case = %case.name, %method, url, "Sending API check request");

        let mut request = self
            .client
            .request(method.clone(), url)
            .timeout(ctx.options.api_timeout);
        if let Some(body) = body {
            request = request.json(body);
        }

        let (mut result, response_doc) = match request.send().await {
            Ok(response) => {
                let code = response.status().as_u16();
                let body_text = response.text().await.unwrap_or_default();
                let result = if code == *expect_status {
                    TestResult::passed(case, format!("{method} {url} returned {code}"))
                } else {
                    TestResult::failed(
                        case,
                        format!("{method} {url} returned {code}, expected {expect_status}"),
                    )
                };
                (result, json!({ "status": code, "body": excerpt(&body_text) }))
            }
            Err(e) => (
                TestResult::failed(case, format!("request failed: {e}")),
                json!({ "error": e.to_string() }),
            ),
        };

        let request_doc = json!({
            "test": case.name,
            "method": method.as_str(),
            "url": url,
            "body": body,
        });
        let (request_path, response_path) = write_artifacts(ctx, case, &request_doc, &response_doc);
        result.request_path = request_path;
        result.response_path = response_path;
        result
    }
}

fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_CHARS).collect()
}

/// Capture the request and response documents for one check. Artifact
/// problems never fail the check itself.
fn write_artifacts(
    ctx: &ExecContext,
    case: &TestCase,
    request: &serde_json::Value,
    response: &serde_json::Value,
) -> (Option<String>, Option<String>) {
    let dir = ctx.case_artifact_dir(case.id);
    if let Err(e) = fs::create_dir_all(&dir) {
        warn!(case = %case.name, dir = %dir.display(), "Failed to create artifact directory: {e}");
        return (None, None);
    }

    let request_path = write_json(case, &dir.join("request.json"), request);
    let response_path = write_json(case, &dir.join("response.json"), response);
    (request_path, response_path)
}

fn write_json(case: &TestCase, path: &std::path::Path, doc: &serde_json::Value) -> Option<String> {
    let rendered = match serde_json::to_string_pretty(doc) {
        Ok(s) => s,
        Err(e) => {
            warn!(case = %case.name, "Failed to render artifact: {e}");
            return None;
        }
    };
    match fs::write(path, rendered) {
        Ok(()) => Some(path.display().to_string()),
        Err(e) => {
            warn!(case = %case.name, path = %path.display(), "Failed to write artifact: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{TestKind, TestStatus};
    use crate::engine::executor::ExecOptions;

    fn page_case() -> TestCase {
        TestCase {
            id: 1,
            name: "NotAnApiCheck".to_string(),
            kind: TestKind::Api,
            description: String::new(),
            status: TestStatus::Pending,
            check: CheckSpec::Page {
                url: "https://example.com".to_string(),
                expect_title: None,
                expect_markers: Vec::new(),
            },
        }
    }

    #[tokio::test]
    async fn test_mismatched_spec_is_skipped() {
        let executor = HttpCheckExecutor::new();
        let dir = tempfile::tempdir().unwrap();
        let ctx = ExecContext {
            execution_id: "exec_t_0".to_string(),
            options: ExecOptions::default(),
            artifacts_dir: dir.path().to_path_buf(),
        };
        let result = executor.execute(&page_case(), &ctx).await;
        assert_eq!(result.status, TestStatus::Skipped);
    }

    #[test]
    fn test_excerpt_truncates() {
        let long = "x".repeat(BODY_EXCERPT_CHARS * 2);
        assert_eq!(excerpt(&long).len(), BODY_EXCERPT_CHARS);
        assert_eq!(excerpt("short"), "short");
    }
}
