//! UI page check executor -- fetches a page and asserts on its title and
//! content markers.

use std::fs;

use reqwest::Client;
use tracing::{debug, warn};

use crate::catalog::{CheckSpec, TestCase};
use crate::engine::executor::{ExecContext, TestExecutor};
use crate::engine::TestResult;

pub struct PageCheckExecutor {
    client: Client,
}

impl PageCheckExecutor {
    pub fn new() -> Self {
        PageCheckExecutor {
            client: Client::new(),
        }
    }
}

impl Default for PageCheckExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl TestExecutor for PageCheckExecutor {
    async fn execute(&self, case: &TestCase, ctx: &ExecContext) -> TestResult {
        let CheckSpec::Page {
            url,
            expect_title,
            expect_markers,
        } = &case.check
        else {
            return TestResult::skipped(case, "check definition is not a page check");
        };

        debug!(case = %case.name, url, "Loading page");

        let response = match self
            .client
            .get(url)
            .timeout(ctx.options.page_timeout)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return TestResult::failed(case, format!("page fetch failed: {e}")),
        };

        let code = response.status();
        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => return TestResult::failed(case, format!("failed to read page body: {e}")),
        };

        let mut problems = Vec::new();
        if !code.is_success() {
            problems.push(format!("page returned status {code}"));
        }

        let title = extract_title(&body).unwrap_or_default();
        if let Some(want) = expect_title {
            if !title.contains(want) {
                problems.push(format!("title '{title}' does not contain '{want}'"));
            }
        }
        for marker in expect_markers {
            if !body.contains(marker) {
                problems.push(format!("marker '{marker}' not found"));
            }
        }

        if problems.is_empty() {
            TestResult::passed(case, format!("page loaded, title '{title}'"))
        } else {
            let mut result = TestResult::failed(case, problems.join("; "));
            result.screenshot_path = capture_page(ctx, case, &body);
            result
        }
    }
}

/// First `<title>` element of the document, if any.
fn extract_title(html: &str) -> Option<String> {
    // ASCII lowercasing keeps byte offsets valid against the original text.
    let lower = html.to_ascii_lowercase();
    let tag = lower.find("<title")?;
    let open = tag + lower[tag..].find('>')? + 1;
    let close = open + lower[open..].find("</title")?;
    Some(html[open..close].trim().to_string())
}

/// Snapshot the fetched page next to the run's other artifacts so failures
/// can be inspected later.
fn capture_page(ctx: &ExecContext, case: &TestCase, body: &str) -> Option<String> {
    let dir = ctx.case_artifact_dir(case.id);
    if let Err(e) = fs::create_dir_all(&dir) {
        warn!(case = %case.name, dir = %dir.display(), "Failed to create artifact directory: {e}");
        return None;
    }
    let path = dir.join("page.html");
    match fs::write(&path, body) {
        Ok(()) => Some(path.display().to_string()),
        Err(e) => {
            warn!(case = %case.name, path = %path.display(), "Failed to capture page: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_title() {
        assert_eq!(
            extract_title("<html><head><title>BlazeDemo</title></head></html>"),
            Some("BlazeDemo".to_string())
        );
        assert_eq!(
            extract_title("<TITLE lang=\"en\"> padded </TITLE>"),
            Some("padded".to_string())
        );
        assert_eq!(extract_title("<html><body>no title</body></html>"), None);
    }

    #[test]
    fn test_extract_title_unclosed() {
        assert_eq!(extract_title("<title>dangling"), None);
    }
}
