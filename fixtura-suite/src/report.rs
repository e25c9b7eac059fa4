//! Suite run report
//!
//! Test results and the suite outcome are recorded separately from the
//! teardown status, so a failed release never turns passing tests into
//! failures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Result of one test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum TestStatus {
    Passed,
    /// The test returned an error
    Failed(String),
    /// The test panicked
    Panicked(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    #[serde(flatten)]
    pub status: TestStatus,
    pub duration_ms: u64,
}

impl TestResult {
    pub fn passed(&self) -> bool {
        self.status == TestStatus::Passed
    }
}

/// Overall suite outcome, independent of teardown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum SuiteOutcome {
    Passed,
    Failed,
    /// `prepare` failed; no test was executed
    Aborted(String),
}

/// How the release at the end of the run went
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "teardown", content = "error", rename_all = "snake_case")]
pub enum TeardownStatus {
    Released,
    AlreadyDisposed,
    Failed(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub run_id: Uuid,
    pub suite: String,
    pub resource: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: SuiteOutcome,
    pub results: Vec<TestResult>,
    pub teardown: TeardownStatus,
}

impl SuiteReport {
    /// All tests passed. Teardown status is deliberately not considered.
    pub fn is_success(&self) -> bool {
        self.outcome == SuiteOutcome::Passed
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.outcome, SuiteOutcome::Aborted(_))
    }

    pub fn has_teardown_warning(&self) -> bool {
        matches!(self.teardown, TeardownStatus::Failed(_))
    }

    pub fn failed_tests(&self) -> Vec<&TestResult> {
        self.results.iter().filter(|r| !r.passed()).collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// One-line summary for logs and CI output
    pub fn summary_line(&self) -> String {
        let mut line = match &self.outcome {
            SuiteOutcome::Aborted(reason) => {
                format!("suite '{}' ABORTED before any test ran: {}", self.suite, reason)
            }
            outcome => {
                let passed = self.results.iter().filter(|r| r.passed()).count();
                format!(
                    "suite '{}' {}: {}/{} tests passed",
                    self.suite,
                    if *outcome == SuiteOutcome::Passed { "PASSED" } else { "FAILED" },
                    passed,
                    self.results.len()
                )
            }
        };

        if let TeardownStatus::Failed(error) = &self.teardown {
            line.push_str(&format!(" (teardown warning: {})", error));
        }

        line
    }
}
