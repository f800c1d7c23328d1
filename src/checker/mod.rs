//! Client side of the third-party accessibility checker.
//!
//! The checker speaks a two-phase protocol: submit the file once, then poll
//! until the run completes. [`AccessibilityChecker`] is the seam the
//! orchestrators depend on; [`http::HttpChecker`] is the production client.
//!
//! ```text
//! submit_for_check ──▶ source id ──▶ poll_status ─┬─▶ queued / in-progress (poll again)
//!                                                 ├─▶ completed + RawReport
//!                                                 └─▶ failed
//! ```

pub mod http;
pub mod payload;

use crate::error::ServiceError;
use async_trait::async_trait;
use payload::RawReport;
use serde::Serialize;

pub use http::HttpChecker;

/// Status vocabulary of a checker run, as seen by this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    /// The response carried no status at all.
    Unknown,
}

impl CheckStatus {
    /// Map the service's status string onto our vocabulary.
    ///
    /// Unrecognised words map to [`CheckStatus::InProgress`] so that callers
    /// keep polling instead of failing when the service adds new states.
    pub fn from_service(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return CheckStatus::Unknown;
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "queued" | "pending" | "waiting" | "submitted" => CheckStatus::Queued,
            "completed" | "complete" | "done" | "finished" | "success" | "succeeded" => {
                CheckStatus::Completed
            }
            "failed" | "failure" | "error" | "errored" => CheckStatus::Failed,
            _ => CheckStatus::InProgress,
        }
    }
}

/// Result of one status poll.
#[derive(Debug, Clone)]
pub struct PollOutcome {
    pub status: CheckStatus,
    pub report_url: Option<String>,
    /// Present once the run has produced findings.
    pub report: Option<RawReport>,
}

#[async_trait]
pub trait AccessibilityChecker: Send + Sync {
    /// Upload a PDF and start a run. Returns the service's handle for it.
    async fn submit_for_check(&self, file: Vec<u8>, file_name: &str)
        -> Result<String, ServiceError>;

    /// Fetch the current state of a run.
    async fn poll_status(&self, source_id: &str) -> Result<PollOutcome, ServiceError>;
}
