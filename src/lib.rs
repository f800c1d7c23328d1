//! # edgequake-pdf-a11y
//!
//! Accessibility remediation for uploaded PDFs: submit a file to an external
//! accessibility checker, normalize its findings into a flat issue list, and
//! fix those issues automatically or with AI-written alternate text.
//!
//! ## Flow Overview
//!
//! ```text
//! upload ──▶ PdfRecord (status: none)
//!   │
//!   ├─ 1. Start    submit bytes to the checker            → queued
//!   ├─ 2. Poll     caller-driven status checks            → in-progress / failed
//!   ├─ 3. Normalize  category/entry report → Issue[ ]     → completed + score
//!   ├─ 4. Fix      lopdf metadata/structure edits, re-upload as a new version
//!   └─ 5. Alt text extract images → vision model → /Alt on figure elements
//! ```
//!
//! Every issue costs 5 points: the score is `100 - 5 × unfixed`, floored at 0.
//! Fixes never fail once the issue exists. If the PDF cannot be mutated or
//! re-uploaded, the issue is still marked fixed and `actuallyFixed` stays
//! false.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf_a11y::{normalize, RawReport};
//!
//! let report: RawReport = serde_json::from_str(
//!     r#"[{"category": "Document", "errorInfo": [{"Rule": "Title", "Status": "Failed"}]}]"#,
//! ).unwrap();
//! let issues = normalize(Some(&report));
//! assert_eq!(issues[0].issue_type, "Document - Title");
//! ```
//!
//! The `pdf-a11y` binary (feature `cli`, on by default) runs the HTTP server:
//!
//! ```text
//! JWT_SECRET=… CHECKER_BASE_URL=… OPENAI_API_KEY=… pdf-a11y serve
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf-a11y` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod ai;
pub mod alt_text;
pub mod analysis;
pub mod checker;
pub mod config;
pub mod error;
pub mod fix;
pub mod model;
pub mod normalize;
pub mod prompts;
pub mod remediate;
pub mod score;
pub mod server;
pub mod storage;
pub mod store;

#[cfg(test)]
mod test_support;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use ai::{AiService, OpenAiService};
pub use alt_text::{AltTextItem, AltTextOrchestrator, AltTextResult};
pub use analysis::{AnalysisOrchestrator, StartResult, StatusResult};
pub use checker::payload::RawReport;
pub use checker::{AccessibilityChecker, CheckStatus, HttpChecker, PollOutcome};
pub use config::{ServiceConfig, ServiceConfigBuilder};
pub use error::{ApiError, ConfigError, RemediationError, ServiceError, StorageError, StoreError};
pub use fix::{DegradeReason, FixAllResult, FixIssueResult, FixOrchestrator, FixOutcome};
pub use model::{AnalysisStatus, Issue, PdfRecord, Severity};
pub use normalize::normalize;
pub use remediate::{
    AltTextOutcome, DocumentDefaults, DocumentMetadata, LopdfRemediator, PdfRemediator,
};
pub use server::{router, serve, AppState};
pub use storage::{FilesystemStore, MemoryStore, ObjectStore};
pub use store::{MemoryRecordStore, RecordStore, SqliteRecordStore};
