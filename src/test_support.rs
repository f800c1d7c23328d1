//! Shared fakes for orchestrator unit tests.

use crate::ai::{AiService, AltTextDraft};
use crate::checker::{AccessibilityChecker, PollOutcome};
use crate::error::{RemediationError, ServiceError, StorageError};
use crate::model::{AnalysisStatus, Issue, PdfRecord, Severity};
use crate::remediate::{AltTextOutcome, DocumentMetadata, PdfRemediator};
use crate::storage::{MemoryStore, ObjectStore};
use async_trait::async_trait;
use edgequake_llm::ImageData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const OWNER: &str = "alice";

pub fn issue(id: u32, issue_type: &str) -> Issue {
    Issue {
        id,
        page: Some(1),
        issue_type: issue_type.to_string(),
        severity: Severity::High,
        description: "d".into(),
        suggestion: None,
        wcag_reference: None,
        fixed: false,
        fixed_at: None,
        actually_fixed: false,
    }
}

/// A completed record with `n` unfixed issues whose bytes live at `file_url`.
pub fn analysed_record(n: u32) -> PdfRecord {
    let mut record = PdfRecord::new(OWNER, "report.pdf", "alice/r/report.pdf");
    record.analysis_status = AnalysisStatus::Completed;
    record.raw_report = (1..=n).map(|i| issue(i, "Document - Title")).collect();
    record.rescore();
    record
}

/// Returns a fixed marker instead of editing, and records what it was asked.
#[derive(Default)]
pub struct MarkerRemediator {
    pub seen_types: Mutex<Vec<String>>,
    pub seen_alt_texts: Mutex<Vec<(String, String)>>,
}

pub const REMEDIATED: &[u8] = b"%PDF-1.7 remediated";

impl PdfRemediator for MarkerRemediator {
    fn remediate(
        &self,
        _pdf: &[u8],
        issue_types: &[String],
        _metadata: &DocumentMetadata,
    ) -> Result<Vec<u8>, RemediationError> {
        self.seen_types
            .lock()
            .unwrap()
            .extend(issue_types.iter().cloned());
        Ok(REMEDIATED.to_vec())
    }

    fn apply_alt_text(
        &self,
        _pdf: &[u8],
        alt_texts: &[(String, String)],
    ) -> Result<AltTextOutcome, RemediationError> {
        self.seen_alt_texts
            .lock()
            .unwrap()
            .extend(alt_texts.iter().cloned());
        Ok(AltTextOutcome {
            pdf: REMEDIATED.to_vec(),
            applied: alt_texts.len(),
            remaining: 0,
        })
    }
}

pub struct FailingRemediator;

impl PdfRemediator for FailingRemediator {
    fn remediate(
        &self,
        _pdf: &[u8],
        _issue_types: &[String],
        _metadata: &DocumentMetadata,
    ) -> Result<Vec<u8>, RemediationError> {
        Err(RemediationError::Parse("broken xref".into()))
    }

    fn apply_alt_text(
        &self,
        _pdf: &[u8],
        _: &[(String, String)],
    ) -> Result<AltTextOutcome, RemediationError> {
        Err(RemediationError::MissingStructure("StructTreeRoot"))
    }
}

/// Reads succeed from an inner store; every write fails.
#[derive(Default)]
pub struct ReadOnlyStore {
    pub inner: MemoryStore,
}

#[async_trait]
impl ObjectStore for ReadOnlyStore {
    async fn put(&self, key: &str, _bytes: &[u8]) -> Result<(), StorageError> {
        Err(StorageError::Io {
            key: key.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        })
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.inner.get(key).await
    }
}

/// Checker returning canned answers.
pub struct ScriptedChecker {
    pub source_id: Result<String, ServiceError>,
    pub poll: Mutex<Vec<Result<PollOutcome, ServiceError>>>,
    pub submissions: AtomicUsize,
}

impl ScriptedChecker {
    pub fn new(poll: Vec<Result<PollOutcome, ServiceError>>) -> Self {
        Self {
            source_id: Ok("run-1".to_string()),
            poll: Mutex::new(poll),
            submissions: AtomicUsize::new(0),
        }
    }

    pub fn failing_submit() -> Self {
        Self {
            source_id: Err(ServiceError::ServiceUnavailable {
                service: "accessibility checker".into(),
                detail: "HTTP 503".into(),
            }),
            ..Self::new(Vec::new())
        }
    }
}

#[async_trait]
impl AccessibilityChecker for ScriptedChecker {
    async fn submit_for_check(&self, _file: Vec<u8>, _name: &str) -> Result<String, ServiceError> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        self.source_id.clone()
    }

    async fn poll_status(&self, _source_id: &str) -> Result<PollOutcome, ServiceError> {
        let mut queue = self.poll.lock().unwrap();
        if queue.is_empty() {
            panic!("unexpected poll");
        }
        queue.remove(0)
    }
}

/// Describes images from their context, failing for images on `fail_pages`.
#[derive(Default)]
pub struct ScriptedAi {
    pub fail_pages: Vec<u32>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl AiService for ScriptedAi {
    async fn transcribe_audio(
        &self,
        _audio: Vec<u8>,
        _file_name: &str,
        _mime_type: &str,
    ) -> Result<String, ServiceError> {
        Ok("transcribed".into())
    }

    async fn describe_image(
        &self,
        _image: ImageData,
        context: Option<&str>,
    ) -> Result<AltTextDraft, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let context = context.unwrap_or("?");
        if self.fail_pages.iter().any(|p| context.ends_with(&format!("page {p}"))) {
            return Err(ServiceError::AltTextFailed("model timeout".into()));
        }
        Ok(AltTextDraft {
            text: format!("\"Figure from {context}\""),
            input_tokens: 1000,
            output_tokens: 100,
        })
    }
}
