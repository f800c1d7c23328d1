//! Fix orchestration: single-issue and fix-all flows.
//!
//! Once the target record and issue are found, a fix never fails. The PDF is
//! downloaded, mutated and re-uploaded as a new version when every step
//! works; any failure along that path degrades to a metadata-only fix where
//! the issue is still marked fixed but `actuallyFixed` stays false and
//! `fileUrl` keeps pointing at the previous version.
//!
//! ```text
//! Pending ─┬─ source download failed ─────────────────────┐
//!          └─ MutationAttempted ─┬─ mutation failed ──────┤ MetadataOnly
//!                                ├─ upload failed ────────┘
//!                                └─ upload succeeded ───── ActuallyFixed
//!                                                   ↓
//!                                              Persisted
//! ```
//!
//! Only ownership checks, a missing issue, and the final save surface errors.

use crate::error::{ApiError, StorageError};
use crate::model::{Issue, PdfRecord};
use crate::remediate::{fixed_file_name, run_blocking, DocumentDefaults, PdfRemediator};
use crate::storage::{object_key, ObjectStore};
use crate::store::{load_owned, save, RecordStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Why a fix ended up metadata-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradeReason {
    SourceUnavailable,
    MutationFailed,
    UploadFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixOutcome {
    /// The mutated PDF is stored under `file_url`.
    ActuallyFixed { file_url: String },
    MetadataOnly { reason: DegradeReason },
}

impl FixOutcome {
    pub fn actually_fixed(&self) -> bool {
        matches!(self, FixOutcome::ActuallyFixed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FixIssueResult {
    pub new_score: u8,
    pub remaining_issues: usize,
    pub issues: Vec<Issue>,
    #[serde(skip)]
    pub outcome: FixOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FixAllResult {
    pub new_score: u8,
    pub fixed_count: usize,
    pub issues: Vec<Issue>,
    #[serde(skip)]
    pub outcome: Option<FixOutcome>,
}

/// Store `bytes` as the next version of `record` and point the record at it.
/// On failure the record is left untouched.
pub(crate) async fn store_new_version(
    objects: &dyn ObjectStore,
    record: &mut PdfRecord,
    bytes: &[u8],
    at: DateTime<Utc>,
) -> Result<(), StorageError> {
    let file_name = fixed_file_name(&record.file_name, at);
    let key = object_key(&record.owner_id, &record.id, &file_name);
    objects.put(&key, bytes).await?;
    info!("Stored new version of {} as {}", record.id, key);
    record.file_name = file_name;
    record.file_url = key;
    Ok(())
}

pub struct FixOrchestrator {
    records: Arc<dyn RecordStore>,
    objects: Arc<dyn ObjectStore>,
    remediator: Arc<dyn PdfRemediator>,
    document: DocumentDefaults,
}

impl FixOrchestrator {
    pub fn new(
        records: Arc<dyn RecordStore>,
        objects: Arc<dyn ObjectStore>,
        remediator: Arc<dyn PdfRemediator>,
        document: DocumentDefaults,
    ) -> Self {
        Self {
            records,
            objects,
            remediator,
            document,
        }
    }

    /// Fix one issue. `issue_type` overrides the stored type as the mutation
    /// hint when the caller supplies one.
    pub async fn fix_issue(
        &self,
        owner_id: &str,
        pdf_id: &str,
        issue_id: u32,
        issue_type: Option<&str>,
    ) -> Result<FixIssueResult, ApiError> {
        let mut record = load_owned(self.records.as_ref(), pdf_id, owner_id).await?;
        let stored_type = record
            .raw_report
            .iter()
            .find(|i| i.id == issue_id)
            .map(|i| i.issue_type.clone())
            .ok_or_else(|| ApiError::NotFound(format!("issue {issue_id} in PDF '{pdf_id}'")))?;
        let hint = issue_type
            .filter(|t| !t.trim().is_empty())
            .map(str::to_string)
            .unwrap_or(stored_type);

        let now = Utc::now();
        let outcome = self.attempt(&mut record, vec![hint], now).await;
        if let Some(issue) = record.issue_mut(issue_id) {
            issue.mark_fixed(outcome.actually_fixed(), now);
        }
        let new_score = record.rescore();
        save(self.records.as_ref(), &mut record).await?;

        info!(
            "Fixed issue {} on {} ({:?}); score now {}",
            issue_id, pdf_id, outcome, new_score
        );
        Ok(FixIssueResult {
            new_score,
            remaining_issues: record.unfixed_count(),
            issues: record.raw_report,
            outcome,
        })
    }

    /// Fix every currently-unfixed issue with one combined mutation pass.
    pub async fn fix_all(&self, owner_id: &str, pdf_id: &str) -> Result<FixAllResult, ApiError> {
        let mut record = load_owned(self.records.as_ref(), pdf_id, owner_id).await?;
        let targets: Vec<u32> = record
            .raw_report
            .iter()
            .filter(|i| !i.fixed)
            .map(|i| i.id)
            .collect();

        let now = Utc::now();
        let outcome = if targets.is_empty() {
            None
        } else {
            let mut types: Vec<String> = Vec::new();
            for issue in record.raw_report.iter().filter(|i| !i.fixed) {
                if !types.contains(&issue.issue_type) {
                    types.push(issue.issue_type.clone());
                }
            }
            let outcome = self.attempt(&mut record, types, now).await;
            for id in &targets {
                if let Some(issue) = record.issue_mut(*id) {
                    issue.mark_fixed(outcome.actually_fixed(), now);
                }
            }
            Some(outcome)
        };

        let new_score = record.rescore();
        save(self.records.as_ref(), &mut record).await?;

        info!(
            "Fixed {} issues on {} ({:?}); score now {}",
            targets.len(),
            pdf_id,
            outcome,
            new_score
        );
        Ok(FixAllResult {
            new_score,
            fixed_count: targets.len(),
            issues: record.raw_report,
            outcome,
        })
    }

    /// Download, mutate and re-upload. Never fails; failures pick the
    /// degrade reason.
    async fn attempt(
        &self,
        record: &mut PdfRecord,
        issue_types: Vec<String>,
        now: DateTime<Utc>,
    ) -> FixOutcome {
        let source = match self.objects.get(&record.file_url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Fix on {}: source unavailable: {}", record.id, e);
                return FixOutcome::MetadataOnly {
                    reason: DegradeReason::SourceUnavailable,
                };
            }
        };

        let metadata = self.document.metadata_for(&record.file_name);
        let mutated = match run_blocking(Arc::clone(&self.remediator), move |r| {
            r.remediate(&source, &issue_types, &metadata)
        })
        .await
        {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Fix on {}: mutation failed: {}", record.id, e);
                return FixOutcome::MetadataOnly {
                    reason: DegradeReason::MutationFailed,
                };
            }
        };

        match store_new_version(self.objects.as_ref(), record, &mutated, now).await {
            Ok(()) => FixOutcome::ActuallyFixed {
                file_url: record.file_url.clone(),
            },
            Err(e) => {
                warn!("Fix on {}: upload failed: {}", record.id, e);
                FixOutcome::MetadataOnly {
                    reason: DegradeReason::UploadFailed,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remediate::fixtures::{text_of, PdfBuilder};
    use crate::remediate::LopdfRemediator;
    use crate::storage::MemoryStore;
    use crate::store::MemoryRecordStore;
    use crate::test_support::*;

    struct Harness {
        records: Arc<MemoryRecordStore>,
        objects: Arc<dyn ObjectStore>,
        fixer: FixOrchestrator,
    }

    async fn harness(
        record: &PdfRecord,
        objects: Arc<dyn ObjectStore>,
        remediator: Arc<dyn PdfRemediator>,
    ) -> Harness {
        let records = Arc::new(MemoryRecordStore::new());
        records.insert(record).await.unwrap();
        let fixer = FixOrchestrator::new(
            records.clone(),
            objects.clone(),
            remediator,
            DocumentDefaults::default(),
        );
        Harness {
            records,
            objects,
            fixer,
        }
    }

    async fn with_source(record: &PdfRecord) -> Arc<dyn ObjectStore> {
        let store = MemoryStore::new();
        store.put(&record.file_url, b"%PDF-1.7 original").await.unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn missing_issue_is_not_found_and_leaves_record_unchanged() {
        let record = analysed_record(3);
        let h = harness(&record, with_source(&record).await, Arc::new(MarkerRemediator::default())).await;

        let err = h.fixer.fix_issue(OWNER, &record.id, 99, None).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        assert_eq!(h.records.get(&record.id).await.unwrap().unwrap(), record);
    }

    #[tokio::test]
    async fn other_owner_is_not_found() {
        let record = analysed_record(1);
        let h = harness(&record, with_source(&record).await, Arc::new(MarkerRemediator::default())).await;
        let err = h.fixer.fix_issue("mallory", &record.id, 1, None).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        let err = h.fixer.fix_all("mallory", &record.id).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn successful_fix_uploads_new_version() {
        let record = analysed_record(3);
        let remediator = Arc::new(MarkerRemediator::default());
        let h = harness(&record, with_source(&record).await, remediator.clone()).await;

        let result = h
            .fixer
            .fix_issue(OWNER, &record.id, 2, Some("Document - Tagged PDF"))
            .await
            .unwrap();
        assert!(result.outcome.actually_fixed());
        assert_eq!(result.new_score, 90);
        assert_eq!(result.remaining_issues, 2);
        assert_eq!(
            *remediator.seen_types.lock().unwrap(),
            vec!["Document - Tagged PDF".to_string()]
        );

        let stored = h.records.get(&record.id).await.unwrap().unwrap();
        assert_ne!(stored.file_url, record.file_url);
        assert!(stored.file_name.starts_with("report_fixed_"));
        assert_eq!(h.objects.get(&stored.file_url).await.unwrap(), REMEDIATED);
        let fixed = stored.raw_report.iter().find(|i| i.id == 2).unwrap();
        assert!(fixed.fixed && fixed.actually_fixed && fixed.fixed_at.is_some());
        assert_eq!(stored.accessibility_score, Some(90));
    }

    #[tokio::test]
    async fn download_failure_is_metadata_only() {
        let record = analysed_record(2);
        let h = harness(&record, Arc::new(MemoryStore::new()), Arc::new(MarkerRemediator::default())).await;

        let result = h.fixer.fix_all(OWNER, &record.id).await.unwrap();
        assert_eq!(
            result.outcome,
            Some(FixOutcome::MetadataOnly {
                reason: DegradeReason::SourceUnavailable
            })
        );
        assert!(result.issues.iter().all(|i| i.fixed && !i.actually_fixed));

        let stored = h.records.get(&record.id).await.unwrap().unwrap();
        assert_eq!(stored.file_url, record.file_url);
        assert_eq!(stored.accessibility_score, Some(100));
    }

    #[tokio::test]
    async fn fix_all_four_issues_scores_100_when_mutation_succeeds() {
        let record = analysed_record(4);
        assert_eq!(record.accessibility_score, Some(80));
        let h = harness(&record, with_source(&record).await, Arc::new(MarkerRemediator::default())).await;

        let result = h.fixer.fix_all(OWNER, &record.id).await.unwrap();
        assert_eq!(result.new_score, 100);
        assert_eq!(result.fixed_count, 4);
        assert!(result.issues.iter().all(|i| i.fixed && i.actually_fixed));
    }

    #[tokio::test]
    async fn fix_all_four_issues_scores_100_when_mutation_fails() {
        let record = analysed_record(4);
        let h = harness(&record, with_source(&record).await, Arc::new(FailingRemediator)).await;

        let result = h.fixer.fix_all(OWNER, &record.id).await.unwrap();
        assert_eq!(result.new_score, 100);
        assert_eq!(
            result.outcome,
            Some(FixOutcome::MetadataOnly {
                reason: DegradeReason::MutationFailed
            })
        );
        assert!(result.issues.iter().all(|i| i.fixed && !i.actually_fixed));
    }

    #[tokio::test]
    async fn upload_failure_keeps_previous_file() {
        let record = analysed_record(1);
        let objects = ReadOnlyStore::default();
        objects.inner.put(&record.file_url, b"%PDF-1.7").await.unwrap();
        let h = harness(&record, Arc::new(objects), Arc::new(MarkerRemediator::default())).await;

        let result = h.fixer.fix_issue(OWNER, &record.id, 1, None).await.unwrap();
        assert_eq!(
            result.outcome,
            FixOutcome::MetadataOnly {
                reason: DegradeReason::UploadFailed
            }
        );
        let stored = h.records.get(&record.id).await.unwrap().unwrap();
        assert_eq!(stored.file_url, record.file_url);
        assert_eq!(stored.file_name, record.file_name);
    }

    #[tokio::test]
    async fn refixing_never_downgrades_actually_fixed() {
        let mut record = analysed_record(2);
        record.raw_report[0].mark_fixed(true, Utc::now());
        let h = harness(&record, Arc::new(MemoryStore::new()), Arc::new(FailingRemediator)).await;

        let result = h.fixer.fix_issue(OWNER, &record.id, 1, None).await.unwrap();
        assert!(result.issues[0].actually_fixed);
        assert_eq!(result.remaining_issues, 1);
        assert_eq!(result.new_score, 95);
    }

    #[tokio::test]
    async fn fix_all_skips_already_fixed_issues() {
        let mut record = analysed_record(3);
        record.raw_report[1].mark_fixed(false, Utc::now());
        let h = harness(&record, with_source(&record).await, Arc::new(MarkerRemediator::default())).await;

        let result = h.fixer.fix_all(OWNER, &record.id).await.unwrap();
        assert_eq!(result.fixed_count, 2);
        assert!(!result.issues[1].actually_fixed);
        assert!(result.issues[0].actually_fixed && result.issues[2].actually_fixed);
    }

    #[tokio::test]
    async fn lopdf_fix_writes_metadata_into_new_version() {
        let mut record = analysed_record(1);
        record.file_name = "quarterly_review.pdf".into();
        let objects = Arc::new(MemoryStore::new());
        objects
            .put(&record.file_url, &PdfBuilder::new().page(vec![]).build())
            .await
            .unwrap();
        let h = harness(&record, objects, Arc::new(LopdfRemediator::new())).await;

        let result = h.fixer.fix_issue(OWNER, &record.id, 1, None).await.unwrap();
        let FixOutcome::ActuallyFixed { file_url } = result.outcome else {
            panic!("expected an actual fix, got {:?}", result.outcome);
        };
        let doc = lopdf::Document::load_mem(&h.objects.get(&file_url).await.unwrap()).unwrap();
        let info_id = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
        let info = doc.get_object(info_id).unwrap().as_dict().unwrap();
        assert_eq!(text_of(info.get(b"Title").unwrap()), "quarterly review");
    }
}
