//! Analysis orchestration: submit a record to the checker and fold poll
//! results back into it.
//!
//! Polling is caller-driven. Each `status` call polls the checker at most
//! once; a completed record answers from its cached issues without polling
//! unless the caller forces a refresh.

use crate::checker::{AccessibilityChecker, CheckStatus, PollOutcome};
use crate::error::ApiError;
use crate::model::{AnalysisStatus, Issue, PdfRecord};
use crate::normalize::normalize;
use crate::storage::ObjectStore;
use crate::store::{load_owned, save, RecordStore};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResult {
    pub source_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResult {
    pub status: AnalysisStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_url: Option<String>,
    pub issues: Vec<Issue>,
}

impl StatusResult {
    fn of(record: PdfRecord) -> Self {
        Self {
            status: record.analysis_status,
            report_url: record.report_url,
            issues: record.raw_report,
        }
    }
}

pub struct AnalysisOrchestrator {
    records: Arc<dyn RecordStore>,
    objects: Arc<dyn ObjectStore>,
    checker: Arc<dyn AccessibilityChecker>,
}

impl AnalysisOrchestrator {
    pub fn new(
        records: Arc<dyn RecordStore>,
        objects: Arc<dyn ObjectStore>,
        checker: Arc<dyn AccessibilityChecker>,
    ) -> Self {
        Self {
            records,
            objects,
            checker,
        }
    }

    /// Submit the record's current file for checking.
    pub async fn start(&self, owner_id: &str, pdf_id: &str) -> Result<StartResult, ApiError> {
        let mut record = load_owned(self.records.as_ref(), pdf_id, owner_id).await?;
        if record.analysis_status.blocks_new_analysis() {
            return Err(ApiError::Conflict(format!(
                "analysis of PDF '{pdf_id}' is already {}",
                record.analysis_status
            )));
        }

        let bytes = self
            .objects
            .get(&record.file_url)
            .await
            .map_err(|e| ApiError::Internal(format!("reading {}: {e}", record.file_url)))?;

        let source_id = self.checker.submit_for_check(bytes, &record.file_name).await?;
        info!("Submitted {} to the checker as {}", pdf_id, source_id);

        record.external_source_id = Some(source_id.clone());
        record.analysis_status = AnalysisStatus::Queued;
        save(self.records.as_ref(), &mut record).await?;
        Ok(StartResult { source_id })
    }

    pub async fn status(&self, owner_id: &str, pdf_id: &str) -> Result<StatusResult, ApiError> {
        let record = load_owned(self.records.as_ref(), pdf_id, owner_id).await?;
        if record.analysis_status == AnalysisStatus::Completed {
            debug!("{} already analysed; answering from cache", pdf_id);
            return Ok(StatusResult::of(record));
        }
        self.poll_into(record).await
    }

    /// Poll even when the record is already completed. Fix flags survive on
    /// issues whose id and type match the previous report.
    pub async fn force_refresh(
        &self,
        owner_id: &str,
        pdf_id: &str,
    ) -> Result<StatusResult, ApiError> {
        let record = load_owned(self.records.as_ref(), pdf_id, owner_id).await?;
        self.poll_into(record).await
    }

    async fn poll_into(&self, mut record: PdfRecord) -> Result<StatusResult, ApiError> {
        let source_id = record.external_source_id.clone().ok_or_else(|| {
            ApiError::BadRequest(format!("analysis of PDF '{}' was never started", record.id))
        })?;

        let outcome = self.checker.poll_status(&source_id).await?;
        apply_poll(&mut record, outcome);
        save(self.records.as_ref(), &mut record).await?;
        Ok(StatusResult::of(record))
    }
}

/// Fold one poll result into the record.
fn apply_poll(record: &mut PdfRecord, outcome: PollOutcome) {
    match outcome.status {
        CheckStatus::Completed => {
            let mut issues = normalize(outcome.report.as_ref());
            carry_fix_flags(&record.raw_report, &mut issues);
            info!(
                "Analysis of {} completed with {} issues",
                record.id,
                issues.len()
            );
            record.raw_report = issues;
            record.analysis_status = AnalysisStatus::Completed;
            if outcome.report_url.is_some() {
                record.report_url = outcome.report_url;
            }
            record.rescore();
        }
        CheckStatus::Failed => {
            warn!("Checker reported a failed run for {}", record.id);
            record.analysis_status = AnalysisStatus::Failed;
        }
        CheckStatus::Queued => record.analysis_status = AnalysisStatus::Queued,
        CheckStatus::InProgress | CheckStatus::Unknown => {
            record.analysis_status = AnalysisStatus::InProgress
        }
    }
}

fn carry_fix_flags(previous: &[Issue], fresh: &mut [Issue]) {
    for issue in fresh.iter_mut() {
        if let Some(old) = previous
            .iter()
            .find(|p| p.id == issue.id && p.issue_type == issue.issue_type && p.fixed)
        {
            issue.fixed = true;
            issue.fixed_at = old.fixed_at;
            issue.actually_fixed = old.actually_fixed;
        }
    }
}
