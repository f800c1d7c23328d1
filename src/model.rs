//! Persisted data model: one [`PdfRecord`] per uploaded file, holding the
//! normalized [`Issue`] list.
//!
//! The JSON shape of [`Issue`] is a wire contract. It is stored verbatim in
//! the record's report column and returned unchanged to clients. Field
//! names and the `high`/`medium` severity vocabulary must not drift.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle of the external accessibility analysis for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnalysisStatus {
    /// Uploaded, never submitted to the checker.
    #[default]
    None,
    Queued,
    Started,
    InProgress,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::None => "none",
            AnalysisStatus::Queued => "queued",
            AnalysisStatus::Started => "started",
            AnalysisStatus::InProgress => "in-progress",
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::Failed => "failed",
        }
    }

    /// A run is underway or already finished; starting another is refused.
    pub fn blocks_new_analysis(&self) -> bool {
        matches!(
            self,
            AnalysisStatus::Queued
                | AnalysisStatus::Started
                | AnalysisStatus::InProgress
                | AnalysisStatus::Completed
        )
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(AnalysisStatus::None),
            "queued" => Ok(AnalysisStatus::Queued),
            "started" => Ok(AnalysisStatus::Started),
            "in-progress" => Ok(AnalysisStatus::InProgress),
            "completed" => Ok(AnalysisStatus::Completed),
            "failed" => Ok(AnalysisStatus::Failed),
            other => Err(format!("unknown analysis status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Source status "Failed".
    High,
    /// Source status "Manual".
    Medium,
}

/// One normalized accessibility finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    /// Unique within a record; assigned once at normalization, never renumbered.
    pub id: u32,
    /// `None` means the finding is document-wide.
    pub page: Option<u32>,
    /// `"<category> - <subtype>"`.
    #[serde(rename = "type")]
    pub issue_type: String,
    pub severity: Severity,
    pub description: String,
    pub suggestion: Option<String>,
    pub wcag_reference: Option<String>,
    #[serde(default)]
    pub fixed: bool,
    #[serde(default)]
    pub fixed_at: Option<DateTime<Utc>>,
    /// The PDF bytes were mutated and re-uploaded, not just the flag flipped.
    #[serde(default)]
    pub actually_fixed: bool,
}

impl Issue {
    /// Mark the issue resolved. `actually_fixed` never goes from true to false.
    pub fn mark_fixed(&mut self, actually_fixed: bool, at: DateTime<Utc>) {
        self.fixed = true;
        self.fixed_at = Some(at);
        self.actually_fixed = self.actually_fixed || actually_fixed;
    }
}

/// Metadata row for one uploaded PDF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfRecord {
    pub id: String,
    pub owner_id: String,
    pub file_name: String,
    /// Object-store key of the most recent successfully uploaded variant.
    pub file_url: String,
    pub analysis_status: AnalysisStatus,
    pub external_source_id: Option<String>,
    pub report_url: Option<String>,
    #[serde(default)]
    pub raw_report: Vec<Issue>,
    pub accessibility_score: Option<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PdfRecord {
    /// A freshly uploaded file: no analysis, no issues, no score.
    pub fn new(
        owner_id: impl Into<String>,
        file_name: impl Into<String>,
        file_url: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            file_name: file_name.into(),
            file_url: file_url.into(),
            analysis_status: AnalysisStatus::None,
            external_source_id: None,
            report_url: None,
            raw_report: Vec::new(),
            accessibility_score: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owned_by(&self, owner_id: &str) -> bool {
        self.owner_id == owner_id
    }

    pub fn unfixed_count(&self) -> usize {
        self.raw_report.iter().filter(|i| !i.fixed).count()
    }

    pub fn issue_mut(&mut self, issue_id: u32) -> Option<&mut Issue> {
        self.raw_report.iter_mut().find(|i| i.id == issue_id)
    }

    /// Recompute the score from the current report.
    pub fn rescore(&mut self) -> u8 {
        let score = crate::score::accessibility_score(&self.raw_report);
        self.accessibility_score = Some(score);
        score
    }
}
