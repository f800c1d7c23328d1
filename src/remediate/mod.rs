//! PDF mutation capability used by the fix and alt-text flows.
//!
//! [`PdfRemediator`] is synchronous: parsing and re-serialising a PDF is
//! CPU-bound, so async callers go through [`run_blocking`], which moves the
//! work onto tokio's blocking pool the same way page rendering is handled in
//! a conversion pipeline.
//!
//! The default implementation, [`LopdfRemediator`], edits the document
//! catalog, Info dictionary, pages and structure tree in place with `lopdf`.

pub mod document;
pub mod images;

#[cfg(test)]
pub(crate) mod fixtures;

pub use document::LopdfRemediator;
pub use images::{extract_images, image_id, ExtractedImage};

use crate::error::RemediationError;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

/// Metadata written into every remediated document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub title: String,
    pub author: String,
    pub subject: String,
    /// BCP 47 tag written to the catalog `/Lang`.
    pub language: String,
}

/// Configured author / subject / language; the title comes from the file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentDefaults {
    pub author: String,
    pub subject: String,
    pub language: String,
}

impl Default for DocumentDefaults {
    fn default() -> Self {
        Self {
            author: "Document Author".to_string(),
            subject: "Accessible PDF document".to_string(),
            language: "en-US".to_string(),
        }
    }
}

impl DocumentDefaults {
    pub fn metadata_for(&self, file_name: &str) -> DocumentMetadata {
        DocumentMetadata {
            title: derive_title(file_name),
            author: self.author.clone(),
            subject: self.subject.clone(),
            language: self.language.clone(),
        }
    }
}

pub trait PdfRemediator: Send + Sync {
    /// Apply the automated fixes relevant to `issue_types` in a single pass.
    fn remediate(
        &self,
        pdf: &[u8],
        issue_types: &[String],
        metadata: &DocumentMetadata,
    ) -> Result<Vec<u8>, RemediationError>;

    /// Write each `(image id, text)` pair onto the figure elements that
    /// display that image and lack alternate text. A figure whose image
    /// cannot be determined, or that shows more than one image, is left
    /// untouched.
    fn apply_alt_text(
        &self,
        pdf: &[u8],
        alt_texts: &[(String, String)],
    ) -> Result<AltTextOutcome, RemediationError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AltTextOutcome {
    pub pdf: Vec<u8>,
    /// Figures that received alternate text.
    pub applied: usize,
    /// Figures still without alternate text afterwards.
    pub remaining: usize,
}

/// Run a remediation closure on the blocking pool.
pub async fn run_blocking<T, F>(
    remediator: Arc<dyn PdfRemediator>,
    f: F,
) -> Result<T, RemediationError>
where
    T: Send + 'static,
    F: FnOnce(&dyn PdfRemediator) -> Result<T, RemediationError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(remediator.as_ref()))
        .await
        .map_err(|e| RemediationError::Panicked(e.to_string()))?
}

// ── File naming ──────────────────────────────────────────────────────────────

static RE_FIXED_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:_fixed_\d+)+$").unwrap());
static RE_PDF_EXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\.pdf$").unwrap());
static RE_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[_\-\s]+").unwrap());

/// File name without the `.pdf` extension and without earlier fix suffixes.
fn base_name(file_name: &str) -> &str {
    let stem = match RE_PDF_EXT.find(file_name) {
        Some(m) => &file_name[..m.start()],
        None => file_name,
    };
    match RE_FIXED_SUFFIX.find(stem) {
        Some(m) => &stem[..m.start()],
        None => stem,
    }
}

/// `<original>_fixed_<unix millis>.pdf`.
pub fn fixed_file_name(file_name: &str, at: DateTime<Utc>) -> String {
    let base = match base_name(file_name) {
        "" => "document",
        b => b,
    };
    format!("{}_fixed_{}.pdf", base, at.timestamp_millis())
}

/// Human-readable title from a file name: `annual_report-2024.pdf` →
/// `annual report 2024`.
pub fn derive_title(file_name: &str) -> String {
    let title = RE_SEPARATORS.replace_all(base_name(file_name), " ");
    let title = title.trim();
    if title.is_empty() {
        "Untitled Document".to_string()
    } else {
        title.to_string()
    }
}
