//! Issue normalization: raw checker report → flat, numbered [`Issue`] list.
//!
//! The transform is pure and deterministic. Categories and their entries are
//! visited in service order; only "Failed" and "Manual" entries survive; ids
//! are a single counter across the whole flattened sequence so they stay
//! contiguous no matter how many categories are empty.
//!
//! An absent or unrecognised payload yields zero issues. That is the same
//! shape as a fully accessible document; callers cannot tell the two apart.

use crate::checker::payload::{RawDescription, RawEntry, RawReport};
use crate::model::{Issue, Severity};
use tracing::{debug, warn};

pub const STATUS_FAILED: &str = "Failed";
pub const STATUS_MANUAL: &str = "Manual";
pub const NO_DESCRIPTION: &str = "No description available";

/// Normalize a checker report. `None` and unrecognised shapes give `vec![]`.
pub fn normalize(report: Option<&RawReport>) -> Vec<Issue> {
    let Some(report) = report else {
        debug!("Checker returned no report; normalizing to zero issues");
        return Vec::new();
    };

    let Some(categories) = report.categories() else {
        warn!("Checker report has an unrecognised shape; normalizing to zero issues");
        return Vec::new();
    };

    let mut issues = Vec::new();
    let mut next_id = 1u32;

    for (category, entries) in &categories {
        for entry in entries {
            let Some(severity) = severity_of(entry) else {
                continue;
            };
            issues.push(Issue {
                id: next_id,
                page: entry.page,
                issue_type: format!(
                    "{} - {}",
                    category,
                    entry.rule.as_deref().unwrap_or("Unknown")
                ),
                severity,
                description: description_of(entry),
                suggestion: suggestion_of(entry),
                wcag_reference: entry.wcag_reference.clone(),
                fixed: false,
                fixed_at: None,
                actually_fixed: false,
            });
            next_id += 1;
        }
    }

    debug!(
        "Normalized {} issues from {} categories",
        issues.len(),
        categories.len()
    );
    issues
}

fn severity_of(entry: &RawEntry) -> Option<Severity> {
    match entry.status.as_deref() {
        Some(STATUS_FAILED) => Some(Severity::High),
        Some(STATUS_MANUAL) => Some(Severity::Medium),
        _ => None,
    }
}

fn qa_answer(entry: &RawEntry, needle: &str) -> Option<String> {
    match entry.description {
        Some(RawDescription::QuestionsAndAnswers(ref pairs)) => pairs
            .iter()
            .find(|p| p.question.contains(needle))
            .map(|p| p.answer.clone()),
        _ => None,
    }
}

/// Why-answer, else plain string, else raw error, else the fixed fallback.
fn description_of(entry: &RawEntry) -> String {
    if let Some(why) = qa_answer(entry, "Why") {
        return why;
    }
    if let Some(RawDescription::Text(ref text)) = entry.description {
        return text.clone();
    }
    entry
        .error
        .clone()
        .unwrap_or_else(|| NO_DESCRIPTION.to_string())
}

/// Only a How-answer from a Q&A list; plain descriptions never yield one.
fn suggestion_of(entry: &RawEntry) -> Option<String> {
    qa_answer(entry, "How")
}
