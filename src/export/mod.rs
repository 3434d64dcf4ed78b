//! CSV export of a triaged batch
//!
//! Status uses its own two-way rule (numeric score >= 80 is `Approved`,
//! anything else `Needs Review`) unless a reviewer verdict is present. It is
//! independent of the three-tier classifier.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::confidence::ConfidenceInput;
use crate::error::{Result, TriageError};
use crate::ingestion::QuestionRecord;
use crate::triage::BatchResult;

/// MIME type of exported files
pub const CSV_MIME_TYPE: &str = "text/csv";

/// Score at or above which an un-reviewed answer exports as `Approved`
pub const EXPORT_APPROVAL_THRESHOLD: f64 = 80.0;

const HEADER: [&str; 6] = [
    "ID",
    "Question",
    "Answer",
    "Confidence Score",
    "Status",
    "References",
];

const REFERENCE_SEPARATOR: &str = "; ";
const STATUS_NEEDS_REVIEW: &str = "Needs Review";
const STATUS_APPROVED: &str = "Approved";

/// Render a batch as CSV text (header plus one row per record)
pub fn to_csv(batch: &BatchResult) -> String {
    let mut lines = Vec::with_capacity(batch.questions().len() + 1);
    lines.push(HEADER.join(","));
    lines.extend(batch.questions().iter().map(record_row));
    lines.join("\n")
}

fn record_row(record: &QuestionRecord) -> String {
    [
        record.id.clone(),
        record.question_text.clone(),
        record.normalized_answer_text.clone(),
        record.confidence_raw.display_value(),
        export_status(record).to_string(),
        record.references.join(REFERENCE_SEPARATOR),
    ]
    .iter()
    .map(|cell| escape_cell(cell))
    .collect::<Vec<_>>()
    .join(",")
}

/// Reviewer verdict if any, else the 80% rule on the raw score
pub fn export_status(record: &QuestionRecord) -> &'static str {
    if let Some(feedback) = record.feedback {
        return feedback.as_str();
    }
    status_from_confidence(&record.confidence_raw)
}

fn status_from_confidence(confidence: &ConfidenceInput) -> &'static str {
    match confidence.score() {
        Some(score) if score >= EXPORT_APPROVAL_THRESHOLD => STATUS_APPROVED,
        _ => STATUS_NEEDS_REVIEW,
    }
}

/// Quote a cell only when it holds a comma or a double quote
pub fn escape_cell(value: &str) -> String {
    if value.contains(',') || value.contains('"') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// `security-questionnaire-results-<timestamp>.csv` with `:` and `.` of the
/// ISO-8601 timestamp replaced by `-`
pub fn export_file_name(at: DateTime<Utc>) -> String {
    let stamp = at
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
        .replace([':', '.'], "-");
    format!("security-questionnaire-results-{}.csv", stamp)
}

/// Write the CSV for `batch` into `dir`, returning the file path
pub fn write_export(batch: &BatchResult, dir: &Path, at: DateTime<Utc>) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| TriageError::Io {
        source: e,
        context: format!("Failed to create export directory: {:?}", dir),
    })?;

    let path = dir.join(export_file_name(at));
    std::fs::write(&path, to_csv(batch)).map_err(|e| TriageError::Io {
        source: e,
        context: format!("Failed to write export file: {:?}", path),
    })?;

    tracing::info!(
        path = %path.display(),
        records = batch.questions().len(),
        mime = CSV_MIME_TYPE,
        "Exported triage results"
    );
    Ok(path)
}
