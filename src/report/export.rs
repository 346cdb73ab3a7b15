//! CSV export of raw responses.

use crate::models::{AnswerRecord, Form, QuestionKind};
use anyhow::{Context, Result};
use serde_json::Value;

/// Render a raw answer as a single CSV cell.
fn cell(kind: &QuestionKind, value: Option<&Value>) -> String {
    match (kind, value) {
        (_, None | Some(Value::Null)) => String::new(),
        (QuestionKind::MultiSelect, Some(Value::Array(items))) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("; "),
        (QuestionKind::MultiSelect, Some(_)) => String::new(),
        (_, Some(Value::String(s))) => s.clone(),
        (_, Some(other)) => other.to_string(),
    }
}

/// Write every response of `form` as CSV.
///
/// Columns are `responseId`, `submittedAt`, then one per question, headed
/// by its label (or id when the label is blank).
pub fn responses_to_csv(form: &Form, records: &[AnswerRecord]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec!["responseId".to_string(), "submittedAt".to_string()];
    header.extend(form.fields.iter().map(|f| {
        if f.label.trim().is_empty() {
            f.id.clone()
        } else {
            f.label.clone()
        }
    }));
    writer.write_record(&header)?;

    for record in records {
        let mut row = vec![record.id.clone(), record.submitted_at.to_rfc3339()];
        row.extend(
            form.fields
                .iter()
                .map(|f| cell(&f.kind, record.answers.get(&f.id))),
        );
        writer.write_record(&row)?;
    }

    let bytes = writer.into_inner().context("Failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

/// File-name-safe slug of a form title.
pub fn safe_name(title: &str) -> String {
    let slug: String = title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();

    if slug.is_empty() {
        "form".to_string()
    } else {
        slug
    }
}
