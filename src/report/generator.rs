//! Markdown and JSON analytics reports.
//!
//! This module renders a [`DistributionSnapshot`] as a human readable
//! per-field breakdown.

use crate::models::{DistributionSnapshot, Form, QuestionKind, QuestionSummary};
use anyhow::Result;
use chrono::{DateTime, Utc};

/// Generate a complete Markdown report.
pub fn generate_markdown_report(form: &Form, snapshot: &DistributionSnapshot) -> String {
    let mut output = String::new();

    output.push_str(&format!("# {}\n\n", form.title));
    output.push_str(&generate_metadata_section(form, snapshot));

    for field in &snapshot.per_field {
        output.push_str(&generate_field_section(field));
    }

    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(form: &Form, snapshot: &DistributionSnapshot) -> String {
    let mut section = String::new();

    section.push_str("## Overview\n\n");
    section.push_str(&format!("- **Form:** `{}`\n", snapshot.form_id));
    section.push_str(&format!("- **Responses:** {}\n", snapshot.response_count));
    match form.last_response_at {
        Some(at) => section.push_str(&format!(
            "- **Last response:** {}\n",
            at.format("%Y-%m-%d %H:%M:%S UTC")
        )),
        None => section.push_str("- **Last response:** never\n"),
    }
    section.push_str(&format!("- **Questions:** {}\n", snapshot.per_field.len()));
    section.push('\n');

    section
}

/// One-line description under a field heading, with averages where relevant.
fn field_meta(field: &QuestionSummary) -> String {
    let mut meta = field.summary.clone();

    match (&field.kind, field.average, field.scale) {
        (QuestionKind::Rating, Some(avg), Some(scale)) => {
            meta.push_str(&format!(" · avg {:.2} / {}", avg, scale));
        }
        (QuestionKind::MultiSelect, Some(avg), _) => {
            meta.push_str(&format!(" · avg selected {:.2}", avg));
        }
        _ => {}
    }
    meta.push_str(&format!(" · {} answered", field.response_n));

    meta
}

/// Generate the breakdown table for a single field.
fn generate_field_section(field: &QuestionSummary) -> String {
    let mut section = String::new();

    section.push_str(&format!("## {}\n\n", field.label));
    section.push_str(&format!("*{}*\n\n", field_meta(field)));

    section.push_str("| Option | Count | Percent |\n");
    section.push_str("|:---|---:|---:|\n");

    // Percentages are relative to the records that answered this field.
    let total = field.response_n.max(1) as f64;
    for bar in &field.bars {
        let label = if bar.label.is_empty() { "-" } else { &bar.label };
        let pct = bar.value as f64 / total * 100.0;
        section.push_str(&format!("| {} | {} | {:.0}% |\n", label, bar.value, pct));
    }
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let generated: DateTime<Utc> = Utc::now();
    format!(
        "---\n\n*Generated by FormPulse on {}*\n",
        generated.format("%Y-%m-%d %H:%M UTC")
    )
}

/// Generate a JSON report.
pub fn generate_json_report(snapshot: &DistributionSnapshot) -> Result<String> {
    serde_json::to_string_pretty(snapshot).map_err(Into::into)
}
