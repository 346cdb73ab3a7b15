//! Data models for forms, answers and analytics snapshots.
//!
//! This module contains the core data structures shared by the store,
//! the aggregation engine and the HTTP layer. Field names on the wire
//! are camelCase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Type tag of a question.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum QuestionKind {
    /// Single select from declared options
    Choice,
    /// Any number of declared options
    MultiSelect,
    /// Numeric rating on a 1..scale range
    Rating,
    /// Free text
    Text,
    /// Unrecognized tag, kept verbatim
    Other(String),
}

impl QuestionKind {
    /// Returns the canonical wire tag.
    pub fn as_str(&self) -> &str {
        match self {
            QuestionKind::Choice => "multipleChoice",
            QuestionKind::MultiSelect => "checkboxes",
            QuestionKind::Rating => "rating",
            QuestionKind::Text => "text",
            QuestionKind::Other(tag) => tag,
        }
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for QuestionKind {
    fn from(s: &str) -> Self {
        match s {
            "multipleChoice" | "choice" => QuestionKind::Choice,
            "checkboxes" | "multiselect" => QuestionKind::MultiSelect,
            "rating" => QuestionKind::Rating,
            "text" => QuestionKind::Text,
            other => QuestionKind::Other(other.to_string()),
        }
    }
}

impl From<String> for QuestionKind {
    fn from(s: String) -> Self {
        QuestionKind::from(s.as_str())
    }
}

impl From<QuestionKind> for String {
    fn from(kind: QuestionKind) -> Self {
        kind.as_str().to_string()
    }
}

/// A single question of a form schema.
///
/// Configuration fields are advisory to the submission validator only;
/// aggregation never rejects an answer because of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// Identifier, unique within the form.
    pub id: String,
    /// Human readable label.
    pub label: String,
    /// Question type tag.
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    /// Whether an answer must be supplied.
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    /// Minimum text length in characters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<i64>,
    /// Maximum text length in characters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<i64>,
    /// Declared option labels for choice and checkbox questions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_checked: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_checked: Option<i64>,
    /// Rating scale upper bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<i64>,
    /// Rating lower bound accepted on submission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
}

impl Question {
    /// Creates a question with no type-specific configuration.
    pub fn new(id: impl Into<String>, label: impl Into<String>, kind: QuestionKind) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
            required: false,
            placeholder: None,
            min_length: None,
            max_length: None,
            options: Vec::new(),
            min_checked: None,
            max_checked: None,
            scale: None,
            min: None,
        }
    }

    /// Builder: set declared options.
    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: set the rating scale.
    pub fn with_scale(mut self, scale: i64) -> Self {
        self.scale = Some(scale);
        self
    }

    /// Builder: mark as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// A form: its schema plus the response metadata maintained by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Form {
    pub id: String,
    pub title: String,
    /// Ordered question list.
    pub fields: Vec<Question>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Number of accepted submissions.
    #[serde(default)]
    pub response_count: i64,
    /// Time of the most recent accepted submission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_response_at: Option<DateTime<Utc>>,
}

impl Form {
    /// Freshness marker in epoch milliseconds, 0 if the form never received a response.
    pub fn last_response_ms(&self) -> i64 {
        self.last_response_at
            .map(|at| at.timestamp_millis())
            .unwrap_or(0)
    }
}

/// Payload used to create or replace a form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormPayload {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub fields: Vec<Question>,
}

/// One stored submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub id: String,
    pub form_id: String,
    pub submitted_at: DateTime<Utc>,
    /// Raw answers keyed by question id.
    pub answers: BTreeMap<String, Value>,
}

/// An answer value decoded according to its question's type.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerValue {
    Text(String),
    Choice(String),
    Selections(Vec<String>),
    Numeric(f64),
    /// Present, but of a shape the question type cannot use.
    Unrecognized,
}

impl AnswerValue {
    /// Decode a raw stored value for a question of the given kind.
    pub fn decode(kind: &QuestionKind, raw: &Value) -> Self {
        match (kind, raw) {
            (QuestionKind::Choice, Value::String(s)) => AnswerValue::Choice(s.clone()),
            (QuestionKind::MultiSelect, Value::Array(items)) => AnswerValue::Selections(
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(String::from))
                    .collect(),
            ),
            (QuestionKind::Rating, Value::Number(n)) => match n.as_f64() {
                Some(v) => AnswerValue::Numeric(v),
                None => AnswerValue::Unrecognized,
            },
            (QuestionKind::Text | QuestionKind::Other(_), Value::String(s)) => {
                AnswerValue::Text(s.clone())
            }
            _ => AnswerValue::Unrecognized,
        }
    }
}

/// A (label, count) pair in a distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    pub label: String,
    pub value: usize,
}

impl Bar {
    pub fn new(label: impl Into<String>, value: usize) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

/// Aggregated view of one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSummary {
    pub field_id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    /// Short textual description of the distribution kind.
    pub summary: String,
    pub bars: Vec<Bar>,
    /// Rating mean, or mean selections for checkboxes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average: Option<f64>,
    /// Effective rating scale.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    /// Records that supplied any value for this question.
    #[serde(rename = "responseN")]
    pub response_n: usize,
}

/// The computed aggregate of all records against a form schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionSnapshot {
    pub form_id: String,
    pub response_count: i64,
    pub last_response_ms: i64,
    pub per_field: Vec<QuestionSummary>,
}

/// Body returned by the long-poll endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LongPollResponse {
    /// Nothing new yet; retry with this marker as the baseline.
    #[serde(rename_all = "camelCase")]
    Timeout { timeout: bool, last_response_ms: i64 },
    Snapshot(DistributionSnapshot),
}

impl LongPollResponse {
    pub fn timeout(last_response_ms: i64) -> Self {
        LongPollResponse::Timeout {
            timeout: true,
            last_response_ms,
        }
    }
}
