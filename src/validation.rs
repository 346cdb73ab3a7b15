//! Form and submission validation.
//!
//! These rules guard the write path only. Aggregation tolerates whatever
//! ends up stored.

use crate::error::FormError;
use crate::models::{Form, FormPayload, Question, QuestionKind};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Validate a single question's configuration.
pub fn validate_field(field: &Question) -> Result<(), FormError> {
    if field.id.is_empty() || field.label.is_empty() || field.kind.as_str().is_empty() {
        return Err(FormError::IncompleteField);
    }

    match &field.kind {
        QuestionKind::Text => {
            if field.min_length.is_some_and(|n| n < 0) {
                return Err(FormError::InvalidBound("minLength must be >= 0"));
            }
            if field.max_length.is_some_and(|n| n < 0) {
                return Err(FormError::InvalidBound("maxLength must be >= 0"));
            }
            if let (Some(min), Some(max)) = (field.min_length, field.max_length) {
                if min > max {
                    return Err(FormError::InvalidBound("minLength cannot exceed maxLength"));
                }
            }
        }
        QuestionKind::Choice => {
            if field.options.is_empty() {
                return Err(FormError::MissingOptions {
                    kind: field.kind.to_string(),
                });
            }
        }
        QuestionKind::MultiSelect => {
            if field.options.is_empty() {
                return Err(FormError::MissingOptions {
                    kind: field.kind.to_string(),
                });
            }
            if field.min_checked.is_some_and(|n| n < 0) {
                return Err(FormError::InvalidBound("minChecked must be >= 0"));
            }
            if field.max_checked.is_some_and(|n| n < 0) {
                return Err(FormError::InvalidBound("maxChecked must be >= 0"));
            }
            if let (Some(min), Some(max)) = (field.min_checked, field.max_checked) {
                if min > max {
                    return Err(FormError::InvalidBound("minChecked cannot exceed maxChecked"));
                }
            }
        }
        QuestionKind::Rating => {
            let scale = field.scale.unwrap_or(5);
            if !(1..=10).contains(&scale) {
                return Err(FormError::InvalidBound("rating scale must be 1..10"));
            }
            if field.min.is_some_and(|n| n < 0) {
                return Err(FormError::InvalidBound("rating min must be >= 0"));
            }
        }
        QuestionKind::Other(tag) => return Err(FormError::UnknownType(tag.clone())),
    }

    Ok(())
}

/// Validate a complete form payload.
pub fn validate_form(payload: &FormPayload) -> Result<(), FormError> {
    if payload.title.trim().is_empty() {
        return Err(FormError::MissingTitle);
    }
    if payload.fields.is_empty() {
        return Err(FormError::NoFields);
    }

    let mut seen = HashSet::new();
    for field in &payload.fields {
        validate_field(field)?;
        if !seen.insert(field.id.as_str()) {
            return Err(FormError::DuplicateFieldId(field.id.clone()));
        }
    }

    Ok(())
}

fn char_len(s: &str) -> i64 {
    s.chars().count() as i64
}

/// Check a required field has a usable value. Returns false when missing.
fn satisfies_required(kind: &QuestionKind, value: Option<&Value>) -> bool {
    match (kind, value) {
        (QuestionKind::Text, Some(Value::String(s))) => !s.trim().is_empty(),
        (QuestionKind::Choice, Some(Value::String(s))) => !s.is_empty(),
        (QuestionKind::MultiSelect, Some(Value::Array(items))) => !items.is_empty(),
        (QuestionKind::Rating, Some(Value::Number(_))) => true,
        (QuestionKind::Other(_), _) => true,
        _ => false,
    }
}

/// Type-specific rule for a present value. Returns the error message, if any.
fn check_value(field: &Question, value: &Value) -> Option<&'static str> {
    match &field.kind {
        QuestionKind::Text => {
            let len = char_len(value.as_str().unwrap_or(""));
            let mut error = None;
            if field.min_length.is_some_and(|min| len < min) {
                error = Some("Min length not met");
            }
            if field.max_length.is_some_and(|max| len > max) {
                error = Some("Max length exceeded");
            }
            error
        }
        QuestionKind::Choice => {
            if field.options.is_empty() {
                return None;
            }
            let selected = value.as_str().unwrap_or("");
            (!field.options.iter().any(|o| o == selected)).then_some("Invalid option")
        }
        QuestionKind::MultiSelect => {
            if field.options.is_empty() {
                return None;
            }
            let items = value.as_array().map(Vec::as_slice).unwrap_or(&[]);
            let mut error = None;
            let mut count = 0i64;
            for item in items.iter().filter_map(Value::as_str) {
                if field.options.iter().any(|o| o == item) {
                    count += 1;
                } else {
                    error = Some("Invalid option");
                    break;
                }
            }
            if field.min_checked.is_some_and(|min| count < min) {
                error = Some("Below min selections");
            }
            if field.max_checked.is_some_and(|max| count > max) {
                error = Some("Above max selections");
            }
            error
        }
        QuestionKind::Rating => {
            let Some(number) = value.as_f64() else {
                return Some("Invalid rating");
            };
            let scale = field.scale.unwrap_or(5);
            let min = field.min.unwrap_or(0);
            let level = number.trunc() as i64;
            (level < min || level > scale).then_some("Out of range")
        }
        QuestionKind::Other(_) => None,
    }
}

/// Validate submitted answers against a form schema.
///
/// Returns one message per offending field id; an empty map means valid.
pub fn validate_answers(form: &Form, answers: &BTreeMap<String, Value>) -> BTreeMap<String, String> {
    let mut errors = BTreeMap::new();

    for field in &form.fields {
        let value = answers.get(&field.id);

        if field.required && !satisfies_required(&field.kind, value) {
            errors.insert(field.id.clone(), "Required".to_string());
            continue;
        }

        if let Some(message) = value.and_then(|v| check_value(field, v)) {
            errors.insert(field.id.clone(), message.to_string());
        }
    }

    errors
}
