//! Snapshot aggregation.
//!
//! This module groups the answers of every record by question id and
//! runs the matching strategy for each question of the form schema.

use crate::analysis::strategies::Strategy;
use crate::models::{AnswerRecord, AnswerValue, DistributionSnapshot, Form, QuestionSummary};
use serde_json::Value;
use std::collections::HashMap;

/// Group raw answer values by question id.
pub fn group_by_question(records: &[AnswerRecord]) -> HashMap<&str, Vec<&Value>> {
    let mut grouped: HashMap<&str, Vec<&Value>> = HashMap::new();

    for record in records {
        for (question_id, value) in &record.answers {
            grouped.entry(question_id.as_str()).or_default().push(value);
        }
    }

    grouped
}

/// Compute the distribution snapshot of `records` against `form`.
///
/// Pure and total: output depends only on the inputs and malformed answers
/// never produce an error. Response count and freshness marker come from
/// the form record itself.
pub fn compute(form: &Form, records: &[AnswerRecord]) -> DistributionSnapshot {
    let grouped = group_by_question(records);

    let per_field = form
        .fields
        .iter()
        .map(|question| {
            let values: Vec<AnswerValue> = grouped
                .get(question.id.as_str())
                .map(|raw| {
                    raw.iter()
                        .map(|v| AnswerValue::decode(&question.kind, v))
                        .collect()
                })
                .unwrap_or_default();

            let dist = Strategy::for_kind(&question.kind).apply(question, &values);

            QuestionSummary {
                field_id: question.id.clone(),
                label: question.label.clone(),
                kind: question.kind.clone(),
                summary: dist.summary.to_string(),
                bars: dist.bars,
                average: dist.average,
                scale: dist.scale,
                response_n: values.len(),
            }
        })
        .collect();

    DistributionSnapshot {
        form_id: form.id.clone(),
        response_count: form.response_count,
        last_response_ms: form.last_response_ms(),
        per_field,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Bar, Question, QuestionKind};
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn create_test_form() -> Form {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        Form {
            id: "form-1".to_string(),
            title: "Feedback".to_string(),
            fields: vec![
                Question::new("color", "Favourite colour", QuestionKind::Choice)
                    .with_options(["A", "B"]),
                Question::new("tools", "Tools used", QuestionKind::MultiSelect)
                    .with_options(["X", "Y"]),
                Question::new("score", "Score", QuestionKind::Rating).with_scale(5),
                Question::new("notes", "Notes", QuestionKind::Text),
                Question::new("never", "Never answered", QuestionKind::Choice)
                    .with_options(["A", "B"]),
            ],
            created_at: at,
            updated_at: at,
            response_count: 17,
            last_response_at: Some(at),
        }
    }

    fn record(answers: serde_json::Value) -> AnswerRecord {
        let answers: BTreeMap<String, serde_json::Value> =
            serde_json::from_value(answers).unwrap();
        AnswerRecord {
            id: uuid::Uuid::new_v4().to_string(),
            form_id: "form-1".to_string(),
            submitted_at: Utc::now(),
            answers,
        }
    }

    fn create_test_records() -> Vec<AnswerRecord> {
        vec![
            record(json!({"color": "A", "tools": ["X", "Y"], "score": 1, "notes": ""})),
            record(json!({"color": "A", "tools": ["X"], "score": 5})),
            record(json!({"color": "B", "score": 6, "notes": "x".repeat(250)})),
            record(json!({"color": "X", "tools": "not-a-list", "score": "bad"})),
            record(json!({"score": 3})),
        ]
    }

    #[test]
    fn test_compute_per_field() {
        let snapshot = compute(&create_test_form(), &create_test_records());

        assert_eq!(snapshot.per_field.len(), 5);

        let color = &snapshot.per_field[0];
        assert_eq!(color.response_n, 4);
        assert_eq!(
            color.bars,
            vec![Bar::new("A", 2), Bar::new("B", 1), Bar::new("Other", 1)]
        );

        let tools = &snapshot.per_field[1];
        assert_eq!(tools.response_n, 3);
        assert_eq!(tools.bars, vec![Bar::new("X", 2), Bar::new("Y", 1)]);
        assert_eq!(tools.average, Some(1.0));

        let score = &snapshot.per_field[2];
        assert_eq!(score.response_n, 5);
        assert_eq!(score.average, Some(3.5));
        assert_eq!(score.scale, Some(5));

        let notes = &snapshot.per_field[3];
        assert_eq!(notes.response_n, 2);
        assert_eq!(notes.bars[0].value, 1);
        assert_eq!(notes.bars[4].value, 1);
    }

    #[test]
    fn test_absent_question_has_zero_bars() {
        let snapshot = compute(&create_test_form(), &create_test_records());
        let never = &snapshot.per_field[4];

        assert_eq!(never.response_n, 0);
        assert!(never.bars.iter().all(|b| b.value == 0));
        assert!(never.average.is_none());
    }

    #[test]
    fn test_form_level_counters_come_from_form() {
        let form = create_test_form();
        let snapshot = compute(&form, &create_test_records());

        assert_eq!(snapshot.form_id, "form-1");
        assert_eq!(snapshot.response_count, 17);
        assert_eq!(snapshot.last_response_ms, form.last_response_ms());

        let mut fresh = form.clone();
        fresh.last_response_at = None;
        assert_eq!(compute(&fresh, &[]).last_response_ms, 0);
    }

    #[test]
    fn test_compute_is_deterministic() {
        let form = create_test_form();
        let records = create_test_records();

        let first = serde_json::to_vec(&compute(&form, &records)).unwrap();
        let second = serde_json::to_vec(&compute(&form, &records)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_wire_field_names() {
        let snapshot = compute(&create_test_form(), &create_test_records());
        let json = serde_json::to_value(&snapshot).unwrap();

        assert!(json.get("formId").is_some());
        assert!(json.get("lastResponseMs").is_some());
        let score = &json["perField"][2];
        assert_eq!(score["fieldId"], "score");
        assert_eq!(score["type"], "rating");
        assert_eq!(score["responseN"], 5);
        assert_eq!(score["scale"], 5);
        // Choice questions carry neither average nor scale.
        assert!(json["perField"][0].get("average").is_none());
        assert!(json["perField"][0].get("scale").is_none());
    }

    #[test]
    fn test_unknown_type_uses_text_strategy() {
        let mut form = create_test_form();
        form.fields = vec![Question::new("when", "When", QuestionKind::from("date"))];
        let records = vec![record(json!({"when": "2025-01-01"}))];

        let snapshot = compute(&form, &records);
        let when = &snapshot.per_field[0];
        assert_eq!(when.summary, "Text");
        assert_eq!(when.bars.len(), 5);
        assert_eq!(when.bars[0].value, 1);
    }
}
