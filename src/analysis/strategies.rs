//! Per-type aggregation strategies.
//!
//! Each strategy turns the decoded answer values supplied for one
//! question into bars plus optional scalar metrics. Strategies never
//! fail: malformed values are ignored, clamped or coerced.

use crate::models::{AnswerValue, Bar, Question, QuestionKind};

/// Default rating scale used when the declared scale is missing or out of range.
pub const DEFAULT_SCALE: u32 = 5;

/// Largest accepted rating scale.
pub const MAX_SCALE: u32 = 10;

/// Label of the bucket collecting undeclared choice answers.
pub const OTHER_LABEL: &str = "Other";

/// Fixed text-length bins: (label, inclusive lower bound, inclusive upper bound).
const TEXT_BINS: [(&str, usize, usize); 5] = [
    ("0–20", 0, 20),
    ("21–50", 21, 50),
    ("51–100", 51, 100),
    ("101–200", 101, 200),
    ("200+", 201, usize::MAX),
];

/// Output of a strategy, before it is attached to a question.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    pub summary: &'static str,
    pub bars: Vec<Bar>,
    pub average: Option<f64>,
    pub scale: Option<u32>,
}

/// The closed set of aggregation strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Choice,
    MultiSelect,
    Rating,
    Text,
}

impl Strategy {
    /// Select the strategy for a question type. Unknown tags use `Text`.
    pub fn for_kind(kind: &QuestionKind) -> Self {
        match kind {
            QuestionKind::Choice => Strategy::Choice,
            QuestionKind::MultiSelect => Strategy::MultiSelect,
            QuestionKind::Rating => Strategy::Rating,
            QuestionKind::Text | QuestionKind::Other(_) => Strategy::Text,
        }
    }

    /// Run the strategy over the values supplied for `question`.
    pub fn apply(self, question: &Question, values: &[AnswerValue]) -> Distribution {
        match self {
            Strategy::Choice => choice(&question.options, values),
            Strategy::MultiSelect => multi_select(&question.options, values),
            Strategy::Rating => rating(question.scale, values),
            Strategy::Text => text(values),
        }
    }
}

/// Single select: one bucket per declared option, plus "Other" when non-empty.
pub fn choice(options: &[String], values: &[AnswerValue]) -> Distribution {
    let mut counts = vec![0usize; options.len()];
    let mut other = 0usize;

    for value in values {
        let selected = match value {
            AnswerValue::Choice(s) | AnswerValue::Text(s) => s,
            _ => continue,
        };
        match options.iter().position(|o| o == selected) {
            Some(idx) => counts[idx] += 1,
            None => other += 1,
        }
    }

    let mut bars: Vec<Bar> = options
        .iter()
        .zip(counts)
        .map(|(label, count)| Bar::new(label.as_str(), count))
        .collect();
    if other > 0 {
        bars.push(Bar::new(OTHER_LABEL, other));
    }

    Distribution {
        summary: "Multiple choice",
        bars,
        average: None,
        scale: None,
    }
}

/// Checkboxes: per-option counts across all selections.
///
/// Only elements naming a declared option count, both toward the bars
/// and toward the mean number of selections per responding record.
pub fn multi_select(options: &[String], values: &[AnswerValue]) -> Distribution {
    let mut counts = vec![0usize; options.len()];
    let mut total_selected = 0usize;

    for value in values {
        let AnswerValue::Selections(items) = value else {
            continue;
        };
        for item in items {
            if let Some(idx) = options.iter().position(|o| o == item) {
                counts[idx] += 1;
                total_selected += 1;
            }
        }
    }

    let response_n = values.len();
    let average = (response_n > 0).then(|| total_selected as f64 / response_n as f64);

    Distribution {
        summary: "Checkboxes",
        bars: options
            .iter()
            .zip(counts)
            .map(|(label, count)| Bar::new(label.as_str(), count))
            .collect(),
        average,
        scale: None,
    }
}

/// Resolve the effective rating scale from the declared one.
pub fn effective_scale(declared: Option<i64>) -> u32 {
    match declared {
        Some(s) if (1..=MAX_SCALE as i64).contains(&s) => s as u32,
        _ => DEFAULT_SCALE,
    }
}

/// Round half-up and clamp into `[1, scale]`. Non-finite values are rejected.
fn rating_level(value: f64, scale: u32) -> Option<u32> {
    if !value.is_finite() {
        return None;
    }
    let rounded = (value + 0.5).floor();
    Some(rounded.clamp(1.0, scale as f64) as u32)
}

/// Numeric rating: one bucket per level `1..=scale` and the mean level.
pub fn rating(declared_scale: Option<i64>, values: &[AnswerValue]) -> Distribution {
    let scale = effective_scale(declared_scale);
    let mut buckets = vec![0usize; scale as usize];
    let mut sum = 0.0;
    let mut n = 0usize;

    for value in values {
        let AnswerValue::Numeric(v) = value else {
            continue;
        };
        if let Some(level) = rating_level(*v, scale) {
            buckets[(level - 1) as usize] += 1;
            sum += level as f64;
            n += 1;
        }
    }

    Distribution {
        summary: "Rating",
        bars: buckets
            .into_iter()
            .enumerate()
            .map(|(i, count)| Bar::new((i + 1).to_string(), count))
            .collect(),
        average: (n > 0).then(|| sum / n as f64),
        scale: Some(scale),
    }
}

/// Free text: distribution of answer lengths in Unicode codepoints.
pub fn text(values: &[AnswerValue]) -> Distribution {
    let mut counts = [0usize; TEXT_BINS.len()];

    for value in values {
        let len = match value {
            AnswerValue::Text(s) | AnswerValue::Choice(s) => s.chars().count(),
            _ => 0,
        };
        if let Some(idx) = TEXT_BINS
            .iter()
            .position(|(_, lo, hi)| (*lo..=*hi).contains(&len))
        {
            counts[idx] += 1;
        }
    }

    Distribution {
        summary: "Text",
        bars: TEXT_BINS
            .iter()
            .zip(counts)
            .map(|((label, _, _), count)| Bar::new(*label, count))
            .collect(),
        average: None,
        scale: None,
    }
}
