//! Ingestion of backend batch responses
//!
//! Turns each raw question item into a normalized [`QuestionRecord`]:
//! - answers go through the staged parser in [`answer`]
//! - confidence is captured as a [`ConfidenceInput`] and classified
//! - references are normalized to an ordered list
//! - missing ids are filled positionally and duplicates made unique

mod answer;
mod types;

pub use answer::{parse_answer, parse_answer_str, value_text};
pub use types::{
    BatchPayload, Feedback, ParseStage, ParsedAnswer, QuestionRecord, RawQuestion,
};

use ahash::{HashMap, HashMapExt, HashSet, HashSetExt};
use serde_json::Value;

use crate::confidence::{classify, ConfidenceInput};

/// Normalize one raw item. `position` is its zero-based index in the batch.
pub fn ingest_record(raw: &RawQuestion, position: usize) -> QuestionRecord {
    let parsed = parse_answer(raw.suggested_answer.as_ref());
    let confidence_raw = ConfidenceInput::from_value(raw.confidence_value());
    let confidence_tier = classify(&confidence_raw);

    let id = raw
        .id
        .as_ref()
        .map(value_text)
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| format!("Q{}", position + 1));

    if parsed.stage == ParseStage::PatternMatch {
        tracing::warn!(id = %id, "Answer text recovered by pattern match");
    } else {
        tracing::debug!(id = %id, stage = parsed.stage.number(), "Answer normalized");
    }

    QuestionRecord {
        id,
        question_text: raw.question.as_ref().map(value_text).unwrap_or_default(),
        raw_answer: raw.suggested_answer.clone().unwrap_or(Value::Null),
        normalized_answer_text: parsed.text,
        answer_stage: parsed.stage,
        confidence_raw,
        confidence_tier,
        references: normalize_references(raw.references.as_ref()),
        feedback: None,
        all_matches: normalize_references(raw.all_matches.as_ref()),
    }
}

/// Normalize a whole batch payload, preserving server order.
///
/// Items that are not JSON objects are treated as bare answers. Duplicate ids
/// get a `-2`, `-3`, ... suffix so ids stay unique within the batch.
pub fn ingest_batch(payload: &BatchPayload) -> Vec<QuestionRecord> {
    let mut records: Vec<QuestionRecord> = payload
        .results
        .iter()
        .enumerate()
        .map(|(position, item)| ingest_record(&raw_from_value(item, position), position))
        .collect();

    make_ids_unique(&mut records);
    records
}

fn raw_from_value(item: &Value, position: usize) -> RawQuestion {
    match serde_json::from_value::<RawQuestion>(item.clone()) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(position, "Batch item is not a question object: {}", e);
            RawQuestion {
                suggested_answer: Some(item.clone()),
                ..RawQuestion::default()
            }
        }
    }
}

fn make_ids_unique(records: &mut [QuestionRecord]) {
    let mut seen: HashSet<String> = HashSet::with_capacity(records.len());
    let mut next_suffix: HashMap<String, usize> = HashMap::new();

    for record in records.iter_mut() {
        if seen.insert(record.id.clone()) {
            continue;
        }

        let base = record.id.clone();
        let suffix = next_suffix.entry(base.clone()).or_insert(2);
        let mut candidate = format!("{}-{}", base, suffix);
        while seen.contains(&candidate) {
            *suffix += 1;
            candidate = format!("{}-{}", base, suffix);
        }
        *suffix += 1;

        tracing::warn!(original = %base, renamed = %candidate, "Duplicate question id");
        seen.insert(candidate.clone());
        record.id = candidate;
    }
}

/// Normalize a `references` value: string -> one element, array -> in order,
/// absent or null -> empty
pub fn normalize_references(raw: Option<&Value>) -> Vec<String> {
    match raw {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter(|item| !item.is_null())
            .map(value_text)
            .collect(),
        Some(other) => vec![other.to_string()],
    }
}
