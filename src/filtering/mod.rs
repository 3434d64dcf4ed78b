// Tier filter over triage records
//
// Pure view over a record slice: never mutates, always preserves the
// server's relative order.

mod types;

pub use types::{FilterStats, TierFilter};

use crate::ingestion::QuestionRecord;
use std::time::Instant;

/// Records matching `filter`, in original order
pub fn filter_questions<'a>(
    questions: &'a [QuestionRecord],
    filter: &TierFilter,
) -> Vec<&'a QuestionRecord> {
    questions.iter().filter(|q| filter.matches(q)).collect()
}

/// Same as [`filter_questions`] but also reports counts for logging
pub fn filter_with_stats<'a>(
    questions: &'a [QuestionRecord],
    filter: &TierFilter,
) -> (Vec<&'a QuestionRecord>, FilterStats) {
    let start = Instant::now();
    let kept = filter_questions(questions, filter);

    let stats = FilterStats {
        filter: *filter,
        input_records: questions.len(),
        output_records: kept.len(),
        processing_time_us: start.elapsed().as_micros() as u64,
    };
    tracing::debug!(
        filter = %stats.filter,
        input = stats.input_records,
        output = stats.output_records,
        "Applied tier filter"
    );

    (kept, stats)
}
