//! Triage store
//!
//! Owns the current [`BatchResult`] and the reviewer's selection. Every
//! operation builds a complete new [`TriageState`] and publishes it as an
//! immutable snapshot over a `tokio::sync::watch` channel, so readers never
//! observe a half-applied change. Consumers subscribe; they never mutate.

use ahash::{HashSet, HashSetExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

use crate::confidence::Tier;
use crate::filtering::TierFilter;
use crate::ingestion::{ingest_batch, BatchPayload, Feedback, QuestionRecord};

/// Aggregate tier counts. `Unknown` records are not counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TierCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl TierCounts {
    /// Fold over the tiers of `questions`
    pub fn from_records(questions: &[QuestionRecord]) -> Self {
        questions
            .iter()
            .fold(TierCounts::default(), |mut counts, q| {
                match q.confidence_tier {
                    Tier::High => counts.high += 1,
                    Tier::Medium => counts.medium += 1,
                    Tier::Low => counts.low += 1,
                    Tier::Unknown => {}
                }
                counts
            })
    }

    /// Medium plus low: answers a reviewer should look at
    pub fn needs_review(&self) -> usize {
        self.medium + self.low
    }
}

/// Full normalized output of one questionnaire submission.
///
/// Aggregates are derived from `questions` in [`BatchResult::from_records`]
/// and cannot be set independently.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResult {
    total_questions: usize,
    answered_questions: usize,
    tier_counts: TierCounts,
    questions: Vec<QuestionRecord>,
}

impl BatchResult {
    /// Build from records, deriving every aggregate
    pub fn from_records(questions: Vec<QuestionRecord>) -> Self {
        Self {
            total_questions: questions.len(),
            answered_questions: questions.iter().filter(|q| q.is_answered()).count(),
            tier_counts: TierCounts::from_records(&questions),
            questions,
        }
    }

    pub fn total_questions(&self) -> usize {
        self.total_questions
    }

    pub fn answered_questions(&self) -> usize {
        self.answered_questions
    }

    pub fn tier_counts(&self) -> TierCounts {
        self.tier_counts
    }

    pub fn questions(&self) -> &[QuestionRecord] {
        &self.questions
    }

    pub fn record(&self, id: &str) -> Option<&QuestionRecord> {
        self.questions.iter().find(|q| q.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.record(id).is_some()
    }

    /// Copy with feedback applied to `ids`; aggregates recomputed
    fn with_feedback(&self, ids: impl Fn(&str) -> bool, verdict: Feedback) -> Self {
        let questions = self
            .questions
            .iter()
            .map(|q| {
                let mut q = q.clone();
                if ids(&q.id) {
                    q.feedback = Some(verdict);
                }
                q
            })
            .collect();
        Self::from_records(questions)
    }
}

/// One immutable snapshot of the store
#[derive(Debug, Clone, Default)]
pub struct TriageState {
    batch: Option<Arc<BatchResult>>,
    selection: HashSet<String>,
}

impl TriageState {
    pub fn batch(&self) -> Option<&BatchResult> {
        self.batch.as_deref()
    }

    /// Records of the loaded batch, empty when none is loaded
    pub fn records(&self) -> &[QuestionRecord] {
        self.batch
            .as_deref()
            .map(|b| b.questions.as_slice())
            .unwrap_or(&[])
    }

    pub fn tier_counts(&self) -> TierCounts {
        self.batch
            .as_deref()
            .map(|b| b.tier_counts)
            .unwrap_or_default()
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selection.contains(id)
    }

    /// Selected ids in record order
    pub fn selected_ids(&self) -> Vec<&str> {
        self.records()
            .iter()
            .filter(|q| self.selection.contains(&q.id))
            .map(|q| q.id.as_str())
            .collect()
    }

    pub fn selection_len(&self) -> usize {
        self.selection.len()
    }

    /// Selected ids that are visible under `filter`
    pub fn selected_in(&self, filter: &TierFilter) -> Vec<&str> {
        self.records()
            .iter()
            .filter(|q| filter.matches(q) && self.selection.contains(&q.id))
            .map(|q| q.id.as_str())
            .collect()
    }

    /// Records a reviewer approved
    pub fn approved_records(&self) -> Vec<&QuestionRecord> {
        self.records()
            .iter()
            .filter(|q| q.feedback == Some(Feedback::Approved))
            .collect()
    }
}

/// Store owning the current triage state
pub struct TriageStore {
    tx: watch::Sender<Arc<TriageState>>,
}

impl Default for TriageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TriageStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(TriageState::default()));
        Self { tx }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Arc<TriageState> {
        self.tx.borrow().clone()
    }

    /// Receive every future snapshot
    pub fn subscribe(&self) -> watch::Receiver<Arc<TriageState>> {
        self.tx.subscribe()
    }

    /// Replace the whole batch with a freshly ingested payload and clear the
    /// selection
    pub fn set_results(&self, payload: &BatchPayload) -> Arc<TriageState> {
        let batch = BatchResult::from_records(ingest_batch(payload));
        tracing::info!(
            total = batch.total_questions,
            answered = batch.answered_questions,
            high = batch.tier_counts.high,
            medium = batch.tier_counts.medium,
            low = batch.tier_counts.low,
            "Batch results loaded"
        );

        let batch = Arc::new(batch);
        self.update(|_| {
            Some(TriageState {
                batch: Some(batch),
                selection: HashSet::new(),
            })
        })
    }

    /// Record a verdict on one answer. No-op when `id` is unknown.
    pub fn set_feedback(&self, id: &str, verdict: Feedback) -> Arc<TriageState> {
        self.update(|current| {
            let batch = current.batch()?;
            if !batch.contains(id) {
                tracing::debug!(id, "Feedback for unknown question ignored");
                return None;
            }

            tracing::debug!(id, verdict = verdict.as_str(), "Feedback recorded");
            Some(TriageState {
                batch: Some(Arc::new(batch.with_feedback(|qid| qid == id, verdict))),
                selection: current.selection.clone(),
            })
        })
    }

    /// Apply one verdict to every selected answer in a single replacement
    pub fn set_feedback_for_selection(&self, verdict: Feedback) -> Arc<TriageState> {
        self.update(|current| {
            let batch = current.batch()?;
            if current.selection.is_empty() {
                return None;
            }

            tracing::info!(
                count = current.selection.len(),
                verdict = verdict.as_str(),
                "Feedback applied to selection"
            );
            let updated = batch.with_feedback(|qid| current.selection.contains(qid), verdict);
            Some(TriageState {
                batch: Some(Arc::new(updated)),
                selection: current.selection.clone(),
            })
        })
    }

    /// Flip selection of `id`. Ids absent from the batch are ignored.
    pub fn toggle_selection(&self, id: &str) -> Arc<TriageState> {
        self.update(|current| {
            if !current.batch().is_some_and(|b| b.contains(id)) {
                return None;
            }

            let mut selection = current.selection.clone();
            if !selection.remove(id) {
                selection.insert(id.to_string());
            }
            Some(TriageState {
                batch: current.batch.clone(),
                selection,
            })
        })
    }

    /// Add every known id in `ids` to the selection
    pub fn select_all<I, S>(&self, ids: I) -> Arc<TriageState>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.update(|current| {
            let batch = current.batch()?;

            let mut selection = current.selection.clone();
            for id in ids {
                let id = id.as_ref();
                if batch.contains(id) {
                    selection.insert(id.to_string());
                }
            }
            Some(TriageState {
                batch: current.batch.clone(),
                selection,
            })
        })
    }

    pub fn clear_selection(&self) -> Arc<TriageState> {
        self.update(|current| {
            Some(TriageState {
                batch: current.batch.clone(),
                selection: HashSet::new(),
            })
        })
    }

    /// Drop the batch and the selection
    pub fn reset(&self) -> Arc<TriageState> {
        tracing::info!("Triage state reset");
        self.update(|_| Some(TriageState::default()))
    }

    /// Derive the next state from the current one and publish it, all under
    /// the channel's write lock. `None` leaves the state untouched and
    /// notifies nobody. Returns the state this call left in place.
    fn update(&self, next: impl FnOnce(&TriageState) -> Option<TriageState>) -> Arc<TriageState> {
        let mut result = None;
        self.tx.send_if_modified(|current| match next(&**current) {
            Some(state) => {
                let state = Arc::new(state);
                *current = state.clone();
                result = Some(state);
                true
            }
            None => {
                result = Some(current.clone());
                false
            }
        });
        result.unwrap_or_else(|| self.snapshot())
    }
}
