//! Batch submission workflow
//!
//! Uploads a questionnaire through a [`QaBackend`], parses the reply into the
//! [`TriageStore`] and surfaces failures as a transient [`Notification`]. Only
//! one submission may be outstanding at a time. A completion that arrives
//! after its view has been retired is dropped without touching the store.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::client::{QaBackend, Upload};
use crate::error::{Result, TriageError};
use crate::triage::{TriageState, TriageStore};

/// Liveness token for the view that started a submission
#[derive(Debug, Clone)]
pub struct ViewHandle {
    alive: Arc<AtomicBool>,
}

impl ViewHandle {
    pub fn new() -> Self {
        Self {
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Mark the view as torn down; pending completions will be discarded
    pub fn retire(&self) {
        self.alive.store(false, Ordering::Release);
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}

impl Default for ViewHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Error,
}

/// Transient user-visible message
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub raised_at: DateTime<Utc>,
    pub dismiss_after: Duration,
}

impl Notification {
    pub fn expires_at(&self) -> DateTime<Utc> {
        let after = chrono::Duration::from_std(self.dismiss_after)
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.raised_at + after
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at()
    }
}

/// What happened to a completed submission
#[derive(Debug, Clone)]
pub enum SubmissionOutcome {
    /// Results were parsed into the store
    Applied(Arc<TriageState>),
    /// The view was retired before the reply arrived
    Discarded,
}

/// Clears the in-flight flag on every exit path
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| TriageError::SubmissionInFlight)?;
        Ok(Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Drives batch submissions for one view
pub struct SubmissionController<B> {
    backend: B,
    store: Arc<TriageStore>,
    view: ViewHandle,
    in_flight: AtomicBool,
    dismiss_after: Duration,
    notification: Mutex<Option<Notification>>,
    last_error: Mutex<Option<String>>,
}

impl<B: QaBackend + Sync> SubmissionController<B> {
    pub fn new(
        backend: B,
        store: Arc<TriageStore>,
        view: ViewHandle,
        dismiss_after: Duration,
    ) -> Self {
        Self {
            backend,
            store,
            view,
            in_flight: AtomicBool::new(false),
            dismiss_after,
            notification: Mutex::new(None),
            last_error: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<TriageStore> {
        &self.store
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Upload `upload` and replace the store's batch with the answers
    ///
    /// Fails with [`TriageError::SubmissionInFlight`] while another call is
    /// outstanding. On failure the previous batch is left in place.
    pub async fn submit(&self, upload: &Upload) -> Result<SubmissionOutcome> {
        let _guard = InFlightGuard::acquire(&self.in_flight)?;

        let result = self.backend.submit_batch(upload).await;

        if !self.view.is_alive() {
            tracing::debug!(file = %upload.file_name, "View retired, discarding submission result");
            return result.map(|_| SubmissionOutcome::Discarded);
        }

        match result {
            Ok(payload) => {
                let state = self.store.set_results(&payload);
                *lock(&self.last_error) = None;
                let total = state.records().len();
                self.notify(
                    NotificationLevel::Info,
                    format!("Processed {} questions from {}", total, upload.file_name),
                );
                Ok(SubmissionOutcome::Applied(state))
            }
            Err(e) => {
                tracing::error!(file = %upload.file_name, error = %e, "Questionnaire submission failed");
                *lock(&self.last_error) = Some(e.to_string());
                self.notify(
                    NotificationLevel::Error,
                    format!("Error processing questionnaire: {}", e),
                );
                Err(e)
            }
        }
    }

    /// Error of the most recent failed submission, cleared on success
    pub fn last_error(&self) -> Option<String> {
        lock(&self.last_error).clone()
    }

    /// Current notification, if it has not yet auto-dismissed
    pub fn notification(&self, now: DateTime<Utc>) -> Option<Notification> {
        let mut slot = lock(&self.notification);
        if slot.as_ref().is_some_and(|n| !n.is_active_at(now)) {
            *slot = None;
        }
        slot.clone()
    }

    pub fn dismiss_notification(&self) {
        *lock(&self.notification) = None;
    }

    fn notify(&self, level: NotificationLevel, message: String) {
        *lock(&self.notification) = Some(Notification {
            level,
            message,
            raised_at: Utc::now(),
            dismiss_after: self.dismiss_after,
        });
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{HistoryCommand, HistoryReply, QueryResponse};
    use crate::ingestion::BatchPayload;
    use serde_json::json;
    use tokio::sync::Notify;

    enum Reply {
        Batch(BatchPayload),
        Status(u16),
    }

    struct FakeBackend {
        reply: Reply,
        gate: Option<Arc<Notify>>,
    }

    impl QaBackend for FakeBackend {
        async fn submit_batch(&self, _upload: &Upload) -> Result<BatchPayload> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            match &self.reply {
                Reply::Batch(payload) => Ok(payload.clone()),
                Reply::Status(status) => Err(TriageError::Server {
                    status: *status,
                    body: "boom".to_string(),
                }),
            }
        }

        async fn ask(&self, _message: &str) -> Result<QueryResponse> {
            Ok(QueryResponse::default())
        }

        async fn history(&self, _command: &HistoryCommand) -> Result<HistoryReply> {
            Ok(HistoryReply::Status("ok".to_string()))
        }
    }

    fn payload() -> BatchPayload {
        BatchPayload {
            message: None,
            results: vec![
                json!({"id": "Q1", "question": "MFA?", "suggestedAnswer": {"text": "Yes"}, "confidence_score": 95}),
                json!({"id": "Q2", "question": "DLP?", "suggestedAnswer": {"text": "No"}, "confidence_score": 30}),
            ],
        }
    }

    fn upload() -> Upload {
        Upload {
            file_name: "vendor.csv".to_string(),
            bytes: b"Question\nMFA?".to_vec(),
        }
    }

    fn controller(reply: Reply, gate: Option<Arc<Notify>>) -> SubmissionController<FakeBackend> {
        SubmissionController::new(
            FakeBackend { reply, gate },
            Arc::new(TriageStore::new()),
            ViewHandle::new(),
            Duration::from_secs(3),
        )
    }

    #[tokio::test]
    async fn test_success_applies_results() {
        let c = controller(Reply::Batch(payload()), None);
        let outcome = c.submit(&upload()).await.unwrap();

        match outcome {
            SubmissionOutcome::Applied(state) => assert_eq!(state.records().len(), 2),
            SubmissionOutcome::Discarded => panic!("expected results to be applied"),
        }
        assert!(!c.is_submitting());
        assert_eq!(c.store().snapshot().tier_counts().low, 1);
        assert!(c.last_error().is_none());
    }

    #[tokio::test]
    async fn test_resubmission_blocked_while_in_flight() {
        let gate = Arc::new(Notify::new());
        let c = controller(Reply::Batch(payload()), Some(gate.clone()));
        let up = upload();

        let first = c.submit(&up);
        let second = async {
            tokio::task::yield_now().await;
            assert!(c.is_submitting());
            let result = c.submit(&up).await;
            gate.notify_one();
            result
        };
        let (first, second) = tokio::join!(first, second);

        assert!(first.is_ok());
        assert!(matches!(second, Err(TriageError::SubmissionInFlight)));
        assert!(!c.is_submitting());
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_batch_and_notifies() {
        let c = controller(Reply::Status(500), None);
        c.store().set_results(&payload());

        let err = c.submit(&upload()).await.unwrap_err();
        assert!(matches!(err, TriageError::Server { status: 500, .. }));
        assert!(!c.is_submitting());
        assert_eq!(c.store().snapshot().records().len(), 2);

        let now = Utc::now();
        let note = c.notification(now).unwrap();
        assert_eq!(note.level, NotificationLevel::Error);
        assert!(c.last_error().unwrap().contains("500"));

        assert!(c.notification(now + chrono::Duration::seconds(4)).is_none());
        assert!(c.notification(now).is_none());
    }

    #[tokio::test]
    async fn test_retired_view_is_not_updated() {
        let gate = Arc::new(Notify::new());
        let c = controller(Reply::Batch(payload()), Some(gate.clone()));
        let up = upload();

        let submit = c.submit(&up);
        let teardown = async {
            tokio::task::yield_now().await;
            c.view.retire();
            gate.notify_one();
        };
        let (outcome, _) = tokio::join!(submit, teardown);

        assert!(matches!(outcome.unwrap(), SubmissionOutcome::Discarded));
        assert!(c.store().snapshot().batch().is_none());
        assert!(c.notification(Utc::now()).is_none());
        assert!(!c.is_submitting());
    }

    #[test]
    fn test_notification_expiry() {
        let raised_at = Utc::now();
        let note = Notification {
            level: NotificationLevel::Info,
            message: "done".to_string(),
            raised_at,
            dismiss_after: Duration::from_millis(3000),
        };
        assert!(note.is_active_at(raised_at + chrono::Duration::milliseconds(2999)));
        assert!(!note.is_active_at(raised_at + chrono::Duration::milliseconds(3000)));
    }
}
