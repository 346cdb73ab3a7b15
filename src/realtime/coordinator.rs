//! Long-poll coordination.
//!
//! A request either resolves immediately with a fresh snapshot, waits on
//! the hub until a submission arrives, or times out and tells the caller
//! which freshness marker to retry with.

use crate::analysis::compute;
use crate::error::StoreResult;
use crate::models::{DistributionSnapshot, LongPollResponse};
use crate::realtime::hub::{Hub, WaitOutcome};
use crate::store::FormStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Default wait ceiling for a long-poll request.
pub const DEFAULT_CEILING: Duration = Duration::from_secs(25);

/// Result of a long-poll request.
#[derive(Debug, Clone, PartialEq)]
pub enum LongPollOutcome {
    /// Fresh aggregate.
    Snapshot(DistributionSnapshot),
    /// Nothing new within the ceiling.
    TimedOut { last_response_ms: i64 },
    /// Caller went away; no body is produced.
    Canceled,
}

impl LongPollOutcome {
    /// Wire body for this outcome, `None` when canceled.
    pub fn into_response(self) -> Option<LongPollResponse> {
        match self {
            LongPollOutcome::Snapshot(snapshot) => Some(LongPollResponse::Snapshot(snapshot)),
            LongPollOutcome::TimedOut { last_response_ms } => {
                Some(LongPollResponse::timeout(last_response_ms))
            }
            LongPollOutcome::Canceled => None,
        }
    }
}

/// Orchestrates the store, the hub and the aggregator.
pub struct LongPollCoordinator {
    store: Arc<dyn FormStore>,
    hub: Hub,
}

impl LongPollCoordinator {
    pub fn new(store: Arc<dyn FormStore>, hub: Hub) -> Self {
        Self { store, hub }
    }

    /// Load the form and its records and aggregate them now.
    pub async fn snapshot(&self, form_id: &str) -> StoreResult<DistributionSnapshot> {
        let form = self.store.get_form(form_id).await?;
        let records = self.store.get_records(form_id).await?;
        Ok(compute(&form, &records))
    }

    async fn freshness(&self, form_id: &str) -> StoreResult<i64> {
        Ok(self.store.get_form(form_id).await?.last_response_ms())
    }

    /// Resolve a long-poll request against `baseline_ms`.
    ///
    /// Never registers a ticket when the store is already newer than the
    /// baseline. Fails only with the store's errors (e.g. form not found).
    pub async fn resolve(
        &self,
        form_id: &str,
        baseline_ms: i64,
        ceiling: Duration,
        cancel: &CancellationToken,
    ) -> StoreResult<LongPollOutcome> {
        let current = self.freshness(form_id).await?;
        if current > baseline_ms {
            debug!(form_id, current, baseline_ms, "Baseline stale, answering now");
            return Ok(LongPollOutcome::Snapshot(self.snapshot(form_id).await?));
        }

        let deadline = Instant::now() + ceiling;
        let ticket = self.hub.register(form_id);

        // A submission may have landed between the first check and registering.
        let current = self.freshness(form_id).await?;
        if current > baseline_ms {
            drop(ticket);
            return Ok(LongPollOutcome::Snapshot(self.snapshot(form_id).await?));
        }

        match self.hub.wait(ticket, deadline, cancel).await {
            WaitOutcome::Signaled => {
                debug!(form_id, "Woken by submission, recomputing");
                Ok(LongPollOutcome::Snapshot(self.snapshot(form_id).await?))
            }
            WaitOutcome::TimedOut => Ok(LongPollOutcome::TimedOut {
                last_response_ms: current,
            }),
            WaitOutcome::Canceled => {
                debug!(form_id, "Long-poll canceled by caller");
                Ok(LongPollOutcome::Canceled)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::models::{FormPayload, Question, QuestionKind};
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::collections::BTreeMap;

    async fn setup() -> (Arc<MemoryStore>, Hub, LongPollCoordinator, String) {
        let hub = Hub::new();
        let store = Arc::new(MemoryStore::new(hub.clone()));
        let form = store
            .create_form(FormPayload {
                title: "Poll".to_string(),
                fields: vec![Question::new("q", "Q", QuestionKind::Choice).with_options(["A", "B"])],
            })
            .await
            .unwrap();
        let coordinator = LongPollCoordinator::new(store.clone(), hub.clone());
        (store, hub, coordinator, form.id)
    }

    fn answer(choice: &str) -> BTreeMap<String, serde_json::Value> {
        serde_json::from_value(json!({ "q": choice })).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_baseline_returns_without_registering() {
        let (store, hub, coordinator, form_id) = setup().await;
        store.submit_response(&form_id, answer("A")).await.unwrap();

        let cancel = CancellationToken::new();
        let start = Instant::now();
        let outcome = coordinator
            .resolve(&form_id, 0, DEFAULT_CEILING, &cancel)
            .await
            .unwrap();

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(hub.registrations(), 0);
        assert_eq!(hub.waiter_count(&form_id), 0);
        match outcome {
            LongPollOutcome::Snapshot(snapshot) => {
                assert_eq!(snapshot.response_count, 1);
                assert_eq!(snapshot.per_field[0].bars[0].value, 1);
            }
            other => panic!("expected snapshot, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_with_current_marker() {
        let (store, hub, coordinator, form_id) = setup().await;
        let record = store.submit_response(&form_id, answer("B")).await.unwrap();
        let marker = record.submitted_at.timestamp_millis();

        let cancel = CancellationToken::new();
        let start = Instant::now();
        let outcome = coordinator
            .resolve(&form_id, marker, DEFAULT_CEILING, &cancel)
            .await
            .unwrap();

        assert!(start.elapsed() >= DEFAULT_CEILING);
        assert_eq!(hub.registrations(), 1);
        assert_eq!(
            outcome,
            LongPollOutcome::TimedOut {
                last_response_ms: marker
            }
        );
        assert_eq!(hub.waiter_count(&form_id), 0);
        assert_eq!(
            outcome.into_response(),
            Some(LongPollResponse::timeout(marker))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_submission_wakes_waiter() {
        let (store, _hub, coordinator, form_id) = setup().await;
        let cancel = CancellationToken::new();

        let writer = store.clone();
        let id = form_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            writer.submit_response(&id, answer("A")).await.unwrap();
        });

        let start = Instant::now();
        let outcome = coordinator
            .resolve(&form_id, 0, DEFAULT_CEILING, &cancel)
            .await
            .unwrap();

        assert!(start.elapsed() < DEFAULT_CEILING);
        match outcome {
            LongPollOutcome::Snapshot(snapshot) => {
                assert_eq!(snapshot.response_count, 1);
                assert!(snapshot.last_response_ms > 0);
            }
            other => panic!("expected snapshot, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_produces_no_body() {
        let (_store, hub, coordinator, form_id) = setup().await;
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let outcome = coordinator
            .resolve(&form_id, 0, DEFAULT_CEILING, &cancel)
            .await
            .unwrap();
        assert_eq!(outcome, LongPollOutcome::Canceled);
        assert!(outcome.into_response().is_none());
        assert_eq!(hub.waiter_count(&form_id), 0);
    }

    #[tokio::test]
    async fn test_unknown_form_is_not_found() {
        let (_store, _hub, coordinator, _form_id) = setup().await;
        let cancel = CancellationToken::new();

        let result = coordinator
            .resolve("missing", 0, DEFAULT_CEILING, &cancel)
            .await;
        assert!(matches!(result, Err(StoreError::FormNotFound(_))));
    }
}
