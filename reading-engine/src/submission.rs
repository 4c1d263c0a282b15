use std::{future::Future, time::Instant};

use futures::{future::join_all, FutureExt};
use meter_client::{
    domain::{ApartmentId, NewReading, Reading},
    ApiError, ReadingsBackend,
};

/// Settled result of one unit of work.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T, E> {
    Fulfilled(T),
    Rejected(E),
}

impl<T, E> Outcome<T, E> {
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Outcome::Fulfilled(_))
    }

    pub fn fulfilled(&self) -> Option<&T> {
        match self {
            Outcome::Fulfilled(v) => Some(v),
            Outcome::Rejected(_) => None,
        }
    }

    pub fn rejected(&self) -> Option<&E> {
        match self {
            Outcome::Fulfilled(_) => None,
            Outcome::Rejected(e) => Some(e),
        }
    }
}

impl<T, E> From<Result<T, E>> for Outcome<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(v) => Outcome::Fulfilled(v),
            Err(e) => Outcome::Rejected(e),
        }
    }
}

/// Drive every future to completion and collect their outcomes in input
/// order. A failure never cancels or short-circuits its siblings.
pub async fn settle_all<I, F, T, E>(futures: I) -> Vec<Outcome<T, E>>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, E>>,
{
    join_all(futures.into_iter().map(|f| f.map(Outcome::from))).await
}

/// Draft readings from one form interaction, one per counter.
///
/// Only the validator builds batches, and dispatching consumes the batch, so
/// an unvalidated or already-dispatched batch cannot reach the backend.
#[derive(Debug)]
pub struct SubmissionBatch {
    apartment_id: ApartmentId,
    entries: Vec<NewReading>,
}

impl SubmissionBatch {
    pub(crate) fn new(apartment_id: ApartmentId, entries: Vec<NewReading>) -> Self {
        Self {
            apartment_id,
            entries,
        }
    }

    pub fn apartment_id(&self) -> ApartmentId {
        self.apartment_id
    }

    pub fn entries(&self) -> &[NewReading] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ItemOutcome {
    pub draft: NewReading,
    pub outcome: Outcome<Reading, ApiError>,
}

/// Resolution of a dispatched batch, items in batch order.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub apartment_id: ApartmentId,
    pub items: Vec<ItemOutcome>,
}

impl BatchResult {
    /// The only signal allowed to gate clearing the form.
    pub fn all_fulfilled(&self) -> bool {
        self.items.iter().all(|i| i.outcome.is_fulfilled())
    }

    pub fn rejected(&self) -> impl Iterator<Item = (&NewReading, &ApiError)> {
        self.items
            .iter()
            .filter_map(|i| i.outcome.rejected().map(|e| (&i.draft, e)))
    }

    pub fn fulfilled(&self) -> impl Iterator<Item = &Reading> {
        self.items.iter().filter_map(|i| i.outcome.fulfilled())
    }

    /// True when any item failed with 401.
    pub fn session_expired(&self) -> bool {
        self.rejected()
            .any(|(_, e)| matches!(e, ApiError::Unauthorized(_)))
    }
}

/// Sends each draft of a batch to the reading-intake endpoint concurrently.
pub struct SubmissionCoordinator<B> {
    backend: B,
}

impl<B> SubmissionCoordinator<B>
where
    B: ReadingsBackend,
{
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Dispatch all entries, wait for every one to settle, and report each
    /// outcome. Never fails as a whole.
    pub async fn dispatch(&self, batch: SubmissionBatch) -> BatchResult {
        let SubmissionBatch {
            apartment_id,
            entries,
        } = batch;
        let started = Instant::now();

        let outcomes = settle_all(entries.iter().map(|draft| self.backend.submit_reading(draft))).await;

        let items: Vec<ItemOutcome> = entries
            .into_iter()
            .zip(outcomes)
            .map(|(draft, outcome)| {
                match &outcome {
                    Outcome::Fulfilled(reading) => {
                        metrics::counter!("reading_submissions_total", "outcome" => "fulfilled")
                            .increment(1);
                        tracing::debug!(
                            apartment_id,
                            counter_id = draft.counter_id,
                            reading_id = reading.id,
                            "reading accepted"
                        );
                    }
                    Outcome::Rejected(e) => {
                        metrics::counter!("reading_submissions_total", "outcome" => e.kind())
                            .increment(1);
                        tracing::warn!(
                            apartment_id,
                            counter_id = draft.counter_id,
                            value = draft.value,
                            error = %e,
                            "reading submission rejected"
                        );
                    }
                }
                ItemOutcome { draft, outcome }
            })
            .collect();

        metrics::histogram!("reading_batch_latency_seconds").record(started.elapsed().as_secs_f64());

        let result = BatchResult {
            apartment_id,
            items,
        };
        tracing::info!(
            apartment_id,
            submitted = result.items.len(),
            rejected = result.rejected().count(),
            "reading batch settled"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{apartment, counter, FakeBackend};
    use std::sync::Arc;
    use time::macros::date;

    fn batch(entries: &[(i64, f64)]) -> SubmissionBatch {
        SubmissionBatch::new(
            4,
            entries
                .iter()
                .map(|&(counter_id, value)| NewReading {
                    counter_id,
                    value,
                    date: date!(2025-05-10),
                })
                .collect(),
        )
    }

    #[tokio::test]
    async fn settle_all_keeps_input_order_and_never_short_circuits() {
        let outcomes = settle_all((0..4).map(|i| async move {
            if i % 2 == 1 {
                Err(format!("failed {i}"))
            } else {
                Ok(i)
            }
        }))
        .await;

        assert_eq!(
            outcomes,
            vec![
                Outcome::Fulfilled(0),
                Outcome::Rejected("failed 1".to_string()),
                Outcome::Fulfilled(2),
                Outcome::Rejected("failed 3".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn settle_all_waits_for_late_completions() {
        let (tx, rx) = tokio::sync::oneshot::channel::<u32>();
        let slow = async move { rx.await.map_err(|e| e.to_string()) };
        let fast = async move {
            let _ = tx.send(7);
            Ok::<u32, String>(1)
        };

        let outcomes = settle_all(vec![slow.boxed(), fast.boxed()]).await;
        assert_eq!(outcomes, vec![Outcome::Fulfilled(7), Outcome::Fulfilled(1)]);
    }

    #[tokio::test]
    async fn one_failing_item_does_not_affect_the_others() {
        let backend = Arc::new(FakeBackend::with_apartment(apartment(
            4,
            vec![counter(1, "cold", vec![]), counter(2, "hot", vec![]), counter(3, "water", vec![])],
        )));
        backend.fail_counter(
            2,
            ApiError::ServerRejection {
                status: 422,
                message: "reading lower than previous".to_string(),
            },
        );
        let coordinator = SubmissionCoordinator::new(backend.clone());

        let result = coordinator.dispatch(batch(&[(1, 10.0), (2, 20.0), (3, 30.0)])).await;

        assert_eq!(result.items.len(), 3);
        assert!(result.items[0].outcome.is_fulfilled());
        assert!(!result.items[1].outcome.is_fulfilled());
        assert!(result.items[2].outcome.is_fulfilled());
        assert!(!result.all_fulfilled());
        assert!(!result.session_expired());

        let rejected: Vec<_> = result.rejected().map(|(d, _)| d.counter_id).collect();
        assert_eq!(rejected, vec![2]);
        assert_eq!(backend.submitted_counters(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn fulfilled_items_carry_persisted_echo() {
        let backend = Arc::new(FakeBackend::with_apartment(apartment(
            4,
            vec![counter(1, "cold", vec![])],
        )));
        let coordinator = SubmissionCoordinator::new(backend);

        let result = coordinator.dispatch(batch(&[(1, 61.5)])).await;

        assert!(result.all_fulfilled());
        let persisted: Vec<_> = result.fulfilled().collect();
        assert_eq!(persisted.len(), 1);
        assert!(persisted[0].id.is_some());
        assert_eq!(persisted[0].value, 61.5);
    }

    #[tokio::test]
    async fn unauthorized_items_flag_session_expiry() {
        let backend = Arc::new(FakeBackend::with_apartment(apartment(
            4,
            vec![counter(1, "cold", vec![])],
        )));
        backend.fail_counter(1, ApiError::Unauthorized("token expired".to_string()));
        let coordinator = SubmissionCoordinator::new(backend);

        let result = coordinator.dispatch(batch(&[(1, 1.0)])).await;
        assert!(result.session_expired());
    }
}
