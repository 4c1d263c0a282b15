use std::sync::Arc;

use meter_client::{
    domain::{Apartment, ApartmentId},
    ReadingsBackend,
};
use time::Date;

use crate::{
    error::EngineError,
    store::{ReadingStore, RefreshOutcome},
    submission::{BatchResult, SubmissionCoordinator},
    validation::{FormInput, ReadingValidator, ValidationErrors},
};

#[derive(Debug)]
pub enum SubmitReport {
    /// Nothing was sent; every failing counter is listed.
    Invalid(ValidationErrors),
    NothingToSubmit,
    Submitted {
        result: BatchResult,
        refresh: RefreshOutcome,
    },
}

impl SubmitReport {
    /// The form may be cleared only when every reading was accepted.
    pub fn clears_form(&self) -> bool {
        matches!(self, SubmitReport::Submitted { result, .. } if result.all_fulfilled())
    }
}

/// One form interaction: validate against the confirmed snapshot, dispatch,
/// then resynchronise the store from the backend.
pub struct ReadingWorkflow<B> {
    validator: ReadingValidator,
    coordinator: SubmissionCoordinator<B>,
    store: Arc<ReadingStore<B>>,
}

impl<B> ReadingWorkflow<B>
where
    B: ReadingsBackend,
{
    pub fn new(backend: B, store: Arc<ReadingStore<B>>, validator: ReadingValidator) -> Self {
        Self {
            validator,
            coordinator: SubmissionCoordinator::new(backend),
            store,
        }
    }

    pub fn store(&self) -> &Arc<ReadingStore<B>> {
        &self.store
    }

    async fn confirmed_apartment(&self, apartment_id: ApartmentId) -> Result<Arc<Apartment>, EngineError> {
        if let Some(apartment) = self.store.snapshot().apartment(apartment_id) {
            return Ok(apartment);
        }
        match self.store.refresh(apartment_id).await {
            RefreshOutcome::Committed(apartment) => Ok(apartment),
            RefreshOutcome::Failed(e) => Err(e.into()),
            RefreshOutcome::Superseded => self
                .store
                .snapshot()
                .apartment(apartment_id)
                .ok_or(EngineError::ApartmentUnavailable(apartment_id)),
        }
    }

    pub async fn submit(
        &self,
        apartment_id: ApartmentId,
        input: &FormInput,
        date: Date,
    ) -> Result<SubmitReport, EngineError> {
        if input.is_empty() {
            return Ok(SubmitReport::NothingToSubmit);
        }

        let apartment = self.confirmed_apartment(apartment_id).await?;
        let batch = match self.validator.prepare_batch(input, &apartment, date) {
            Ok(batch) => batch,
            Err(errors) => {
                for (counter_id, error) in &errors {
                    metrics::counter!("reading_validation_rejections_total", "kind" => error.kind())
                        .increment(1);
                    tracing::info!(apartment_id, counter_id, %error, "reading failed validation");
                }
                return Ok(SubmitReport::Invalid(errors));
            }
        };

        let result = self.coordinator.dispatch(batch).await;
        if result.session_expired() {
            tracing::warn!(apartment_id, "session expired during submission");
        }

        // Partial or not, the backend is the source of truth afterwards.
        let refresh = self.store.refresh(apartment_id).await;
        Ok(SubmitReport::Submitted { result, refresh })
    }
}
