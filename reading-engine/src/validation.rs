use std::collections::BTreeMap;

use meter_client::domain::{Apartment, Counter, CounterId, NewReading, Reading};
use serde::Deserialize;
use time::Date;

use crate::submission::SubmissionBatch;

/// Raw textual input as typed into the reading form, keyed by counter.
pub type FormInput = BTreeMap<CounterId, String>;

/// Per-counter failures; a counter absent from the map passed validation.
pub type ValidationErrors = BTreeMap<CounterId, ValidationError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("please enter a valid number (got {input:?})")]
    InvalidFormat { input: String },
    #[error("reading must be greater than or equal to previous reading ({previous})")]
    Regression { previous: f64, candidate: f64 },
    #[error("counter {0} does not belong to this apartment")]
    UnknownCounter(CounterId),
    #[error("a reading dated {date} was already submitted")]
    SameDayResubmission { date: Date },
}

impl ValidationError {
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::InvalidFormat { .. } => "invalid_format",
            ValidationError::Regression { .. } => "regression",
            ValidationError::UnknownCounter(_) => "unknown_counter",
            ValidationError::SameDayResubmission { .. } => "same_day",
        }
    }
}

/// What to do with a candidate dated on the same day as the latest
/// confirmed reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SameDayPolicy {
    /// Submit it and let the backend decide between overwrite and rejection.
    #[default]
    DeferToServer,
    Reject,
}

/// Parse a raw reading value.
///
/// Rules:
/// - must be present and not blank;
/// - must parse as a finite real number;
/// - must be non-negative.
pub fn parse_reading_value(raw: &str) -> Result<f64, ValidationError> {
    let invalid = || ValidationError::InvalidFormat {
        input: raw.to_string(),
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid());
    }
    let value: f64 = trimmed.parse().map_err(|_| invalid())?;
    if !value.is_finite() || value < 0.0 {
        return Err(invalid());
    }
    // Normalise -0.0.
    Ok(value + 0.0)
}

/// Meters never run backward: the candidate must not be below the latest
/// confirmed value. Equal is fine (no consumption in the period).
pub fn check_monotonic(candidate: f64, latest: Option<&Reading>) -> Result<(), ValidationError> {
    match latest {
        Some(previous) if candidate < previous.value => Err(ValidationError::Regression {
            previous: previous.value,
            candidate,
        }),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReadingValidator {
    same_day_policy: SameDayPolicy,
}

impl ReadingValidator {
    pub fn new(same_day_policy: SameDayPolicy) -> Self {
        Self { same_day_policy }
    }

    fn check_one(&self, raw: &str, counter: &Counter, date: Date) -> Result<f64, ValidationError> {
        let value = parse_reading_value(raw)?;
        let latest = counter.latest_confirmed();
        check_monotonic(value, latest)?;

        if self.same_day_policy == SameDayPolicy::Reject {
            if let Some(previous) = latest.filter(|r| r.date == date) {
                return Err(ValidationError::SameDayResubmission {
                    date: previous.date,
                });
            }
        }
        Ok(value)
    }

    /// Check every entry against the counter it names. Accepted entries come
    /// back as drafts in the input's counter-id order.
    fn check_entries(
        &self,
        input: &FormInput,
        counters: &[Counter],
        date: Date,
    ) -> (Vec<NewReading>, ValidationErrors) {
        let mut drafts = Vec::with_capacity(input.len());
        let mut errors = ValidationErrors::new();

        for (&counter_id, raw) in input {
            let checked = match counters.iter().find(|c| c.id == counter_id) {
                Some(counter) => self.check_one(raw, counter, date),
                None => Err(ValidationError::UnknownCounter(counter_id)),
            };
            match checked {
                Ok(value) => drafts.push(NewReading {
                    counter_id,
                    value,
                    date,
                }),
                Err(e) => {
                    errors.insert(counter_id, e);
                }
            }
        }
        (drafts, errors)
    }

    /// Check every entry of `input` against the known counter state. Pure; the
    /// result only lists failing counters.
    pub fn validate(&self, input: &FormInput, counters: &[Counter], date: Date) -> ValidationErrors {
        self.check_entries(input, counters, date).1
    }

    /// Validate and, when every entry passes, build the batch to dispatch.
    pub fn prepare_batch(
        &self,
        input: &FormInput,
        apartment: &Apartment,
        date: Date,
    ) -> Result<SubmissionBatch, ValidationErrors> {
        let (drafts, errors) = self.check_entries(input, &apartment.counters, date);
        if errors.is_empty() {
            Ok(SubmissionBatch::new(apartment.id, drafts))
        } else {
            Err(errors)
        }
    }
}
