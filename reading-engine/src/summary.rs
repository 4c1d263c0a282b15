//! Per-counter overview and history rows for tabular output.

use meter_client::domain::{
    serde_time, Apartment, Counter, CounterId, CounterStatus, MediumType, Reading,
};
use serde::Serialize;
use time::{Date, OffsetDateTime};

use crate::aggregate::{ConsumptionSeries, Delta};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CounterSummary {
    pub counter_id: CounterId,
    pub medium: MediumType,
    pub unit: String,
    pub status: CounterStatus,
    pub latest_value: Option<f64>,
    #[serde(with = "serde_time::option_date")]
    pub latest_date: Option<Date>,
    /// Consumption of the most recent period; `None` while the counter has
    /// fewer than two readings.
    pub last_consumption: Option<f64>,
    #[serde(with = "serde_time::option_date")]
    pub due_date: Option<Date>,
    pub overdue: bool,
    pub accepts_readings: bool,
}

/// `deltas` are the counter's ascending (period, delta) pairs, as computed
/// once for the whole apartment.
pub fn summarize_counter(counter: &Counter, deltas: &[(Date, Delta)], today: Date) -> CounterSummary {
    let latest = counter.latest_confirmed();
    let last_consumption = deltas.last().and_then(|(_, delta)| delta.value());
    let accepts_readings = counter.status.accepts_readings();

    CounterSummary {
        counter_id: counter.id,
        medium: counter.medium.clone(),
        unit: counter.reading_unit.clone(),
        status: counter.status.clone(),
        latest_value: latest.map(|r| r.value),
        latest_date: latest.map(|r| r.date),
        last_consumption,
        due_date: counter.due_date,
        overdue: accepts_readings && counter.due_date.is_some_and(|due| due < today),
        accepts_readings,
    }
}

pub fn summarize(
    apartment: &Apartment,
    consumption: &ConsumptionSeries,
    today: Date,
) -> Vec<CounterSummary> {
    apartment
        .counters
        .iter()
        .map(|c| summarize_counter(c, &consumption.for_counter(c.id), today))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRow {
    #[serde(with = "serde_time::date")]
    pub date: Date,
    pub value: f64,
    #[serde(with = "serde_time::option_timestamp")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(with = "serde_time::option_timestamp")]
    pub updated_at: Option<OffsetDateTime>,
}

impl From<&Reading> for HistoryRow {
    fn from(reading: &Reading) -> Self {
        Self {
            date: reading.date,
            value: reading.value,
            created_at: reading.created_at,
            updated_at: reading.updated_at,
        }
    }
}

/// Full history of one counter, newest first.
pub fn reading_history(counter: &Counter) -> Vec<HistoryRow> {
    let mut readings: Vec<&Reading> = counter.history().collect();
    readings.sort_by(|a, b| b.chronology_cmp(a));
    readings.into_iter().map(HistoryRow::from).collect()
}
