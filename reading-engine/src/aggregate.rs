//! Period grouping and period-over-period consumption.
//!
//! Everything here is recomputed from the reading history on each call; the
//! store is the only cache.

use std::collections::BTreeMap;

use meter_client::domain::{Apartment, Counter, CounterId, MediumType, Reading};
use serde::Deserialize;
use time::Date;

/// Consumption is reported with litre resolution for m³ meters.
const CONSUMPTION_SCALE: f64 = 1000.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// One period per calendar date.
    #[default]
    Day,
    /// One period per calendar month, keyed by its first day.
    Month,
}

impl Granularity {
    pub fn period_of(self, date: Date) -> Date {
        match self {
            Granularity::Day => date,
            Granularity::Month => date.replace_day(1).unwrap_or(date),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Oldest first; the order deltas are computed in.
    Ascending,
    /// Newest first, for tables.
    Descending,
}

/// Slot key of a counter inside grouped records: the medium type, or
/// `medium#counter_id` when the apartment has several counters of that medium.
pub type SeriesKey = String;

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesInfo {
    pub key: SeriesKey,
    pub counter_id: CounterId,
    pub medium: MediumType,
    pub unit: String,
}

impl SeriesInfo {
    /// True when the key had to be disambiguated by counter id.
    pub fn is_shared_medium(&self) -> bool {
        self.key != self.medium.as_str()
    }
}

pub fn series_for(apartment: &Apartment) -> Vec<SeriesInfo> {
    let mut per_medium: BTreeMap<&MediumType, usize> = BTreeMap::new();
    for counter in &apartment.counters {
        *per_medium.entry(&counter.medium).or_default() += 1;
    }

    apartment
        .counters
        .iter()
        .map(|counter| {
            let key = if per_medium[&counter.medium] > 1 {
                format!("{}#{}", counter.medium, counter.id)
            } else {
                counter.medium.to_string()
            };
            SeriesInfo {
                key,
                counter_id: counter.id,
                medium: counter.medium.clone(),
                unit: counter.reading_unit.clone(),
            }
        })
        .collect()
}

/// Latest reading of `counter` per period, ascending. Several readings in one
/// period resolve to the one that supersedes the others.
fn latest_per_period(counter: &Counter, granularity: Granularity) -> BTreeMap<Date, &Reading> {
    let mut by_period: BTreeMap<Date, &Reading> = BTreeMap::new();
    for reading in counter.history().filter(|r| r.value.is_finite()) {
        by_period
            .entry(granularity.period_of(reading.date))
            .and_modify(|held| {
                if reading.chronology_cmp(*held).is_gt() {
                    *held = reading;
                }
            })
            .or_insert(reading);
    }
    by_period
}

/// Readings of all series that fall into one period. A series without a
/// reading in the period has no entry (absent, not zero).
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodRecord {
    pub period: Date,
    pub values: BTreeMap<SeriesKey, f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupedReadings {
    pub granularity: Granularity,
    pub series: Vec<SeriesInfo>,
    ascending: Vec<PeriodRecord>,
}

impl GroupedReadings {
    pub fn records(&self, orientation: Orientation) -> Vec<&PeriodRecord> {
        match orientation {
            Orientation::Ascending => self.ascending.iter().collect(),
            Orientation::Descending => self.ascending.iter().rev().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ascending.is_empty()
    }
}

/// Group every reading of the apartment's counters by period (effective date,
/// not submission time).
pub fn group_by_period(apartment: &Apartment, granularity: Granularity) -> GroupedReadings {
    let series = series_for(apartment);
    let mut by_period: BTreeMap<Date, BTreeMap<SeriesKey, f64>> = BTreeMap::new();

    for (counter, info) in apartment.counters.iter().zip(&series) {
        for (period, reading) in latest_per_period(counter, granularity) {
            by_period
                .entry(period)
                .or_default()
                .insert(info.key.clone(), reading.value);
        }
    }

    GroupedReadings {
        granularity,
        series,
        ascending: by_period
            .into_iter()
            .map(|(period, values)| PeriodRecord { period, values })
            .collect(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Delta {
    /// First reading of the series; there is no prior baseline.
    Baseline,
    Consumed(f64),
    /// The meter reads lower than its previous reading. Kept as observed.
    Anomalous(f64),
}

impl Delta {
    pub fn value(&self) -> Option<f64> {
        match self {
            Delta::Baseline => None,
            Delta::Consumed(v) | Delta::Anomalous(v) => Some(*v),
        }
    }

    /// What a display that cannot show "no baseline" renders.
    pub fn or_zero(&self) -> f64 {
        self.value().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntegrityWarning {
    pub series: SeriesKey,
    pub period: Date,
    pub previous: f64,
    pub current: f64,
}

fn round_consumption(value: f64) -> f64 {
    (value * CONSUMPTION_SCALE).round() / CONSUMPTION_SCALE
}

fn delta_between(previous: Option<f64>, current: f64) -> Delta {
    let Some(previous) = previous else {
        return Delta::Baseline;
    };

    let delta = round_consumption(current - previous);
    if delta >= 0.0 {
        // Also folds -0.0 into 0.0.
        Delta::Consumed(delta + 0.0)
    } else {
        Delta::Anomalous(delta)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsumptionRecord {
    pub period: Date,
    pub deltas: BTreeMap<SeriesKey, Delta>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsumptionSeries {
    pub granularity: Granularity,
    pub series: Vec<SeriesInfo>,
    pub warnings: Vec<IntegrityWarning>,
    ascending: Vec<ConsumptionRecord>,
}

impl ConsumptionSeries {
    pub fn records(&self, orientation: Orientation) -> Vec<&ConsumptionRecord> {
        match orientation {
            Orientation::Ascending => self.ascending.iter().collect(),
            Orientation::Descending => self.ascending.iter().rev().collect(),
        }
    }

    /// Deltas of one series, ascending, skipping periods where it is absent.
    pub fn for_series(&self, key: &str) -> Vec<(Date, Delta)> {
        self.ascending
            .iter()
            .filter_map(|r| r.deltas.get(key).map(|d| (r.period, *d)))
            .collect()
    }

    pub fn for_counter(&self, counter_id: CounterId) -> Vec<(Date, Delta)> {
        self.series
            .iter()
            .find(|s| s.counter_id == counter_id)
            .map(|s| self.for_series(&s.key))
            .unwrap_or_default()
    }
}

/// Period-over-period deltas of grouped readings.
///
/// A series' delta is taken against its previous *present* reading, so when
/// readings were missed for several periods the whole difference is
/// attributed to the period of the later reading. (Spreading it evenly over
/// the skipped periods would be the alternative.)
pub fn consumption(grouped: &GroupedReadings) -> ConsumptionSeries {
    let mut previous: BTreeMap<&str, f64> = BTreeMap::new();
    let mut warnings = Vec::new();
    let mut ascending = Vec::with_capacity(grouped.ascending.len());

    for record in &grouped.ascending {
        let mut deltas = BTreeMap::new();
        for (key, &value) in &record.values {
            let prior = previous.insert(key.as_str(), value);
            let delta = delta_between(prior, value);
            if let (Delta::Anomalous(_), Some(prior)) = (delta, prior) {
                tracing::warn!(
                    series = %key,
                    period = %record.period,
                    previous = prior,
                    current = value,
                    "reading history runs backwards"
                );
                metrics::counter!("consumption_integrity_warnings_total").increment(1);
                warnings.push(IntegrityWarning {
                    series: key.clone(),
                    period: record.period,
                    previous: prior,
                    current: value,
                });
            }
            deltas.insert(key.clone(), delta);
        }
        ascending.push(ConsumptionRecord {
            period: record.period,
            deltas,
        });
    }

    ConsumptionSeries {
        granularity: grouped.granularity,
        series: grouped.series.clone(),
        warnings,
        ascending,
    }
}

pub fn apartment_consumption(apartment: &Apartment, granularity: Granularity) -> ConsumptionSeries {
    consumption(&group_by_period(apartment, granularity))
}

/// (period, delta) pairs for a single counter, ascending. Backwards readings
/// come out as `Anomalous` but are only reported by [`consumption`].
pub fn counter_consumption(counter: &Counter, granularity: Granularity) -> Vec<(Date, Delta)> {
    let mut previous = None;
    latest_per_period(counter, granularity)
        .into_iter()
        .map(|(period, reading)| {
            (period, delta_between(previous.replace(reading.value), reading.value))
        })
        .collect()
}
