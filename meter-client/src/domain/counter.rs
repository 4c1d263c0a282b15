use std::fmt;

use serde::{Deserialize, Serialize};
use time::Date;

use super::{serde_time, ApartmentId, Reading};

pub type CounterId = i64;

/// The utility a counter measures ("hot", "cold", "water", ...).
///
/// The set is open: the backend may introduce new media at any time, so this
/// is a normalized string rather than a closed enum.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct MediumType(String);

impl MediumType {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MediumType {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for MediumType {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<MediumType> for String {
    fn from(medium: MediumType) -> Self {
        medium.0
    }
}

impl fmt::Display for MediumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CounterStatus {
    #[default]
    Active,
    Inactive,
    Maintenance,
    Other(String),
}

impl CounterStatus {
    pub fn accepts_readings(&self) -> bool {
        matches!(self, CounterStatus::Active)
    }
}

impl From<String> for CounterStatus {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => CounterStatus::Active,
            "inactive" => CounterStatus::Inactive,
            "maintenance" => CounterStatus::Maintenance,
            _ => CounterStatus::Other(raw),
        }
    }
}

impl From<CounterStatus> for String {
    fn from(status: CounterStatus) -> Self {
        match status {
            CounterStatus::Active => "active".to_string(),
            CounterStatus::Inactive => "inactive".to_string(),
            CounterStatus::Maintenance => "maintenance".to_string(),
            CounterStatus::Other(raw) => raw,
        }
    }
}

/// A physical meter installed in an apartment.
///
/// Depending on the endpoint, the backend sends either `latest_reading` or the
/// full `readings` history; both are optional here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Counter {
    pub id: CounterId,
    pub apartment_id: ApartmentId,
    #[serde(default)]
    pub factory_id: Option<String>,
    #[serde(rename = "type")]
    pub medium: MediumType,
    #[serde(default)]
    pub reading_unit: String,
    #[serde(default, with = "serde_time::option_date")]
    pub setup_date: Option<Date>,
    #[serde(default, with = "serde_time::option_date")]
    pub due_date: Option<Date>,
    #[serde(default)]
    pub status: CounterStatus,
    #[serde(default)]
    pub latest_reading: Option<Reading>,
    #[serde(default)]
    pub readings: Vec<Reading>,
}

impl Counter {
    /// The most recent server-confirmed reading, from whichever of
    /// `latest_reading` / `readings` the endpoint populated.
    pub fn latest_confirmed(&self) -> Option<&Reading> {
        self.latest_reading
            .iter()
            .chain(self.readings.iter())
            .filter(|r| r.value.is_finite())
            .max_by(|a, b| a.chronology_cmp(b))
    }

    /// Every known reading, `latest_reading` included when the history does
    /// not already carry it.
    pub fn history(&self) -> impl Iterator<Item = &Reading> {
        let extra = self.latest_reading.as_ref().filter(|latest| {
            !self
                .readings
                .iter()
                .any(|r| r.id.is_some() && r.id == latest.id)
        });
        self.readings.iter().chain(extra)
    }
}
