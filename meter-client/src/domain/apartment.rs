use serde::{Deserialize, Serialize};

use super::{Counter, CounterId};

pub type ApartmentId = i64;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub block: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub country: String,
}

/// An apartment and the counters it exclusively owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Apartment {
    pub id: ApartmentId,
    #[serde(default)]
    pub apartment_number: String,
    #[serde(default)]
    pub address_id: Option<i64>,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub counters: Vec<Counter>,
}

impl Apartment {
    pub fn counter(&self, id: CounterId) -> Option<&Counter> {
        self.counters.iter().find(|c| c.id == id)
    }
}

/// `apartments-with-counters` answers either `{"apartments": [...]}` or a
/// bare array depending on the backend version.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ApartmentsEnvelope {
    Wrapped { apartments: Vec<Apartment> },
    Bare(Vec<Apartment>),
}

impl From<ApartmentsEnvelope> for Vec<Apartment> {
    fn from(envelope: ApartmentsEnvelope) -> Self {
        match envelope {
            ApartmentsEnvelope::Wrapped { apartments } => apartments,
            ApartmentsEnvelope::Bare(apartments) => apartments,
        }
    }
}
