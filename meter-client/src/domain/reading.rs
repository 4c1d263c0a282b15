use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use super::{serde_time, CounterId};

pub type ReadingId = i64;

/// A server-confirmed meter reading.
///
/// Readings are immutable once persisted; a later reading for the same
/// counter supersedes an earlier one, it never replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(default)]
    pub id: Option<ReadingId>,
    pub counter_id: CounterId,
    pub value: f64,
    #[serde(with = "serde_time::date")]
    pub date: Date,
    #[serde(default, with = "serde_time::option_timestamp")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default, with = "serde_time::option_timestamp")]
    pub updated_at: Option<OffsetDateTime>,
}

impl Reading {
    /// Chronological order: effective date first, then the persistence
    /// timestamps, then the server id. The greatest reading is the one that
    /// supersedes all others.
    pub fn chronology_cmp(&self, other: &Reading) -> Ordering {
        self.date
            .cmp(&other.date)
            .then_with(|| {
                self.updated_at
                    .or(self.created_at)
                    .cmp(&other.updated_at.or(other.created_at))
            })
            .then_with(|| self.created_at.cmp(&other.created_at))
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Body of `POST /counter-readings`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReading {
    pub counter_id: CounterId,
    pub value: f64,
    #[serde(with = "serde_time::date")]
    pub date: Date,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    #[test]
    fn reading_deserializes_backend_payload() {
        let raw = r#"{
            "counter_id": 3,
            "value": 58.2,
            "date": "2025-04-10",
            "id": 17,
            "created_at": "2025-04-10T09:15:00",
            "updated_at": "2025-04-10T09:15:00"
        }"#;
        let reading: Reading = serde_json::from_str(raw).unwrap();
        assert_eq!(reading.counter_id, 3);
        assert_eq!(reading.value, 58.2);
        assert_eq!(reading.date, date!(2025-04-10));
        assert_eq!(reading.id, Some(17));
        assert_eq!(reading.created_at, Some(datetime!(2025-04-10 09:15:00 UTC)));
    }

    #[test]
    fn echo_without_server_fields_still_parses() {
        let raw = r#"{"counter_id": 3, "value": 61.5, "date": "2025-05-10"}"#;
        let reading: Reading = serde_json::from_str(raw).unwrap();
        assert!(reading.id.is_none());
        assert!(reading.created_at.is_none());
    }

    #[test]
    fn new_reading_serializes_value_as_number_and_date_as_day() {
        let draft = NewReading {
            counter_id: 3,
            value: 61.5,
            date: date!(2025-05-10),
        };
        let json = serde_json::to_value(&draft).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"counter_id": 3, "value": 61.5, "date": "2025-05-10"})
        );
    }

    #[test]
    fn later_update_supersedes_same_day_reading() {
        let earlier = Reading {
            id: Some(1),
            counter_id: 3,
            value: 10.0,
            date: date!(2025-04-10),
            created_at: Some(datetime!(2025-04-10 08:00:00 UTC)),
            updated_at: None,
        };
        let later = Reading {
            id: Some(2),
            value: 10.5,
            created_at: Some(datetime!(2025-04-10 19:00:00 UTC)),
            ..earlier.clone()
        };
        assert_eq!(later.chronology_cmp(&earlier), Ordering::Greater);

        let next_day = Reading {
            id: Some(0),
            date: date!(2025-04-11),
            created_at: None,
            ..earlier.clone()
        };
        assert_eq!(next_day.chronology_cmp(&later), Ordering::Greater);
    }
}
