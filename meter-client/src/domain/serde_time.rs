//! Serde helpers for the backend's date and timestamp encodings.
//!
//! Dates travel as `YYYY-MM-DD`. Timestamps are usually RFC 3339, but the
//! backend also emits naive `YYYY-MM-DDTHH:MM:SS[.ffffff]` values, which are
//! read as UTC.

use time::{
    format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime,
    PrimitiveDateTime,
};

/// Parse a `YYYY-MM-DD` date. A trailing time part (`T...` or ` ...`) is ignored.
pub fn parse_date(raw: &str) -> Result<Date, time::error::Parse> {
    let raw = raw.trim();
    let day = match raw.find(|c: char| c == 'T' || c == ' ') {
        Some(idx) => &raw[..idx],
        None => raw,
    };
    Date::parse(day, format_description!("[year]-[month]-[day]"))
}

pub fn format_date(date: Date) -> String {
    date.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| date.to_string())
}

pub fn parse_timestamp(raw: &str) -> Result<OffsetDateTime, time::error::Parse> {
    let raw = raw.trim();
    if let Ok(ts) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(ts);
    }
    match PrimitiveDateTime::parse(
        raw,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"),
    ) {
        Ok(naive) => Ok(naive.assume_utc()),
        Err(e) => match parse_date(raw) {
            Ok(date) => Ok(date.midnight().assume_utc()),
            Err(_) => Err(e),
        },
    }
}

pub fn format_timestamp(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339).unwrap_or_else(|_| ts.to_string())
}

pub mod date {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};
    use time::Date;

    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_date(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Date, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_date(&raw).map_err(|e| D::Error::custom(format!("invalid date '{raw}': {e}")))
    }
}

pub mod option_date {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};
    use time::Date;

    pub fn serialize<S: Serializer>(date: &Option<Date>, serializer: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(d) => serializer.serialize_some(&super::format_date(*d)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Date>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) if !raw.trim().is_empty() => super::parse_date(&raw)
                .map(Some)
                .map_err(|e| D::Error::custom(format!("invalid date '{raw}': {e}"))),
            _ => Ok(None),
        }
    }
}

pub mod option_timestamp {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};
    use time::OffsetDateTime;

    pub fn serialize<S: Serializer>(
        ts: &Option<OffsetDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => serializer.serialize_some(&super::format_timestamp(*ts)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<OffsetDateTime>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) if !raw.trim().is_empty() => super::parse_timestamp(&raw)
                .map(Some)
                .map_err(|e| D::Error::custom(format!("invalid timestamp '{raw}': {e}"))),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    #[test]
    fn parse_date_ignores_time_suffix() {
        assert_eq!(parse_date("2025-04-10").unwrap(), date!(2025-04-10));
        assert_eq!(parse_date("2025-04-10T08:00:00").unwrap(), date!(2025-04-10));
        assert!(parse_date("10.04.2025").is_err());
    }

    #[test]
    fn parse_timestamp_accepts_naive_and_offset_forms() {
        assert_eq!(
            parse_timestamp("2025-05-10T12:30:00").unwrap(),
            datetime!(2025-05-10 12:30:00 UTC)
        );
        assert_eq!(
            parse_timestamp("2025-05-10T12:30:00.250").unwrap(),
            datetime!(2025-05-10 12:30:00.25 UTC)
        );
        assert_eq!(
            parse_timestamp("2025-05-10T14:30:00+02:00").unwrap(),
            datetime!(2025-05-10 12:30:00 UTC)
        );
    }

    #[test]
    fn format_date_is_iso_day() {
        assert_eq!(format_date(date!(2025-01-05)), "2025-01-05");
    }
}
