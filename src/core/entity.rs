//! Entity trait - common interface for all stored records

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

use crate::core::identity::{EntityId, EntityPrefix};

/// Common trait for every row type kept in the shop database
pub trait Entity: Serialize + DeserializeOwned + Clone {
    /// The id prefix for this entity type (e.g. CUST, SO)
    const PREFIX: EntityPrefix;

    /// Get the entity's unique ID
    fn id(&self) -> &EntityId;

    /// Short human label used in tables and messages
    fn label(&self) -> String;

    /// Get the creation timestamp
    fn created_at(&self) -> DateTime<Utc>;

    /// Backend table name
    fn table() -> &'static str {
        Self::PREFIX.table()
    }
}

/// Timestamp text stored in the database; sorts lexicographically
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Parse a stored timestamp, falling back to the epoch on corrupt data
pub fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_text_sorts_chronologically() {
        let a = Utc.with_ymd_and_hms(2024, 1, 9, 23, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 1, 10, 1, 0, 0).unwrap();
        assert!(format_timestamp(&a) < format_timestamp(&b));
        assert_eq!(parse_timestamp(&format_timestamp(&a)), a);
    }

    #[test]
    fn test_date_prefix_is_calendar_day() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 5, 12, 30, 0).unwrap();
        assert_eq!(&format_timestamp(&ts)[..10], "2024-03-05");
    }
}
