//! Entity identity system using type-prefixed ULIDs

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use ulid::Ulid;

/// Entity type prefixes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityPrefix {
    /// Shop (tenant)
    Shop,
    /// Shop staff member
    Usr,
    /// Customer
    Cust,
    /// Customer vehicle
    Veh,
    /// Service order
    So,
    /// Service order line item
    Item,
    /// Service order status change
    Hist,
    /// Inventory part
    Part,
    /// Stock movement
    Mov,
    /// Notification
    Ntf,
    /// Notification preference
    Npref,
}

impl EntityPrefix {
    /// Get the string representation of the prefix
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityPrefix::Shop => "SHOP",
            EntityPrefix::Usr => "USR",
            EntityPrefix::Cust => "CUST",
            EntityPrefix::Veh => "VEH",
            EntityPrefix::So => "SO",
            EntityPrefix::Item => "ITEM",
            EntityPrefix::Hist => "HIST",
            EntityPrefix::Part => "PART",
            EntityPrefix::Mov => "MOV",
            EntityPrefix::Ntf => "NTF",
            EntityPrefix::Npref => "NPREF",
        }
    }

    /// Get all valid prefixes
    pub fn all() -> &'static [EntityPrefix] {
        &[
            EntityPrefix::Shop,
            EntityPrefix::Usr,
            EntityPrefix::Cust,
            EntityPrefix::Veh,
            EntityPrefix::So,
            EntityPrefix::Item,
            EntityPrefix::Hist,
            EntityPrefix::Part,
            EntityPrefix::Mov,
            EntityPrefix::Ntf,
            EntityPrefix::Npref,
        ]
    }

    /// Backend table holding rows of this type
    pub fn table(&self) -> &'static str {
        match self {
            EntityPrefix::Shop => "shops",
            EntityPrefix::Usr => "shop_users",
            EntityPrefix::Cust => "customers",
            EntityPrefix::Veh => "vehicles",
            EntityPrefix::So => "service_orders",
            EntityPrefix::Item => "service_items",
            EntityPrefix::Hist => "service_order_status_history",
            EntityPrefix::Part => "parts",
            EntityPrefix::Mov => "stock_movements",
            EntityPrefix::Ntf => "notifications",
            EntityPrefix::Npref => "notification_preferences",
        }
    }
}

impl fmt::Display for EntityPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityPrefix {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SHOP" => Ok(EntityPrefix::Shop),
            "USR" => Ok(EntityPrefix::Usr),
            "CUST" => Ok(EntityPrefix::Cust),
            "VEH" => Ok(EntityPrefix::Veh),
            "SO" => Ok(EntityPrefix::So),
            "ITEM" => Ok(EntityPrefix::Item),
            "HIST" => Ok(EntityPrefix::Hist),
            "PART" => Ok(EntityPrefix::Part),
            "MOV" => Ok(EntityPrefix::Mov),
            "NTF" => Ok(EntityPrefix::Ntf),
            "NPREF" => Ok(EntityPrefix::Npref),
            _ => Err(IdParseError::InvalidPrefix(s.to_string())),
        }
    }
}

/// A unique entity identifier combining a type prefix and ULID
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityId {
    prefix: EntityPrefix,
    ulid: Ulid,
}

impl EntityId {
    /// Create a new EntityId with the given prefix
    pub fn new(prefix: EntityPrefix) -> Self {
        Self {
            prefix,
            ulid: Ulid::new(),
        }
    }

    /// Create an EntityId from a prefix and existing ULID
    pub fn from_parts(prefix: EntityPrefix, ulid: Ulid) -> Self {
        Self { prefix, ulid }
    }

    /// Get the entity prefix
    pub fn prefix(&self) -> EntityPrefix {
        self.prefix
    }

    /// Get the ULID component
    pub fn ulid(&self) -> Ulid {
        self.ulid
    }

    /// Parse an EntityId from a string
    pub fn parse(s: &str) -> Result<Self, IdParseError> {
        s.parse()
    }

    /// Parse and require a specific prefix
    pub fn parse_as(s: &str, expected: EntityPrefix) -> Result<Self, IdParseError> {
        let id: EntityId = s.parse()?;
        if id.prefix() != expected {
            return Err(IdParseError::WrongPrefix {
                expected,
                found: id.prefix(),
            });
        }
        Ok(id)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.prefix, self.ulid)
    }
}

impl FromStr for EntityId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix_str, ulid_str) = s
            .split_once('-')
            .ok_or_else(|| IdParseError::MissingDelimiter(s.to_string()))?;

        let prefix: EntityPrefix = prefix_str.parse()?;
        let ulid = Ulid::from_string(ulid_str)
            .map_err(|e| IdParseError::InvalidUlid(ulid_str.to_string(), e.to_string()))?;

        Ok(Self::from_parts(prefix, ulid))
    }
}

impl Serialize for EntityId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl ToSql for EntityId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for EntityId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: IdParseError| FromSqlError::Other(Box::new(e)))
    }
}

/// Errors that can occur when parsing entity IDs
#[derive(Debug, Error)]
pub enum IdParseError {
    #[error("invalid entity prefix: '{0}' (valid: SHOP, USR, CUST, VEH, SO, ITEM, HIST, PART, MOV, NTF, NPREF)")]
    InvalidPrefix(String),

    #[error("missing '-' delimiter in entity ID: '{0}'")]
    MissingDelimiter(String),

    #[error("invalid ULID '{0}': {1}")]
    InvalidUlid(String, String),

    #[error("expected a {expected} id, found a {found} id")]
    WrongPrefix {
        expected: EntityPrefix,
        found: EntityPrefix,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_generation() {
        let id = EntityId::new(EntityPrefix::Cust);
        assert!(id.to_string().starts_with("CUST-"));
        assert_eq!(id.to_string().len(), 31); // CUST- (5) + ULID (26)
    }

    #[test]
    fn test_entity_id_parsing() {
        let original = EntityId::new(EntityPrefix::So);
        let parsed = EntityId::parse(&original.to_string()).unwrap();
        assert_eq!(parsed.prefix(), EntityPrefix::So);
        assert_eq!(original, parsed);
    }

    #[test]
    fn test_entity_id_invalid_prefix() {
        let err = EntityId::parse("XXX-01HQ3K4N5M6P7R8S9T0VWXYZAB").unwrap_err();
        assert!(matches!(err, IdParseError::InvalidPrefix(_)));
    }

    #[test]
    fn test_entity_id_missing_delimiter() {
        let err = EntityId::parse("CUST01HQ3K4N5M6P7R8S9T0VWXYZ").unwrap_err();
        assert!(matches!(err, IdParseError::MissingDelimiter(_)));
    }

    #[test]
    fn test_entity_id_invalid_ulid() {
        let err = EntityId::parse("VEH-notaulid").unwrap_err();
        assert!(matches!(err, IdParseError::InvalidUlid(_, _)));
    }

    #[test]
    fn test_parse_as_rejects_other_prefix() {
        let id = EntityId::new(EntityPrefix::Part);
        let err = EntityId::parse_as(&id.to_string(), EntityPrefix::Cust).unwrap_err();
        assert!(matches!(
            err,
            IdParseError::WrongPrefix {
                expected: EntityPrefix::Cust,
                found: EntityPrefix::Part
            }
        ));
    }

    #[test]
    fn test_all_prefixes_parse() {
        for prefix in EntityPrefix::all() {
            let id = EntityId::new(*prefix);
            let parsed = EntityId::parse(&id.to_string()).unwrap();
            assert_eq!(parsed.prefix(), *prefix);
        }
    }

    #[test]
    fn test_sql_roundtrip() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let id = EntityId::new(EntityPrefix::Veh);
        let back: EntityId = conn
            .query_row("SELECT ?1", [&id], |row| row.get(0))
            .unwrap();
        assert_eq!(id, back);
    }
}
