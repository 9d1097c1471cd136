//! Table schema registry.
//!
//! Declares, per table, the primary partition/sort attributes and the named
//! GSIs with their own key attributes. The resolver derives index names and
//! range-key placement purely from this configuration; nothing about the
//! physical layout is hardcoded in the query paths.
//!
//! The registry is built once — from JSON (`SchemaRegistry::from_file`) or
//! from the built-in [`default_registry`] — and handed to the repository at
//! construction. There is no ambient global schema state.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Canonical table names.
pub const SESSIONS_TABLE: &str = "paygate_sessions";
pub const TRANSACTIONS_TABLE: &str = "paygate_transactions";
pub const SCHEDULES_TABLE: &str = "paygate_schedules";
pub const TOKENS_TABLE: &str = "paygate_tokens";
pub const WEBHOOKS_TABLE: &str = "paygate_webhooks";

/// Attribute names shared across tables.
pub const PK_ATTR: &str = "pk";
pub const SK_ATTR: &str = "sk";
pub const CREATED_AT_ATTR: &str = "created_at";
pub const ORDER_ID_ATTR: &str = "order_id";
pub const SUBSCRIPTION_ID_ATTR: &str = "subscription_id";
pub const STATUS_LABEL_ATTR: &str = "status_label";
pub const EXPIRY_ATTR: &str = "expiry";

/// Errors that can occur when loading or consulting the schema registry.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("unknown table: {0}")]
    UnknownTable(String),
    #[error("no access path on table {table} keyed by attribute {attribute}")]
    NoAccessPath { table: String, attribute: String },
    #[error("malformed schema config: {0}")]
    Parse(String),
    #[error("failed to read schema config: {0}")]
    Io(#[from] std::io::Error),
}

/// DynamoDB scalar attribute types used by key attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeType {
    #[serde(rename = "S")]
    String,
}

/// A key attribute definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyAttribute {
    pub name: String,
    #[serde(rename = "type")]
    pub attribute_type: AttributeType,
}

impl KeyAttribute {
    fn string(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attribute_type: AttributeType::String,
        }
    }
}

/// Global Secondary Index configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GsiSchema {
    pub name: String,
    pub partition_key: KeyAttribute,
    #[serde(default)]
    pub sort_key: Option<KeyAttribute>,
}

/// Table schema configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    #[serde(default)]
    pub table_name: String,
    pub partition_key: KeyAttribute,
    #[serde(default)]
    pub sort_key: Option<KeyAttribute>,
    #[serde(default)]
    pub gsis: Vec<GsiSchema>,
}

/// The resolved access path for a query keyed on one attribute: either the
/// table's own primary key or a named GSI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessPath<'a> {
    /// `None` for primary-key access, `Some(name)` for GSI access.
    pub index_name: Option<&'a str>,
    /// The partition attribute of the chosen index.
    pub partition_attr: &'a str,
    /// The declared range (sort) attribute of the chosen index, if any.
    pub range_attr: Option<&'a str>,
}

impl AccessPath<'_> {
    /// True when a time window can join the key condition instead of being
    /// applied as a post-filter.
    pub fn range_is_created_at(&self) -> bool {
        self.range_attr == Some(CREATED_AT_ATTR)
    }
}

impl TableSchema {
    /// Resolves the access path for a query keyed on `attribute`.
    ///
    /// The table's own partition key wins over any GSI with the same
    /// partition attribute; otherwise the first GSI partitioned by
    /// `attribute` is chosen.
    pub fn access_path(&self, attribute: &str) -> Result<AccessPath<'_>, SchemaError> {
        if attribute == self.partition_key.name {
            return Ok(AccessPath {
                index_name: None,
                partition_attr: &self.partition_key.name,
                range_attr: self.sort_key.as_ref().map(|k| k.name.as_str()),
            });
        }

        self.gsis
            .iter()
            .find(|gsi| gsi.partition_key.name == attribute)
            .map(|gsi| AccessPath {
                index_name: Some(&gsi.name),
                partition_attr: &gsi.partition_key.name,
                range_attr: gsi.sort_key.as_ref().map(|k| k.name.as_str()),
            })
            .ok_or_else(|| SchemaError::NoAccessPath {
                table: self.table_name.clone(),
                attribute: attribute.to_string(),
            })
    }
}

/// Immutable per-table schema configuration, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRegistry {
    tables: HashMap<String, TableSchema>,
}

impl SchemaRegistry {
    /// Builds a registry from table schemas, keying each by its table name.
    pub fn new(tables: impl IntoIterator<Item = TableSchema>) -> Self {
        Self {
            tables: tables
                .into_iter()
                .map(|t| (t.table_name.clone(), t))
                .collect(),
        }
    }

    /// Parses a registry from JSON: a map of table name to table schema.
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let raw: HashMap<String, TableSchema> =
            serde_json::from_str(json).map_err(|e| SchemaError::Parse(e.to_string()))?;

        Ok(Self::new(raw.into_iter().map(|(name, mut schema)| {
            schema.table_name = name;
            schema
        })))
    }

    /// Loads a registry from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Looks up a table schema by name.
    pub fn table(&self, name: &str) -> Result<&TableSchema, SchemaError> {
        self.tables
            .get(name)
            .ok_or_else(|| SchemaError::UnknownTable(name.to_string()))
    }

    /// Iterates over all declared tables.
    pub fn tables(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.values()
    }
}

fn table(name: &str, gsis: Vec<GsiSchema>) -> TableSchema {
    TableSchema {
        table_name: name.to_string(),
        partition_key: KeyAttribute::string(PK_ATTR),
        sort_key: Some(KeyAttribute::string(SK_ATTR)),
        gsis,
    }
}

fn gsi(name: &str, partition_attr: &str, range_attr: Option<&str>) -> GsiSchema {
    GsiSchema {
        name: name.to_string(),
        partition_key: KeyAttribute::string(partition_attr),
        sort_key: range_attr.map(KeyAttribute::string),
    }
}

/// Returns the canonical table configuration for paygate.
/// This is a pure function - no I/O.
///
/// Each logical access path gets its own named index: `order_gsi`,
/// `subscription_gsi`, `status_gsi` and `expiry_gsi` are independently
/// evolvable rather than aliases of one shared physical index.
pub fn default_registry() -> SchemaRegistry {
    SchemaRegistry::new([
        table(
            SESSIONS_TABLE,
            vec![gsi("order_gsi", ORDER_ID_ATTR, Some(CREATED_AT_ATTR))],
        ),
        table(
            TRANSACTIONS_TABLE,
            vec![
                gsi("order_gsi", ORDER_ID_ATTR, Some(CREATED_AT_ATTR)),
                gsi("status_gsi", STATUS_LABEL_ATTR, Some(CREATED_AT_ATTR)),
            ],
        ),
        table(
            SCHEDULES_TABLE,
            vec![
                gsi(
                    "subscription_gsi",
                    SUBSCRIPTION_ID_ATTR,
                    Some(CREATED_AT_ATTR),
                ),
                gsi("order_gsi", ORDER_ID_ATTR, Some(CREATED_AT_ATTR)),
            ],
        ),
        table(TOKENS_TABLE, vec![gsi("expiry_gsi", EXPIRY_ATTR, None)]),
        table(
            WEBHOOKS_TABLE,
            vec![gsi("subscription_gsi", SUBSCRIPTION_ID_ATTR, None)],
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_has_all_tables() {
        let registry = default_registry();
        for name in [
            SESSIONS_TABLE,
            TRANSACTIONS_TABLE,
            SCHEDULES_TABLE,
            TOKENS_TABLE,
            WEBHOOKS_TABLE,
        ] {
            assert!(registry.table(name).is_ok(), "missing table {name}");
        }
    }

    #[test]
    fn test_unknown_table_is_an_error() {
        let registry = default_registry();
        assert!(matches!(
            registry.table("paygate_refunds"),
            Err(SchemaError::UnknownTable(_))
        ));
    }

    #[test]
    fn test_access_path_prefers_primary_key() {
        let registry = default_registry();
        let sessions = registry.table(SESSIONS_TABLE).unwrap();

        let path = sessions.access_path(PK_ATTR).unwrap();
        assert_eq!(path.index_name, None);
        assert_eq!(path.partition_attr, "pk");
        assert_eq!(path.range_attr, Some("sk"));
        assert!(!path.range_is_created_at());
    }

    #[test]
    fn test_access_path_selects_named_gsi() {
        let registry = default_registry();
        let transactions = registry.table(TRANSACTIONS_TABLE).unwrap();

        let path = transactions.access_path(STATUS_LABEL_ATTR).unwrap();
        assert_eq!(path.index_name, Some("status_gsi"));
        assert_eq!(path.partition_attr, "status_label");
        assert!(path.range_is_created_at());
    }

    #[test]
    fn test_access_path_without_range_key() {
        let registry = default_registry();
        let tokens = registry.table(TOKENS_TABLE).unwrap();

        let path = tokens.access_path(EXPIRY_ATTR).unwrap();
        assert_eq!(path.index_name, Some("expiry_gsi"));
        assert_eq!(path.range_attr, None);
        assert!(!path.range_is_created_at());
    }

    #[test]
    fn test_access_path_unknown_attribute() {
        let registry = default_registry();
        let tokens = registry.table(TOKENS_TABLE).unwrap();

        assert!(matches!(
            tokens.access_path("card_type"),
            Err(SchemaError::NoAccessPath { .. })
        ));
    }

    #[test]
    fn test_registry_from_json() {
        let json = r#"{
            "paygate_tokens": {
                "partition_key": { "name": "pk", "type": "S" },
                "sort_key": { "name": "sk", "type": "S" },
                "gsis": [
                    { "name": "expiry_gsi", "partition_key": { "name": "expiry", "type": "S" } }
                ]
            }
        }"#;

        let registry = SchemaRegistry::from_json(json).unwrap();
        let tokens = registry.table("paygate_tokens").unwrap();
        assert_eq!(tokens.table_name, "paygate_tokens");
        assert_eq!(tokens.gsis.len(), 1);
        assert_eq!(tokens.gsis[0].sort_key, None);
    }

    #[test]
    fn test_registry_from_json_matches_default() {
        // The default registry serialized back through JSON must survive a
        // round trip, so tables.json can mirror it.
        let registry = default_registry();
        let as_map: HashMap<&str, &TableSchema> = registry
            .tables()
            .map(|t| (t.table_name.as_str(), t))
            .collect();
        let json = serde_json::to_string(&as_map).unwrap();

        let reloaded = SchemaRegistry::from_json(&json).unwrap();
        assert_eq!(reloaded, registry);
    }

    #[test]
    fn test_malformed_json_is_a_parse_error() {
        assert!(matches!(
            SchemaRegistry::from_json("{ not json"),
            Err(SchemaError::Parse(_))
        ));
    }
}
