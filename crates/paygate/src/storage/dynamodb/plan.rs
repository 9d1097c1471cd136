//! Pure query planning.
//!
//! Translates an (attribute, value, window) triple into the concrete query
//! parameters DynamoDB expects: an aliased key-condition expression, the
//! selected index, and the expression name/value maps. No I/O; the decisions
//! are testable in isolation.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;

use paygate_core::payment::keys;
use paygate_core::schema::{SchemaError, TableSchema, CREATED_AT_ATTR};
use paygate_core::storage::{FieldPatch, TimeWindow};

use super::conversions::json_to_attribute;

/// Everything needed to issue one query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub table_name: String,
    /// `None` for primary-key access, `Some(name)` for GSI access.
    pub index_name: Option<String>,
    pub key_condition: String,
    /// Post-filter applied when the chosen index cannot range on
    /// `created_at`. Less efficient than a key-condition range but
    /// functionally equivalent.
    pub filter_expression: Option<String>,
    pub names: HashMap<String, String>,
    pub values: HashMap<String, AttributeValue>,
}

/// Builds the query plan for a partition keyed on `key_attr = key_value`,
/// optionally restricted to a validated time window.
///
/// Attribute names are always aliased (`#pk`, `#created_at`) so reserved
/// words in the physical schema can never collide with the expression
/// grammar.
pub fn plan_query(
    table: &TableSchema,
    key_attr: &str,
    key_value: &str,
    range: Option<&TimeWindow>,
) -> Result<QueryPlan, SchemaError> {
    let path = table.access_path(key_attr)?;

    let mut names = HashMap::from([("#pk".to_string(), path.partition_attr.to_string())]);
    let mut values = HashMap::from([(
        ":pk".to_string(),
        AttributeValue::S(key_value.to_string()),
    )]);
    let mut key_condition = "#pk = :pk".to_string();
    let mut filter_expression = None;

    if let Some(window) = range {
        names.insert("#created_at".to_string(), CREATED_AT_ATTR.to_string());
        values.insert(
            ":start".to_string(),
            AttributeValue::S(keys::format_timestamp(window.start)),
        );
        values.insert(
            ":end".to_string(),
            AttributeValue::S(keys::format_timestamp(window.end)),
        );

        let clause = "#created_at BETWEEN :start AND :end";
        if path.range_is_created_at() {
            key_condition.push_str(" AND ");
            key_condition.push_str(clause);
        } else {
            filter_expression = Some(clause.to_string());
        }
    }

    Ok(QueryPlan {
        table_name: table.table_name.clone(),
        index_name: path.index_name.map(str::to_string),
        key_condition,
        filter_expression,
        names,
        values,
    })
}

/// Everything needed to issue one partial update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePlan {
    pub expression: String,
    pub names: HashMap<String, String>,
    pub values: HashMap<String, AttributeValue>,
}

/// Builds a `SET` update expression for a partial patch, or `None` when the
/// patch is empty. Fields are assigned placeholders in sorted order so the
/// expression is deterministic.
pub fn plan_update(patch: &FieldPatch) -> Option<UpdatePlan> {
    if patch.is_empty() {
        return None;
    }

    let mut fields: Vec<&String> = patch.keys().collect();
    fields.sort();

    let mut names = HashMap::with_capacity(fields.len());
    let mut values = HashMap::with_capacity(fields.len());
    let mut clauses = Vec::with_capacity(fields.len());

    for (i, field) in fields.into_iter().enumerate() {
        names.insert(format!("#f{i}"), field.clone());
        values.insert(format!(":v{i}"), json_to_attribute(&patch[field]));
        clauses.push(format!("#f{i} = :v{i}"));
    }

    Some(UpdatePlan {
        expression: format!("SET {}", clauses.join(", ")),
        names,
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use paygate_core::schema::{
        default_registry, PK_ATTR, SCHEDULES_TABLE, STATUS_LABEL_ATTR, SUBSCRIPTION_ID_ATTR,
        TOKENS_TABLE, TRANSACTIONS_TABLE, EXPIRY_ATTR,
    };
    use serde_json::json;

    fn window() -> TimeWindow {
        TimeWindow::new(
            Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 4, 30, 23, 59, 59).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_primary_key_query_without_window() {
        let registry = default_registry();
        let table = registry.table(TRANSACTIONS_TABLE).unwrap();

        let plan = plan_query(table, PK_ATTR, "user#u1", None).unwrap();

        assert_eq!(plan.table_name, "paygate_transactions");
        assert_eq!(plan.index_name, None);
        assert_eq!(plan.key_condition, "#pk = :pk");
        assert_eq!(plan.filter_expression, None);
        assert_eq!(plan.names["#pk"], "pk");
        assert_eq!(plan.values[":pk"], AttributeValue::S("user#u1".to_string()));
    }

    #[test]
    fn test_primary_key_query_with_window_uses_post_filter() {
        // The table's own sort key is `sk`, not `created_at`, so the window
        // cannot join the key condition.
        let registry = default_registry();
        let table = registry.table(TRANSACTIONS_TABLE).unwrap();

        let plan = plan_query(table, PK_ATTR, "user#u1", Some(&window())).unwrap();

        assert_eq!(plan.key_condition, "#pk = :pk");
        assert_eq!(
            plan.filter_expression.as_deref(),
            Some("#created_at BETWEEN :start AND :end")
        );
        assert_eq!(plan.names["#created_at"], "created_at");
        assert_eq!(
            plan.values[":start"],
            AttributeValue::S("2025-03-01T00:00:00.000Z".to_string())
        );
        assert_eq!(
            plan.values[":end"],
            AttributeValue::S("2025-04-30T23:59:59.000Z".to_string())
        );
    }

    #[test]
    fn test_gsi_query_with_window_ranges_in_key_condition() {
        let registry = default_registry();
        let table = registry.table(SCHEDULES_TABLE).unwrap();

        let plan = plan_query(table, SUBSCRIPTION_ID_ATTR, "sub#42", Some(&window())).unwrap();

        assert_eq!(plan.index_name.as_deref(), Some("subscription_gsi"));
        assert_eq!(
            plan.key_condition,
            "#pk = :pk AND #created_at BETWEEN :start AND :end"
        );
        assert_eq!(plan.filter_expression, None);
        assert_eq!(plan.names["#pk"], "subscription_id");
    }

    #[test]
    fn test_status_gsi_query() {
        let registry = default_registry();
        let table = registry.table(TRANSACTIONS_TABLE).unwrap();

        let plan = plan_query(table, STATUS_LABEL_ATTR, "status#failed", None).unwrap();

        assert_eq!(plan.index_name.as_deref(), Some("status_gsi"));
        assert_eq!(
            plan.values[":pk"],
            AttributeValue::S("status#failed".to_string())
        );
    }

    #[test]
    fn test_gsi_without_range_key_falls_back_to_post_filter() {
        let registry = default_registry();
        let table = registry.table(TOKENS_TABLE).unwrap();

        let plan = plan_query(table, EXPIRY_ATTR, "2025-07", Some(&window())).unwrap();

        assert_eq!(plan.index_name.as_deref(), Some("expiry_gsi"));
        assert_eq!(plan.key_condition, "#pk = :pk");
        assert!(plan.filter_expression.is_some());
    }

    #[test]
    fn test_unknown_key_attribute_is_an_error() {
        let registry = default_registry();
        let table = registry.table(TOKENS_TABLE).unwrap();

        assert!(plan_query(table, "card_type", "VISA", None).is_err());
    }

    #[test]
    fn test_update_plan_is_deterministic() {
        let patch = FieldPatch::from([
            ("status".to_string(), json!("completed")),
            ("gateway".to_string(), json!("stripe")),
        ]);

        let plan = plan_update(&patch).unwrap();

        // Sorted field order: gateway, status.
        assert_eq!(plan.expression, "SET #f0 = :v0, #f1 = :v1");
        assert_eq!(plan.names["#f0"], "gateway");
        assert_eq!(plan.names["#f1"], "status");
        assert_eq!(plan.values[":v0"], AttributeValue::S("stripe".to_string()));
        assert_eq!(
            plan.values[":v1"],
            AttributeValue::S("completed".to_string())
        );
    }

    #[test]
    fn test_update_plan_empty_patch_is_none() {
        assert_eq!(plan_update(&FieldPatch::new()), None);
    }

    #[test]
    fn test_update_plan_non_string_values() {
        let patch = FieldPatch::from([
            ("handled".to_string(), json!(true)),
            ("retry_count".to_string(), json!(3)),
        ]);

        let plan = plan_update(&patch).unwrap();

        assert_eq!(plan.values[":v0"], AttributeValue::Bool(true));
        assert_eq!(plan.values[":v1"], AttributeValue::N("3".to_string()));
    }
}
