//! DynamoDB attribute conversion functions.
//!
//! Pure functions for converting between DynamoDB AttributeValue maps and
//! domain types. These are testable in isolation without DynamoDB access.
//!
//! Optional GSI attributes (`subscription_id` on webhooks) are omitted from
//! the item when absent, never written as empty strings: an item is only
//! discoverable through a GSI if its partition attribute was populated at
//! write time.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use paygate_core::payment::{
    keys, ExpiryMonth, Schedule, Session, SessionKind, SessionStatus, Token, Transaction,
    TransactionStatus, Webhook,
};
use paygate_core::storage::RepositoryError;

type Item = HashMap<String, AttributeValue>;

// ============================================================================
// Session conversions
// ============================================================================

/// Convert a Session to a DynamoDB item.
pub fn session_to_item(session: &Session) -> Result<Item, RepositoryError> {
    let mut item = Item::new();

    // Keys
    item.insert("pk".to_string(), AttributeValue::S(session.pk()));
    item.insert("sk".to_string(), AttributeValue::S(session.sk()));
    // Order GSI partition attribute
    item.insert(
        "order_id".to_string(),
        AttributeValue::S(session.order_id.clone()),
    );

    // Data
    item.insert(
        "session_id".to_string(),
        AttributeValue::S(session.session_id.to_string()),
    );
    item.insert(
        "user_id".to_string(),
        AttributeValue::S(session.user_id.clone()),
    );
    item.insert(
        "kind".to_string(),
        AttributeValue::S(session.kind.as_str().to_string()),
    );
    item.insert(
        "gateway".to_string(),
        AttributeValue::S(session.gateway.clone()),
    );
    item.insert(
        "status".to_string(),
        AttributeValue::S(session.status.as_str().to_string()),
    );
    item.insert(
        "payloads".to_string(),
        AttributeValue::S(encode_json(&session.payloads)?),
    );
    if let Some(transaction_id) = &session.transaction_id {
        item.insert(
            "transaction_id".to_string(),
            AttributeValue::S(transaction_id.clone()),
        );
    }
    if let Some(redirect_url) = &session.redirect_url {
        item.insert(
            "redirect_url".to_string(),
            AttributeValue::S(redirect_url.clone()),
        );
    }
    item.insert(
        "created_at".to_string(),
        AttributeValue::S(keys::format_timestamp(session.created_at)),
    );

    Ok(item)
}

/// Convert a DynamoDB item to a Session.
pub fn item_to_session(item: &Item) -> Result<Session, RepositoryError> {
    Ok(Session {
        session_id: get_uuid(item, "session_id")?,
        user_id: get_string(item, "user_id")?,
        order_id: get_string(item, "order_id")?,
        kind: parse_session_kind(&get_string(item, "kind")?)?,
        gateway: get_string(item, "gateway")?,
        status: parse_session_status(&get_string(item, "status")?)?,
        payloads: decode_json(&get_string(item, "payloads")?)?,
        transaction_id: get_optional_string(item, "transaction_id"),
        redirect_url: get_optional_string(item, "redirect_url"),
        created_at: get_datetime(item, "created_at")?,
    })
}

// ============================================================================
// Transaction conversions
// ============================================================================

/// Convert a Transaction to a DynamoDB item.
pub fn transaction_to_item(transaction: &Transaction) -> Result<Item, RepositoryError> {
    let mut item = Item::new();

    // Keys
    item.insert("pk".to_string(), AttributeValue::S(transaction.pk()));
    item.insert("sk".to_string(), AttributeValue::S(transaction.sk()));
    // GSI partition attributes: order and composite status label
    item.insert(
        "order_id".to_string(),
        AttributeValue::S(transaction.order_id.clone()),
    );
    item.insert(
        "status_label".to_string(),
        AttributeValue::S(transaction.status_label()),
    );

    // Data
    item.insert(
        "transaction_id".to_string(),
        AttributeValue::S(transaction.transaction_id.to_string()),
    );
    item.insert(
        "user_id".to_string(),
        AttributeValue::S(transaction.user_id.clone()),
    );
    item.insert(
        "order_type".to_string(),
        AttributeValue::S(transaction.order_type.clone()),
    );
    item.insert(
        "status".to_string(),
        AttributeValue::S(transaction.status.as_str().to_string()),
    );
    item.insert(
        "payloads".to_string(),
        AttributeValue::S(encode_json(&transaction.payloads)?),
    );
    if let Some(card_last4) = &transaction.card_last4 {
        item.insert(
            "card_last4".to_string(),
            AttributeValue::S(card_last4.clone()),
        );
    }
    if let Some(card_type) = &transaction.card_type {
        item.insert(
            "card_type".to_string(),
            AttributeValue::S(card_type.clone()),
        );
    }
    if let Some(card_holder_name) = &transaction.card_holder_name {
        item.insert(
            "card_holder_name".to_string(),
            AttributeValue::S(card_holder_name.clone()),
        );
    }
    if let Some(token_id) = &transaction.token_id {
        item.insert("token_id".to_string(), AttributeValue::S(token_id.clone()));
    }
    item.insert(
        "created_at".to_string(),
        AttributeValue::S(keys::format_timestamp(transaction.created_at)),
    );

    Ok(item)
}

/// Convert a DynamoDB item to a Transaction.
pub fn item_to_transaction(item: &Item) -> Result<Transaction, RepositoryError> {
    Ok(Transaction {
        transaction_id: get_uuid(item, "transaction_id")?,
        user_id: get_string(item, "user_id")?,
        order_id: get_string(item, "order_id")?,
        order_type: get_string(item, "order_type")?,
        status: parse_transaction_status(&get_string(item, "status")?)?,
        payloads: decode_json(&get_string(item, "payloads")?)?,
        card_last4: get_optional_string(item, "card_last4"),
        card_type: get_optional_string(item, "card_type"),
        card_holder_name: get_optional_string(item, "card_holder_name"),
        token_id: get_optional_string(item, "token_id"),
        created_at: get_datetime(item, "created_at")?,
    })
}

// ============================================================================
// Schedule conversions
// ============================================================================

/// Convert a Schedule to a DynamoDB item.
pub fn schedule_to_item(schedule: &Schedule) -> Result<Item, RepositoryError> {
    let mut item = Item::new();

    // Keys
    item.insert("pk".to_string(), AttributeValue::S(schedule.pk()));
    item.insert("sk".to_string(), AttributeValue::S(schedule.sk()));
    // GSI partition attributes
    item.insert(
        "subscription_id".to_string(),
        AttributeValue::S(schedule.subscription_id.clone()),
    );
    item.insert(
        "order_id".to_string(),
        AttributeValue::S(schedule.order_id.clone()),
    );

    // Data
    item.insert(
        "schedule_id".to_string(),
        AttributeValue::S(schedule.schedule_id.to_string()),
    );
    item.insert(
        "user_id".to_string(),
        AttributeValue::S(schedule.user_id.clone()),
    );
    item.insert(
        "status".to_string(),
        AttributeValue::S(schedule.status.clone()),
    );
    item.insert(
        "frequency".to_string(),
        AttributeValue::S(schedule.frequency.clone()),
    );
    item.insert(
        "amount".to_string(),
        AttributeValue::S(schedule.amount.clone()),
    );
    item.insert(
        "currency".to_string(),
        AttributeValue::S(schedule.currency.clone()),
    );
    item.insert(
        "registration_id".to_string(),
        AttributeValue::S(schedule.registration_id.clone()),
    );
    item.insert(
        "start_date".to_string(),
        AttributeValue::S(keys::format_timestamp(schedule.start_date)),
    );
    item.insert(
        "next_schedule_date".to_string(),
        AttributeValue::S(keys::format_timestamp(schedule.next_schedule_date)),
    );
    if let Some(checkout_id) = &schedule.checkout_id {
        item.insert(
            "checkout_id".to_string(),
            AttributeValue::S(checkout_id.clone()),
        );
    }
    if let Some(args) = &schedule.create_schedule_args {
        item.insert(
            "create_schedule_args".to_string(),
            AttributeValue::S(encode_json(args)?),
        );
    }
    if let Some(response) = &schedule.create_schedule_response {
        item.insert(
            "create_schedule_response".to_string(),
            AttributeValue::S(encode_json(response)?),
        );
    }
    if let Some(notes) = &schedule.notes {
        item.insert("notes".to_string(), AttributeValue::S(notes.clone()));
    }
    item.insert(
        "created_at".to_string(),
        AttributeValue::S(keys::format_timestamp(schedule.created_at)),
    );

    Ok(item)
}

/// Convert a DynamoDB item to a Schedule.
pub fn item_to_schedule(item: &Item) -> Result<Schedule, RepositoryError> {
    Ok(Schedule {
        schedule_id: get_uuid(item, "schedule_id")?,
        user_id: get_string(item, "user_id")?,
        order_id: get_string(item, "order_id")?,
        subscription_id: get_string(item, "subscription_id")?,
        status: get_string(item, "status")?,
        frequency: get_string(item, "frequency")?,
        amount: get_string(item, "amount")?,
        currency: get_string(item, "currency")?,
        registration_id: get_string(item, "registration_id")?,
        start_date: get_datetime(item, "start_date")?,
        next_schedule_date: get_datetime(item, "next_schedule_date")?,
        checkout_id: get_optional_string(item, "checkout_id"),
        create_schedule_args: get_optional_json(item, "create_schedule_args")?,
        create_schedule_response: get_optional_json(item, "create_schedule_response")?,
        notes: get_optional_string(item, "notes"),
        created_at: get_datetime(item, "created_at")?,
    })
}

// ============================================================================
// Token conversions
// ============================================================================

/// Convert a Token to a DynamoDB item.
pub fn token_to_item(token: &Token) -> Item {
    let mut item = Item::new();

    // Keys
    item.insert("pk".to_string(), AttributeValue::S(token.pk()));
    item.insert("sk".to_string(), AttributeValue::S(token.sk()));
    // Expiry GSI partition attribute, canonical YYYY-MM
    item.insert(
        "expiry".to_string(),
        AttributeValue::S(token.expiry.to_string()),
    );

    // Data
    item.insert(
        "token_id".to_string(),
        AttributeValue::S(token.token_id.to_string()),
    );
    item.insert(
        "user_id".to_string(),
        AttributeValue::S(token.user_id.clone()),
    );
    item.insert(
        "registration_id".to_string(),
        AttributeValue::S(token.registration_id.clone()),
    );
    item.insert("last4".to_string(), AttributeValue::S(token.last4.clone()));
    item.insert(
        "holder_name".to_string(),
        AttributeValue::S(token.holder_name.clone()),
    );
    item.insert(
        "card_type".to_string(),
        AttributeValue::S(token.card_type.clone()),
    );
    item.insert(
        "created_at".to_string(),
        AttributeValue::S(keys::format_timestamp(token.created_at)),
    );

    item
}

/// Convert a DynamoDB item to a Token.
pub fn item_to_token(item: &Item) -> Result<Token, RepositoryError> {
    let expiry: ExpiryMonth = get_string(item, "expiry")?
        .parse()
        .map_err(|e| RepositoryError::InvalidData(format!("Invalid expiry: {e}")))?;

    Ok(Token {
        token_id: get_uuid(item, "token_id")?,
        user_id: get_string(item, "user_id")?,
        registration_id: get_string(item, "registration_id")?,
        last4: get_string(item, "last4")?,
        expiry,
        holder_name: get_string(item, "holder_name")?,
        card_type: get_string(item, "card_type")?,
        created_at: get_datetime(item, "created_at")?,
    })
}

// ============================================================================
// Webhook conversions
// ============================================================================

/// Convert a Webhook to a DynamoDB item.
///
/// The composite order label is the partition key itself; it is not
/// duplicated into a separate attribute.
pub fn webhook_to_item(webhook: &Webhook) -> Result<Item, RepositoryError> {
    let mut item = Item::new();

    // Keys
    item.insert("pk".to_string(), AttributeValue::S(webhook.pk()));
    item.insert("sk".to_string(), AttributeValue::S(webhook.sk()));
    // Subscription GSI partition attribute, present only when populated
    if let Some(subscription_id) = &webhook.subscription_id {
        item.insert(
            "subscription_id".to_string(),
            AttributeValue::S(subscription_id.clone()),
        );
    }

    // Data
    item.insert(
        "webhook_id".to_string(),
        AttributeValue::S(webhook.webhook_id.to_string()),
    );
    item.insert(
        "payload".to_string(),
        AttributeValue::S(encode_json(&webhook.payload)?),
    );
    item.insert(
        "action_taken".to_string(),
        AttributeValue::S(webhook.action_taken.clone()),
    );
    item.insert(
        "handled".to_string(),
        AttributeValue::Bool(webhook.handled),
    );
    item.insert(
        "idempotency_key".to_string(),
        AttributeValue::S(webhook.idempotency_key.clone()),
    );
    item.insert(
        "created_at".to_string(),
        AttributeValue::S(keys::format_timestamp(webhook.created_at)),
    );

    Ok(item)
}

/// Convert a DynamoDB item to a Webhook.
pub fn item_to_webhook(item: &Item) -> Result<Webhook, RepositoryError> {
    Ok(Webhook {
        webhook_id: get_uuid(item, "webhook_id")?,
        order_id: get_string(item, "pk")?,
        payload: decode_json(&get_string(item, "payload")?)?,
        action_taken: get_string(item, "action_taken")?,
        handled: get_bool(item, "handled")?,
        idempotency_key: get_string(item, "idempotency_key")?,
        subscription_id: get_optional_string(item, "subscription_id"),
        created_at: get_datetime(item, "created_at")?,
    })
}

// ============================================================================
// Status conversions
// ============================================================================

/// Parse SessionKind from its wire form.
pub fn parse_session_kind(s: &str) -> Result<SessionKind, RepositoryError> {
    match s {
        "card" => Ok(SessionKind::Card),
        "token" => Ok(SessionKind::Token),
        _ => Err(RepositoryError::InvalidData(format!(
            "Unknown session kind: {s}"
        ))),
    }
}

/// Parse SessionStatus from its wire form.
pub fn parse_session_status(s: &str) -> Result<SessionStatus, RepositoryError> {
    match s {
        "pending" => Ok(SessionStatus::Pending),
        "completed" => Ok(SessionStatus::Completed),
        _ => Err(RepositoryError::InvalidData(format!(
            "Unknown session status: {s}"
        ))),
    }
}

/// Parse TransactionStatus from its wire form.
pub fn parse_transaction_status(s: &str) -> Result<TransactionStatus, RepositoryError> {
    match s {
        "success" => Ok(TransactionStatus::Success),
        "failed" => Ok(TransactionStatus::Failed),
        _ => Err(RepositoryError::InvalidData(format!(
            "Unknown transaction status: {s}"
        ))),
    }
}

// ============================================================================
// Patch value conversion
// ============================================================================

/// Convert a JSON patch value to the corresponding AttributeValue.
pub fn json_to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(items) => AttributeValue::L(items.iter().map(json_to_attribute).collect()),
        Value::Object(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_attribute(v)))
                .collect(),
        ),
    }
}

// ============================================================================
// Helper functions
// ============================================================================

fn encode_json<T: serde::Serialize>(value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value).map_err(|e| RepositoryError::Serialization(e.to_string()))
}

fn decode_json<T: serde::de::DeserializeOwned>(json: &str) -> Result<T, RepositoryError> {
    serde_json::from_str(json).map_err(|e| RepositoryError::Serialization(e.to_string()))
}

/// Get a required string attribute.
fn get_string(item: &Item, key: &str) -> Result<String, RepositoryError> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .map(|s| s.to_string())
        .ok_or_else(|| RepositoryError::InvalidData(format!("Missing or invalid field: {key}")))
}

/// Get an optional string attribute.
fn get_optional_string(item: &Item, key: &str) -> Option<String> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .map(|s| s.to_string())
}

/// Get a required boolean attribute.
fn get_bool(item: &Item, key: &str) -> Result<bool, RepositoryError> {
    item.get(key)
        .and_then(|v| v.as_bool().ok())
        .copied()
        .ok_or_else(|| RepositoryError::InvalidData(format!("Missing or invalid field: {key}")))
}

/// Get a required UUID attribute.
fn get_uuid(item: &Item, key: &str) -> Result<Uuid, RepositoryError> {
    let s = get_string(item, key)?;
    Uuid::parse_str(&s)
        .map_err(|e| RepositoryError::InvalidData(format!("Invalid UUID {key}: {e}")))
}

/// Get a required datetime attribute (RFC 3339 format).
fn get_datetime(item: &Item, key: &str) -> Result<DateTime<Utc>, RepositoryError> {
    let s = get_string(item, key)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::InvalidData(format!("Invalid datetime {key}: {e}")))
}

/// Get an optional JSON-encoded attribute.
fn get_optional_json(item: &Item, key: &str) -> Result<Option<Value>, RepositoryError> {
    match get_optional_string(item, key) {
        Some(json) => Ok(Some(decode_json(&json)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use paygate_core::payment::Payloads;
    use serde_json::json;

    fn created_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 10, 30, 0).unwrap()
    }

    fn sample_payloads() -> Payloads {
        Payloads {
            request_data: json!({"amount": 100}),
            response_data: json!({"result": "ok"}),
        }
    }

    fn sample_session() -> Session {
        Session::new(
            "user123",
            "order#1009",
            SessionKind::Card,
            "stripe",
            sample_payloads(),
        )
        .with_status(SessionStatus::Completed)
        .with_redirect_url("https://example.com/return")
        .with_created_at(created_at())
    }

    fn sample_transaction() -> Transaction {
        Transaction::new(
            "user123",
            "order#1009",
            "purchase",
            TransactionStatus::Failed,
            sample_payloads(),
        )
        .with_card("4242", "VISA", "John Doe")
        .with_created_at(created_at())
    }

    fn sample_schedule() -> Schedule {
        Schedule::new(
            "user123",
            "order#1009",
            "sub#42",
            "pending",
            "monthly",
            "9.99",
            "USD",
            "reg#1000",
            created_at(),
            created_at(),
        )
        .with_created_at(created_at())
    }

    fn sample_token() -> Token {
        Token::new(
            "user123",
            "reg#1000",
            "4242",
            ExpiryMonth::new(2025, 7).unwrap(),
            "John Doe",
            "VISA",
        )
        .with_created_at(created_at())
    }

    fn sample_webhook() -> Webhook {
        Webhook::new(
            "order#1009",
            json!({"event": "charge.success", "amount": 100}),
            "payment_succeeded",
            true,
            "idem-1000",
        )
        .with_subscription_id("sub#42")
        .with_created_at(created_at())
    }

    #[test]
    fn test_session_round_trip() {
        let session = sample_session();
        let item = session_to_item(&session).unwrap();
        let parsed = item_to_session(&item).unwrap();
        assert_eq!(session, parsed);
    }

    #[test]
    fn test_session_item_has_canonical_keys() {
        let item = session_to_item(&sample_session()).unwrap();
        assert_eq!(item["pk"].as_s().unwrap(), "user#user123");
        assert!(item["sk"].as_s().unwrap().starts_with("session#"));
        assert_eq!(item["order_id"].as_s().unwrap(), "order#1009");
        assert_eq!(
            item["created_at"].as_s().unwrap(),
            "2025-01-15T10:30:00.000Z"
        );
    }

    #[test]
    fn test_transaction_round_trip() {
        let transaction = sample_transaction();
        let item = transaction_to_item(&transaction).unwrap();
        let parsed = item_to_transaction(&item).unwrap();
        assert_eq!(transaction, parsed);
    }

    #[test]
    fn test_transaction_item_carries_status_label() {
        let item = transaction_to_item(&sample_transaction()).unwrap();
        assert_eq!(item["status_label"].as_s().unwrap(), "status#failed");
        assert_eq!(item["status"].as_s().unwrap(), "failed");
    }

    #[test]
    fn test_schedule_round_trip() {
        let schedule = sample_schedule();
        let item = schedule_to_item(&schedule).unwrap();
        let parsed = item_to_schedule(&item).unwrap();
        assert_eq!(schedule, parsed);
    }

    #[test]
    fn test_schedule_optional_fields_are_omitted() {
        let item = schedule_to_item(&sample_schedule()).unwrap();
        assert!(!item.contains_key("checkout_id"));
        assert!(!item.contains_key("notes"));
        assert!(!item.contains_key("create_schedule_args"));
    }

    #[test]
    fn test_token_round_trip() {
        let token = sample_token();
        let item = token_to_item(&token);
        let parsed = item_to_token(&item).unwrap();
        assert_eq!(token, parsed);
    }

    #[test]
    fn test_token_item_expiry_is_canonical() {
        let item = token_to_item(&sample_token());
        assert_eq!(item["expiry"].as_s().unwrap(), "2025-07");
    }

    #[test]
    fn test_webhook_round_trip() {
        let webhook = sample_webhook();
        let item = webhook_to_item(&webhook).unwrap();
        let parsed = item_to_webhook(&item).unwrap();
        assert_eq!(webhook, parsed);
    }

    #[test]
    fn test_webhook_without_subscription_omits_gsi_attribute() {
        let webhook = Webhook::new("order#1009", json!({}), "noop", false, "idem-1")
            .with_created_at(created_at());
        let item = webhook_to_item(&webhook).unwrap();
        assert!(!item.contains_key("subscription_id"));

        let parsed = item_to_webhook(&item).unwrap();
        assert_eq!(parsed.subscription_id, None);
    }

    #[test]
    fn test_status_parsers_reject_unknown_values() {
        assert!(parse_session_kind("wire").is_err());
        assert!(parse_session_status("done").is_err());
        assert!(parse_transaction_status("pending").is_err());
    }

    #[test]
    fn test_json_to_attribute_variants() {
        assert_eq!(
            json_to_attribute(&json!("s")),
            AttributeValue::S("s".to_string())
        );
        assert_eq!(
            json_to_attribute(&json!(42)),
            AttributeValue::N("42".to_string())
        );
        assert_eq!(json_to_attribute(&json!(true)), AttributeValue::Bool(true));
        assert_eq!(json_to_attribute(&json!(null)), AttributeValue::Null(true));

        let list = json_to_attribute(&json!(["a", 1]));
        assert_eq!(
            list,
            AttributeValue::L(vec![
                AttributeValue::S("a".to_string()),
                AttributeValue::N("1".to_string()),
            ])
        );

        let map = json_to_attribute(&json!({"k": "v"}));
        match map {
            AttributeValue::M(m) => {
                assert_eq!(m["k"], AttributeValue::S("v".to_string()));
            }
            other => panic!("expected a map, got {other:?}"),
        }
    }

    #[test]
    fn test_get_string_missing_field() {
        let item = Item::new();
        assert!(get_string(&item, "missing").is_err());
    }
}
