//! Key and label generation functions.
//!
//! Pure functions for building partition keys, sort keys, and composite GSI
//! labels. All writers and readers go through these helpers so the label
//! conventions cannot drift between the two sides.

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

// ============================================================================
// Key prefixes
// ============================================================================

pub const USER_PREFIX: &str = "user#";
pub const ORDER_PREFIX: &str = "order#";
pub const SUBSCRIPTION_PREFIX: &str = "sub#";
pub const SESSION_PREFIX: &str = "session#";
pub const TRANSACTION_PREFIX: &str = "txn#";
pub const SCHEDULE_PREFIX: &str = "schedule#";
pub const TOKEN_PREFIX: &str = "token#";
pub const WEBHOOK_PREFIX: &str = "webhook#";
pub const STATUS_PREFIX: &str = "status#";

// ============================================================================
// Partition keys
// ============================================================================

/// Partition key for user-scoped records.
///
/// Pattern: `user#<user_id>`
pub fn user_pk(user_id: &str) -> String {
    format!("{USER_PREFIX}{user_id}")
}

/// Composite order label, used as the webhook partition key and as the order
/// GSI partition value on transactions, sessions and schedules.
///
/// Pattern: `order#<order_id>`
pub fn order_label(order_id: &str) -> String {
    format!("{ORDER_PREFIX}{order_id}")
}

/// Composite subscription label, used as the subscription GSI partition
/// value on schedules and webhooks.
///
/// Pattern: `sub#<subscription_id>`
pub fn subscription_label(subscription_id: &str) -> String {
    format!("{SUBSCRIPTION_PREFIX}{subscription_id}")
}

// ============================================================================
// Sort keys
// ============================================================================

/// Sort key for a Session.
///
/// Pattern: `session#<session_id>`
pub fn session_sk(session_id: Uuid) -> String {
    format!("{SESSION_PREFIX}{session_id}")
}

/// Sort key for a Transaction.
///
/// Pattern: `txn#<transaction_id>`
pub fn transaction_sk(transaction_id: Uuid) -> String {
    format!("{TRANSACTION_PREFIX}{transaction_id}")
}

/// Sort key for a Schedule.
///
/// Pattern: `schedule#<schedule_id>`
pub fn schedule_sk(schedule_id: Uuid) -> String {
    format!("{SCHEDULE_PREFIX}{schedule_id}")
}

/// Sort key for a Token.
///
/// Pattern: `token#<token_id>`
pub fn token_sk(token_id: Uuid) -> String {
    format!("{TOKEN_PREFIX}{token_id}")
}

/// Sort key for a Webhook.
///
/// Pattern: `webhook#<webhook_id>`
pub fn webhook_sk(webhook_id: Uuid) -> String {
    format!("{WEBHOOK_PREFIX}{webhook_id}")
}

// ============================================================================
// GSI labels
// ============================================================================

/// Composite status label written to the status GSI.
///
/// Pattern: `status#<status>`
pub fn status_label(status: &str) -> String {
    format!("{STATUS_PREFIX}{status}")
}

// ============================================================================
// Timestamps
// ============================================================================

/// Canonical wire form of a timestamp: RFC 3339 UTC with millisecond
/// precision and a `Z` suffix (`2025-03-01T00:00:00.000Z`).
///
/// The store compares `created_at` lexicographically, so every written
/// timestamp and every range bound must use this exact form.
pub fn format_timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_user_pk() {
        assert_eq!(user_pk("user123"), "user#user123");
    }

    #[test]
    fn test_order_and_subscription_labels() {
        assert_eq!(order_label("1009"), "order#1009");
        assert_eq!(subscription_label("42"), "sub#42");
    }

    #[test]
    fn test_sort_keys() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440001").unwrap();
        assert_eq!(
            session_sk(id),
            "session#550e8400-e29b-41d4-a716-446655440001"
        );
        assert_eq!(
            transaction_sk(id),
            "txn#550e8400-e29b-41d4-a716-446655440001"
        );
        assert_eq!(
            schedule_sk(id),
            "schedule#550e8400-e29b-41d4-a716-446655440001"
        );
        assert_eq!(token_sk(id), "token#550e8400-e29b-41d4-a716-446655440001");
        assert_eq!(
            webhook_sk(id),
            "webhook#550e8400-e29b-41d4-a716-446655440001"
        );
    }

    #[test]
    fn test_status_label() {
        assert_eq!(status_label("failed"), "status#failed");
        assert_eq!(status_label("success"), "status#success");
    }

    #[test]
    fn test_format_timestamp_is_lexicographically_ordered() {
        let earlier = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2025, 4, 30, 23, 59, 59).unwrap();

        let a = format_timestamp(earlier);
        let b = format_timestamp(later);

        assert_eq!(a, "2025-03-01T00:00:00.000Z");
        assert!(a < b);
    }
}
