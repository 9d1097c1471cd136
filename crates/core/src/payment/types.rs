use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use super::keys;

/// Request/response payloads captured from a gateway exchange.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Payloads {
    pub request_data: Value,
    pub response_data: Value,
}

/// How a checkout session is funded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Card,
    Token,
}

impl SessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Card => "card",
            SessionKind::Token => "token",
        }
    }
}

/// Lifecycle state of a checkout session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Completed => "completed",
        }
    }
}

/// Terminal state of a gateway transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Success,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Success => "success",
            TransactionStatus::Failed => "failed",
        }
    }
}

/// A checkout session record.
///
/// `order_id` holds the composite order label (e.g. `order#1009`) exactly as
/// it is stored in the order GSI; correlation across entities is by this
/// shared value only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: Uuid,
    pub user_id: String,
    pub order_id: String,
    pub kind: SessionKind,
    pub gateway: String,
    pub status: SessionStatus,
    pub payloads: Payloads,
    pub transaction_id: Option<String>,
    pub redirect_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Creates a new pending session.
    pub fn new(
        user_id: impl Into<String>,
        order_id: impl Into<String>,
        kind: SessionKind,
        gateway: impl Into<String>,
        payloads: Payloads,
    ) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            user_id: user_id.into(),
            order_id: order_id.into(),
            kind,
            gateway: gateway.into(),
            status: SessionStatus::Pending,
            payloads,
            transaction_id: None,
            redirect_url: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_status(mut self, status: SessionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_redirect_url(mut self, url: impl Into<String>) -> Self {
        self.redirect_url = Some(url.into());
        self
    }

    /// Sets a specific creation timestamp (useful for testing).
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn pk(&self) -> String {
        keys::user_pk(&self.user_id)
    }

    pub fn sk(&self) -> String {
        keys::session_sk(self.session_id)
    }
}

/// A gateway transaction record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: Uuid,
    pub user_id: String,
    pub order_id: String,
    pub order_type: String,
    pub status: TransactionStatus,
    pub payloads: Payloads,
    pub card_last4: Option<String>,
    pub card_type: Option<String>,
    pub card_holder_name: Option<String>,
    pub token_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        user_id: impl Into<String>,
        order_id: impl Into<String>,
        order_type: impl Into<String>,
        status: TransactionStatus,
        payloads: Payloads,
    ) -> Self {
        Self {
            transaction_id: Uuid::new_v4(),
            user_id: user_id.into(),
            order_id: order_id.into(),
            order_type: order_type.into(),
            status,
            payloads,
            card_last4: None,
            card_type: None,
            card_holder_name: None,
            token_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_card(
        mut self,
        last4: impl Into<String>,
        card_type: impl Into<String>,
        holder_name: impl Into<String>,
    ) -> Self {
        self.card_last4 = Some(last4.into());
        self.card_type = Some(card_type.into());
        self.card_holder_name = Some(holder_name.into());
        self
    }

    pub fn with_token_id(mut self, token_id: impl Into<String>) -> Self {
        self.token_id = Some(token_id.into());
        self
    }

    /// Sets a specific creation timestamp (useful for testing).
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn pk(&self) -> String {
        keys::user_pk(&self.user_id)
    }

    pub fn sk(&self) -> String {
        keys::transaction_sk(self.transaction_id)
    }

    /// The composite status label written to the status GSI.
    pub fn status_label(&self) -> String {
        keys::status_label(self.status.as_str())
    }
}

/// A recurring-payment schedule record.
///
/// `subscription_id` holds the composite subscription label (e.g. `sub#42`)
/// exactly as stored in the subscription GSI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub schedule_id: Uuid,
    pub user_id: String,
    pub order_id: String,
    pub subscription_id: String,
    pub status: String,
    pub frequency: String,
    pub amount: String,
    pub currency: String,
    pub registration_id: String,
    pub start_date: DateTime<Utc>,
    pub next_schedule_date: DateTime<Utc>,
    pub checkout_id: Option<String>,
    pub create_schedule_args: Option<Value>,
    pub create_schedule_response: Option<Value>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Schedule {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: impl Into<String>,
        order_id: impl Into<String>,
        subscription_id: impl Into<String>,
        status: impl Into<String>,
        frequency: impl Into<String>,
        amount: impl Into<String>,
        currency: impl Into<String>,
        registration_id: impl Into<String>,
        start_date: DateTime<Utc>,
        next_schedule_date: DateTime<Utc>,
    ) -> Self {
        Self {
            schedule_id: Uuid::new_v4(),
            user_id: user_id.into(),
            order_id: order_id.into(),
            subscription_id: subscription_id.into(),
            status: status.into(),
            frequency: frequency.into(),
            amount: amount.into(),
            currency: currency.into(),
            registration_id: registration_id.into(),
            start_date,
            next_schedule_date,
            checkout_id: None,
            create_schedule_args: None,
            create_schedule_response: None,
            notes: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Sets a specific creation timestamp (useful for testing).
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn pk(&self) -> String {
        keys::user_pk(&self.user_id)
    }

    pub fn sk(&self) -> String {
        keys::schedule_sk(self.schedule_id)
    }
}

/// Returned when an expiry month string is not `YYYY-MM`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid expiry month, expected YYYY-MM")]
pub struct InvalidExpiryMonth;

/// A card expiry month in canonical `YYYY-MM` form.
///
/// The expiry GSI partitions tokens by this string, so the zero-padded
/// canonical form is enforced at construction rather than trusted at the
/// write boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExpiryMonth {
    year: i32,
    month: u32,
}

impl ExpiryMonth {
    pub fn new(year: i32, month: u32) -> Result<Self, InvalidExpiryMonth> {
        if !(1..=12).contains(&month) || !(1000..=9999).contains(&year) {
            return Err(InvalidExpiryMonth);
        }
        Ok(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }
}

impl std::fmt::Display for ExpiryMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl std::str::FromStr for ExpiryMonth {
    type Err = InvalidExpiryMonth;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s.split_once('-').ok_or(InvalidExpiryMonth)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(InvalidExpiryMonth);
        }
        let year: i32 = year.parse().map_err(|_| InvalidExpiryMonth)?;
        let month: u32 = month.parse().map_err(|_| InvalidExpiryMonth)?;
        Self::new(year, month)
    }
}

impl TryFrom<String> for ExpiryMonth {
    type Error = InvalidExpiryMonth;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ExpiryMonth> for String {
    fn from(m: ExpiryMonth) -> Self {
        m.to_string()
    }
}

/// A stored card token record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub token_id: Uuid,
    pub user_id: String,
    pub registration_id: String,
    pub last4: String,
    pub expiry: ExpiryMonth,
    pub holder_name: String,
    pub card_type: String,
    pub created_at: DateTime<Utc>,
}

impl Token {
    pub fn new(
        user_id: impl Into<String>,
        registration_id: impl Into<String>,
        last4: impl Into<String>,
        expiry: ExpiryMonth,
        holder_name: impl Into<String>,
        card_type: impl Into<String>,
    ) -> Self {
        Self {
            token_id: Uuid::new_v4(),
            user_id: user_id.into(),
            registration_id: registration_id.into(),
            last4: last4.into(),
            expiry,
            holder_name: holder_name.into(),
            card_type: card_type.into(),
            created_at: Utc::now(),
        }
    }

    /// Sets a specific creation timestamp (useful for testing).
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn pk(&self) -> String {
        keys::user_pk(&self.user_id)
    }

    pub fn sk(&self) -> String {
        keys::token_sk(self.token_id)
    }
}

/// A received gateway webhook record.
///
/// Webhooks are partitioned by order, so the composite order label is the
/// partition key itself. `subscription_id` is optional; a webhook is only
/// discoverable through the subscription GSI when it was populated at write
/// time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Webhook {
    pub webhook_id: Uuid,
    pub order_id: String,
    pub payload: Value,
    pub action_taken: String,
    pub handled: bool,
    pub idempotency_key: String,
    pub subscription_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Webhook {
    pub fn new(
        order_id: impl Into<String>,
        payload: Value,
        action_taken: impl Into<String>,
        handled: bool,
        idempotency_key: impl Into<String>,
    ) -> Self {
        Self {
            webhook_id: Uuid::new_v4(),
            order_id: order_id.into(),
            payload,
            action_taken: action_taken.into(),
            handled,
            idempotency_key: idempotency_key.into(),
            subscription_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_subscription_id(mut self, subscription_id: impl Into<String>) -> Self {
        self.subscription_id = Some(subscription_id.into());
        self
    }

    /// Sets a specific creation timestamp (useful for testing).
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn pk(&self) -> String {
        self.order_id.clone()
    }

    pub fn sk(&self) -> String {
        keys::webhook_sk(self.webhook_id)
    }
}

/// Everything recorded against a single order, one list per entity.
///
/// Each list is an independent point-in-time read; there is no cross-query
/// consistency guarantee.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderRecords {
    pub transactions: Vec<Transaction>,
    pub sessions: Vec<Session>,
    pub schedules: Vec<Schedule>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_month_display() {
        let m = ExpiryMonth::new(2025, 7).unwrap();
        assert_eq!(m.to_string(), "2025-07");
    }

    #[test]
    fn test_expiry_month_parse_round_trip() {
        let m: ExpiryMonth = "2025-12".parse().unwrap();
        assert_eq!(m.year(), 2025);
        assert_eq!(m.month(), 12);
        assert_eq!(m.to_string(), "2025-12");
    }

    #[test]
    fn test_expiry_month_rejects_bad_input() {
        assert!("2025-13".parse::<ExpiryMonth>().is_err());
        assert!("2025-0".parse::<ExpiryMonth>().is_err());
        assert!("25-07".parse::<ExpiryMonth>().is_err());
        assert!("garbage".parse::<ExpiryMonth>().is_err());
        assert!(ExpiryMonth::new(2025, 0).is_err());
    }

    #[test]
    fn test_transaction_status_label() {
        let txn = Transaction::new(
            "u1",
            "order#9",
            "purchase",
            TransactionStatus::Failed,
            Payloads::default(),
        );
        assert_eq!(txn.status_label(), "status#failed");
    }

    #[test]
    fn test_session_keys() {
        let session = Session::new(
            "u1",
            "order#9",
            SessionKind::Card,
            "stripe",
            Payloads::default(),
        );
        assert_eq!(session.pk(), "user#u1");
        assert!(session.sk().starts_with("session#"));
    }

    #[test]
    fn test_webhook_pk_is_order_label() {
        let webhook = Webhook::new(
            "order#9",
            serde_json::json!({"event": "charge.success"}),
            "payment_succeeded",
            true,
            "idem-1",
        );
        assert_eq!(webhook.pk(), "order#9");
        assert!(webhook.sk().starts_with("webhook#"));
    }
}
