use async_trait::async_trait;

use crate::payment::{ExpiryMonth, OrderRecords, Schedule, Session, Token, Transaction, Webhook};

use super::{FieldPatch, Result, WindowFilter};

/// Repository for transaction records.
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Gets all transactions for a user, optionally restricted to a window.
    async fn transactions_for_user(
        &self,
        user_id: &str,
        window: WindowFilter,
    ) -> Result<Vec<Transaction>>;

    /// Gets all transactions carrying the given composite order label.
    async fn transactions_for_order(
        &self,
        order_id: &str,
        window: WindowFilter,
    ) -> Result<Vec<Transaction>>;

    /// Gets all failed transactions via the status GSI.
    async fn failed_transactions(&self, window: WindowFilter) -> Result<Vec<Transaction>>;

    /// Unconditionally puts a fully-formed transaction.
    async fn save_transaction(&self, transaction: &Transaction) -> Result<()>;

    /// Merges a partial update into the transaction at the exact primary key.
    async fn update_transaction(&self, pk: &str, sk: &str, patch: &FieldPatch) -> Result<()>;

    /// Deletes by primary key; deleting an absent key succeeds.
    async fn delete_transaction(&self, pk: &str, sk: &str) -> Result<()>;
}

/// Repository for checkout session records.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Gets all sessions for a user, optionally restricted to a window.
    async fn sessions_for_user(
        &self,
        user_id: &str,
        window: WindowFilter,
    ) -> Result<Vec<Session>>;

    /// Gets all sessions carrying the given composite order label.
    async fn sessions_for_order(
        &self,
        order_id: &str,
        window: WindowFilter,
    ) -> Result<Vec<Session>>;

    /// Unconditionally puts a fully-formed session.
    async fn save_session(&self, session: &Session) -> Result<()>;

    /// Merges a partial update into the session at the exact primary key.
    async fn update_session(&self, pk: &str, sk: &str, patch: &FieldPatch) -> Result<()>;

    /// Deletes by primary key; deleting an absent key succeeds.
    async fn delete_session(&self, pk: &str, sk: &str) -> Result<()>;
}

/// Repository for recurring-payment schedule records.
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    /// Gets all schedules for a user, optionally restricted to a window.
    async fn schedules_for_user(
        &self,
        user_id: &str,
        window: WindowFilter,
    ) -> Result<Vec<Schedule>>;

    /// Gets all schedules carrying the given composite subscription label.
    async fn schedules_for_subscription(
        &self,
        subscription_id: &str,
        window: WindowFilter,
    ) -> Result<Vec<Schedule>>;

    /// Gets all schedules carrying the given composite order label.
    async fn schedules_for_order(
        &self,
        order_id: &str,
        window: WindowFilter,
    ) -> Result<Vec<Schedule>>;

    /// Unconditionally puts a fully-formed schedule.
    async fn save_schedule(&self, schedule: &Schedule) -> Result<()>;

    /// Merges a partial update into the schedule at the exact primary key.
    async fn update_schedule(&self, pk: &str, sk: &str, patch: &FieldPatch) -> Result<()>;

    /// Deletes by primary key; deleting an absent key succeeds.
    async fn delete_schedule(&self, pk: &str, sk: &str) -> Result<()>;
}

/// Repository for stored card token records.
#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Gets all tokens for a user.
    async fn tokens_for_user(&self, user_id: &str) -> Result<Vec<Token>>;

    /// Gets all tokens expiring in the given month via the expiry GSI.
    async fn tokens_expiring_in(&self, month: ExpiryMonth) -> Result<Vec<Token>>;

    /// Unconditionally puts a fully-formed token.
    async fn save_token(&self, token: &Token) -> Result<()>;

    /// Merges a partial update into the token at the exact primary key.
    async fn update_token(&self, pk: &str, sk: &str, patch: &FieldPatch) -> Result<()>;

    /// Deletes by primary key; deleting an absent key succeeds.
    async fn delete_token(&self, pk: &str, sk: &str) -> Result<()>;
}

/// Repository for received webhook records.
#[async_trait]
pub trait WebhookRepository: Send + Sync {
    /// Gets all webhooks for the given composite order label.
    async fn webhooks_for_order(&self, order_id: &str) -> Result<Vec<Webhook>>;

    /// Gets all webhooks carrying the given composite subscription label.
    async fn webhooks_for_subscription(&self, subscription_id: &str) -> Result<Vec<Webhook>>;

    /// Unconditionally puts a fully-formed webhook.
    async fn save_webhook(&self, webhook: &Webhook) -> Result<()>;

    /// Merges a partial update into the webhook at the exact primary key.
    async fn update_webhook(&self, pk: &str, sk: &str, patch: &FieldPatch) -> Result<()>;

    /// Deletes by primary key; deleting an absent key succeeds.
    async fn delete_webhook(&self, pk: &str, sk: &str) -> Result<()>;
}

/// Composite order lookup: fan-out over the three order-scoped entities.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Gets every transaction, session and schedule carrying the given
    /// composite order label.
    ///
    /// The three queries run concurrently and join fail-fast: one failing
    /// sub-query fails the whole call rather than returning partial data.
    async fn records_for_order(&self, order_id: &str) -> Result<OrderRecords>;
}
