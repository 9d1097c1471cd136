//! In-memory repository implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

use paygate_core::payment::{
    ExpiryMonth, OrderRecords, Schedule, Session, Token, Transaction, TransactionStatus, Webhook,
};
use paygate_core::storage::{
    FieldPatch, OrderRepository, RepositoryError, Result, ScheduleRepository, SessionRepository,
    TokenRepository, TransactionRepository, WebhookRepository, WindowFilter,
};

/// Storage key: the same (pk, sk) pair the DynamoDB backend uses.
type Key = (String, String);

type Store<T> = Arc<RwLock<HashMap<Key, T>>>;

/// In-memory storage backend for testing.
///
/// One map per table, keyed by (pk, sk). Mutation semantics mirror the
/// DynamoDB backend: save overwrites, update requires an existing key,
/// delete of an absent key succeeds.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    sessions: Store<Session>,
    transactions: Store<Transaction>,
    schedules: Store<Schedule>,
    tokens: Store<Token>,
    webhooks: Store<Webhook>,
    /// Test-only switch: makes order-scoped session queries fail, to exercise
    /// the fail-fast behavior of the order fan-out.
    #[cfg(test)]
    session_fault: Arc<std::sync::atomic::AtomicBool>,
}

impl InMemoryRepository {
    /// Creates a new empty in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Merges a patch into an entity through its JSON form, the same
/// attribute-level merge UpdateItem performs on the stored item.
fn apply_patch<T: Serialize + DeserializeOwned>(entity: &T, patch: &FieldPatch) -> Result<T> {
    let mut value =
        serde_json::to_value(entity).map_err(|e| RepositoryError::Serialization(e.to_string()))?;

    if let Value::Object(map) = &mut value {
        for (field, new_value) in patch {
            map.insert(field.clone(), new_value.clone());
        }
    }

    serde_json::from_value(value).map_err(|e| RepositoryError::InvalidData(e.to_string()))
}

async fn update_in<T: Serialize + DeserializeOwned + Clone>(
    store: &Store<T>,
    entity_type: &'static str,
    pk: &str,
    sk: &str,
    patch: &FieldPatch,
) -> Result<()> {
    if patch.is_empty() {
        return Ok(());
    }

    let mut entities = store.write().await;
    let key = (pk.to_string(), sk.to_string());
    let Some(existing) = entities.get(&key) else {
        return Err(RepositoryError::NotFound {
            entity_type,
            id: format!("{pk}/{sk}"),
        });
    };

    let patched = apply_patch(existing, patch)?;
    entities.insert(key, patched);
    Ok(())
}

async fn delete_in<T>(store: &Store<T>, pk: &str, sk: &str) -> Result<()> {
    let mut entities = store.write().await;
    entities.remove(&(pk.to_string(), sk.to_string()));
    Ok(())
}

/// Collects entities passing `select`, in `created_at` order like a
/// created_at-ranged GSI would return them.
async fn query_in<T: Clone>(
    store: &Store<T>,
    window: WindowFilter,
    select: impl Fn(&T) -> bool,
    created_at: impl Fn(&T) -> chrono::DateTime<chrono::Utc>,
) -> Result<Vec<T>> {
    if window.matches_nothing() {
        return Ok(Vec::new());
    }

    let entities = store.read().await;
    let mut matched: Vec<T> = entities
        .values()
        .filter(|e| select(e) && window.matches(created_at(e)))
        .cloned()
        .collect();
    matched.sort_by_key(|e| created_at(e));

    Ok(matched)
}

#[async_trait]
impl TransactionRepository for InMemoryRepository {
    async fn transactions_for_user(
        &self,
        user_id: &str,
        window: WindowFilter,
    ) -> Result<Vec<Transaction>> {
        query_in(
            &self.transactions,
            window,
            |t: &Transaction| t.user_id == user_id,
            |t| t.created_at,
        )
        .await
    }

    async fn transactions_for_order(
        &self,
        order_id: &str,
        window: WindowFilter,
    ) -> Result<Vec<Transaction>> {
        query_in(
            &self.transactions,
            window,
            |t: &Transaction| t.order_id == order_id,
            |t| t.created_at,
        )
        .await
    }

    async fn failed_transactions(&self, window: WindowFilter) -> Result<Vec<Transaction>> {
        query_in(
            &self.transactions,
            window,
            |t: &Transaction| t.status == TransactionStatus::Failed,
            |t| t.created_at,
        )
        .await
    }

    async fn save_transaction(&self, transaction: &Transaction) -> Result<()> {
        let mut transactions = self.transactions.write().await;
        transactions.insert((transaction.pk(), transaction.sk()), transaction.clone());
        Ok(())
    }

    async fn update_transaction(&self, pk: &str, sk: &str, patch: &FieldPatch) -> Result<()> {
        update_in(&self.transactions, "Transaction", pk, sk, patch).await
    }

    async fn delete_transaction(&self, pk: &str, sk: &str) -> Result<()> {
        delete_in(&self.transactions, pk, sk).await
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn sessions_for_user(
        &self,
        user_id: &str,
        window: WindowFilter,
    ) -> Result<Vec<Session>> {
        query_in(
            &self.sessions,
            window,
            |s: &Session| s.user_id == user_id,
            |s| s.created_at,
        )
        .await
    }

    async fn sessions_for_order(
        &self,
        order_id: &str,
        window: WindowFilter,
    ) -> Result<Vec<Session>> {
        #[cfg(test)]
        if self.session_fault.load(std::sync::atomic::Ordering::Relaxed) {
            return Err(RepositoryError::QueryFailed(
                "session store unavailable".to_string(),
            ));
        }

        query_in(
            &self.sessions,
            window,
            |s: &Session| s.order_id == order_id,
            |s| s.created_at,
        )
        .await
    }

    async fn save_session(&self, session: &Session) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.insert((session.pk(), session.sk()), session.clone());
        Ok(())
    }

    async fn update_session(&self, pk: &str, sk: &str, patch: &FieldPatch) -> Result<()> {
        update_in(&self.sessions, "Session", pk, sk, patch).await
    }

    async fn delete_session(&self, pk: &str, sk: &str) -> Result<()> {
        delete_in(&self.sessions, pk, sk).await
    }
}

#[async_trait]
impl ScheduleRepository for InMemoryRepository {
    async fn schedules_for_user(
        &self,
        user_id: &str,
        window: WindowFilter,
    ) -> Result<Vec<Schedule>> {
        query_in(
            &self.schedules,
            window,
            |s: &Schedule| s.user_id == user_id,
            |s| s.created_at,
        )
        .await
    }

    async fn schedules_for_subscription(
        &self,
        subscription_id: &str,
        window: WindowFilter,
    ) -> Result<Vec<Schedule>> {
        query_in(
            &self.schedules,
            window,
            |s: &Schedule| s.subscription_id == subscription_id,
            |s| s.created_at,
        )
        .await
    }

    async fn schedules_for_order(
        &self,
        order_id: &str,
        window: WindowFilter,
    ) -> Result<Vec<Schedule>> {
        query_in(
            &self.schedules,
            window,
            |s: &Schedule| s.order_id == order_id,
            |s| s.created_at,
        )
        .await
    }

    async fn save_schedule(&self, schedule: &Schedule) -> Result<()> {
        let mut schedules = self.schedules.write().await;
        schedules.insert((schedule.pk(), schedule.sk()), schedule.clone());
        Ok(())
    }

    async fn update_schedule(&self, pk: &str, sk: &str, patch: &FieldPatch) -> Result<()> {
        update_in(&self.schedules, "Schedule", pk, sk, patch).await
    }

    async fn delete_schedule(&self, pk: &str, sk: &str) -> Result<()> {
        delete_in(&self.schedules, pk, sk).await
    }
}

#[async_trait]
impl TokenRepository for InMemoryRepository {
    async fn tokens_for_user(&self, user_id: &str) -> Result<Vec<Token>> {
        query_in(
            &self.tokens,
            WindowFilter::Unbounded,
            |t: &Token| t.user_id == user_id,
            |t| t.created_at,
        )
        .await
    }

    async fn tokens_expiring_in(&self, month: ExpiryMonth) -> Result<Vec<Token>> {
        query_in(
            &self.tokens,
            WindowFilter::Unbounded,
            |t: &Token| t.expiry == month,
            |t| t.created_at,
        )
        .await
    }

    async fn save_token(&self, token: &Token) -> Result<()> {
        let mut tokens = self.tokens.write().await;
        tokens.insert((token.pk(), token.sk()), token.clone());
        Ok(())
    }

    async fn update_token(&self, pk: &str, sk: &str, patch: &FieldPatch) -> Result<()> {
        update_in(&self.tokens, "Token", pk, sk, patch).await
    }

    async fn delete_token(&self, pk: &str, sk: &str) -> Result<()> {
        delete_in(&self.tokens, pk, sk).await
    }
}

#[async_trait]
impl WebhookRepository for InMemoryRepository {
    async fn webhooks_for_order(&self, order_id: &str) -> Result<Vec<Webhook>> {
        query_in(
            &self.webhooks,
            WindowFilter::Unbounded,
            |w: &Webhook| w.order_id == order_id,
            |w| w.created_at,
        )
        .await
    }

    async fn webhooks_for_subscription(&self, subscription_id: &str) -> Result<Vec<Webhook>> {
        query_in(
            &self.webhooks,
            WindowFilter::Unbounded,
            |w: &Webhook| w.subscription_id.as_deref() == Some(subscription_id),
            |w| w.created_at,
        )
        .await
    }

    async fn save_webhook(&self, webhook: &Webhook) -> Result<()> {
        let mut webhooks = self.webhooks.write().await;
        webhooks.insert((webhook.pk(), webhook.sk()), webhook.clone());
        Ok(())
    }

    async fn update_webhook(&self, pk: &str, sk: &str, patch: &FieldPatch) -> Result<()> {
        update_in(&self.webhooks, "Webhook", pk, sk, patch).await
    }

    async fn delete_webhook(&self, pk: &str, sk: &str) -> Result<()> {
        delete_in(&self.webhooks, pk, sk).await
    }
}

#[async_trait]
impl OrderRepository for InMemoryRepository {
    async fn records_for_order(&self, order_id: &str) -> Result<OrderRecords> {
        let (transactions, sessions, schedules) = tokio::try_join!(
            self.transactions_for_order(order_id, WindowFilter::Unbounded),
            self.sessions_for_order(order_id, WindowFilter::Unbounded),
            self.schedules_for_order(order_id, WindowFilter::Unbounded),
        )?;

        Ok(OrderRecords {
            transactions,
            sessions,
            schedules,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Datelike, TimeZone, Utc};
    use paygate_core::payment::{Payloads, SessionKind, SessionStatus};
    use serde_json::json;

    fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn transaction(
        user_id: &str,
        order_id: &str,
        status: TransactionStatus,
        created_at: DateTime<Utc>,
    ) -> Transaction {
        Transaction::new(user_id, order_id, "purchase", status, Payloads::default())
            .with_created_at(created_at)
    }

    fn session(user_id: &str, order_id: &str, created_at: DateTime<Utc>) -> Session {
        Session::new(
            user_id,
            order_id,
            SessionKind::Card,
            "stripe",
            Payloads::default(),
        )
        .with_created_at(created_at)
    }

    fn schedule(user_id: &str, order_id: &str, subscription_id: &str) -> Schedule {
        Schedule::new(
            user_id,
            order_id,
            subscription_id,
            "pending",
            "monthly",
            "9.99",
            "USD",
            "reg#1000",
            ts(2025, 6, 1),
            ts(2025, 7, 1),
        )
        .with_created_at(ts(2025, 5, 20))
    }

    fn token(user_id: &str, expiry: ExpiryMonth) -> Token {
        Token::new(user_id, "reg#1000", "4242", expiry, "John Doe", "VISA")
            .with_created_at(ts(2025, 1, 10))
    }

    // ==================== Windowed query tests ====================

    #[tokio::test]
    async fn test_windowed_user_transactions() {
        let repo = InMemoryRepository::new();
        for month in 1..=5 {
            repo.save_transaction(&transaction(
                "u1",
                "order#1",
                TransactionStatus::Success,
                ts(2025, month, 15),
            ))
            .await
            .unwrap();
        }

        let window = WindowFilter::parse(
            Some("2025-03-01T00:00:00Z"),
            Some("2025-04-30T23:59:59Z"),
        );
        let transactions = repo.transactions_for_user("u1", window).await.unwrap();

        assert_eq!(transactions.len(), 2);
        assert!(transactions
            .iter()
            .all(|t| (3..=4).contains(&t.created_at.month())));
    }

    #[tokio::test]
    async fn test_inverted_window_returns_empty_not_error() {
        let repo = InMemoryRepository::new();
        repo.save_transaction(&transaction(
            "u1",
            "order#1",
            TransactionStatus::Success,
            ts(2025, 3, 15),
        ))
        .await
        .unwrap();

        let window = WindowFilter::parse(
            Some("2025-12-31T00:00:00Z"),
            Some("2025-01-01T00:00:00Z"),
        );
        let transactions = repo.transactions_for_user("u1", window).await.unwrap();

        assert!(transactions.is_empty());
    }

    #[tokio::test]
    async fn test_results_are_ordered_by_created_at() {
        let repo = InMemoryRepository::new();
        for month in [4, 1, 3, 2] {
            repo.save_transaction(&transaction(
                "u1",
                "order#1",
                TransactionStatus::Success,
                ts(2025, month, 1),
            ))
            .await
            .unwrap();
        }

        let transactions = repo
            .transactions_for_user("u1", WindowFilter::Unbounded)
            .await
            .unwrap();

        let months: Vec<DateTime<Utc>> = transactions.iter().map(|t| t.created_at).collect();
        let mut sorted = months.clone();
        sorted.sort();
        assert_eq!(months, sorted);
    }

    #[tokio::test]
    async fn test_failed_transactions_only() {
        let repo = InMemoryRepository::new();
        repo.save_transaction(&transaction(
            "u1",
            "order#1",
            TransactionStatus::Success,
            ts(2025, 3, 1),
        ))
        .await
        .unwrap();
        repo.save_transaction(&transaction(
            "u2",
            "order#2",
            TransactionStatus::Failed,
            ts(2025, 3, 2),
        ))
        .await
        .unwrap();

        let failed = repo
            .failed_transactions(WindowFilter::Unbounded)
            .await
            .unwrap();

        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].user_id, "u2");
    }

    #[tokio::test]
    async fn test_schedules_for_subscription() {
        let repo = InMemoryRepository::new();
        repo.save_schedule(&schedule("u1", "order#1", "sub#42"))
            .await
            .unwrap();
        repo.save_schedule(&schedule("u2", "order#2", "sub#43"))
            .await
            .unwrap();

        let schedules = repo
            .schedules_for_subscription("sub#42", WindowFilter::Unbounded)
            .await
            .unwrap();

        assert_eq!(schedules.len(), 1);
        assert_eq!(schedules[0].user_id, "u1");
    }

    #[tokio::test]
    async fn test_tokens_expiring_in_month() {
        let repo = InMemoryRepository::new();
        let july = ExpiryMonth::new(2025, 7).unwrap();
        let august = ExpiryMonth::new(2025, 8).unwrap();

        repo.save_token(&token("u1", july)).await.unwrap();
        repo.save_token(&token("u2", august)).await.unwrap();

        let expiring = repo.tokens_expiring_in(july).await.unwrap();

        assert_eq!(expiring.len(), 1);
        assert_eq!(expiring[0].user_id, "u1");
    }

    #[tokio::test]
    async fn test_webhooks_by_order_and_subscription() {
        let repo = InMemoryRepository::new();
        let with_sub = Webhook::new("order#9", json!({"e": 1}), "noted", true, "idem-1")
            .with_subscription_id("sub#42")
            .with_created_at(ts(2025, 2, 1));
        let without_sub = Webhook::new("order#9", json!({"e": 2}), "noted", false, "idem-2")
            .with_created_at(ts(2025, 2, 2));

        repo.save_webhook(&with_sub).await.unwrap();
        repo.save_webhook(&without_sub).await.unwrap();

        let by_order = repo.webhooks_for_order("order#9").await.unwrap();
        assert_eq!(by_order.len(), 2);

        let by_subscription = repo.webhooks_for_subscription("sub#42").await.unwrap();
        assert_eq!(by_subscription.len(), 1);
        assert_eq!(by_subscription[0].idempotency_key, "idem-1");
    }

    // ==================== Fan-out tests ====================

    #[tokio::test]
    async fn test_records_for_order_is_union_of_three() {
        let repo = InMemoryRepository::new();
        repo.save_transaction(&transaction(
            "u1",
            "order#9",
            TransactionStatus::Success,
            ts(2025, 3, 1),
        ))
        .await
        .unwrap();
        repo.save_transaction(&transaction(
            "u1",
            "order#other",
            TransactionStatus::Success,
            ts(2025, 3, 1),
        ))
        .await
        .unwrap();
        repo.save_session(&session("u1", "order#9", ts(2025, 3, 1)))
            .await
            .unwrap();
        repo.save_schedule(&schedule("u1", "order#9", "sub#42"))
            .await
            .unwrap();

        let records = repo.records_for_order("order#9").await.unwrap();

        assert_eq!(records.transactions.len(), 1);
        assert_eq!(records.sessions.len(), 1);
        assert_eq!(records.schedules.len(), 1);

        // The composite is exactly what the three order-scoped queries return
        // on their own.
        assert_eq!(
            records.transactions,
            repo.transactions_for_order("order#9", WindowFilter::Unbounded)
                .await
                .unwrap()
        );
        assert_eq!(
            records.sessions,
            repo.sessions_for_order("order#9", WindowFilter::Unbounded)
                .await
                .unwrap()
        );
        assert_eq!(
            records.schedules,
            repo.schedules_for_order("order#9", WindowFilter::Unbounded)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_records_for_unknown_order_is_empty() {
        let repo = InMemoryRepository::new();
        let records = repo.records_for_order("order#nothing").await.unwrap();
        assert_eq!(records, OrderRecords::default());
    }

    #[tokio::test]
    async fn test_records_for_order_fails_fast_when_a_sub_query_fails() {
        let repo = InMemoryRepository::new();
        repo.save_transaction(&transaction(
            "u1",
            "order#9",
            TransactionStatus::Success,
            ts(2025, 3, 1),
        ))
        .await
        .unwrap();
        repo.save_schedule(&schedule("u1", "order#9", "sub#42"))
            .await
            .unwrap();

        // Two sub-queries would succeed; the session one fails. The fan-out
        // must surface the error, never a partial OrderRecords.
        repo.session_fault
            .store(true, std::sync::atomic::Ordering::Relaxed);

        let result = repo.records_for_order("order#9").await;

        assert!(matches!(result, Err(RepositoryError::QueryFailed(_))));
    }

    // ==================== Mutation tests ====================

    #[tokio::test]
    async fn test_save_overwrites_existing_key() {
        let repo = InMemoryRepository::new();
        let mut s = session("u1", "order#1", ts(2025, 3, 1));
        repo.save_session(&s).await.unwrap();

        s.status = SessionStatus::Completed;
        repo.save_session(&s).await.unwrap();

        let sessions = repo
            .sessions_for_user("u1", WindowFilter::Unbounded)
            .await
            .unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn test_update_merges_patch() {
        let repo = InMemoryRepository::new();
        let s = session("u1", "order#1", ts(2025, 3, 1));
        repo.save_session(&s).await.unwrap();

        let patch = FieldPatch::from([
            ("status".to_string(), json!("completed")),
            ("transaction_id".to_string(), json!("txn-abc")),
        ]);
        repo.update_session(&s.pk(), &s.sk(), &patch).await.unwrap();

        let sessions = repo
            .sessions_for_user("u1", WindowFilter::Unbounded)
            .await
            .unwrap();
        assert_eq!(sessions[0].status, SessionStatus::Completed);
        assert_eq!(sessions[0].transaction_id.as_deref(), Some("txn-abc"));
        // Untouched fields survive the merge.
        assert_eq!(sessions[0].gateway, "stripe");
    }

    #[tokio::test]
    async fn test_update_missing_key_is_not_found() {
        let repo = InMemoryRepository::new();
        let patch = FieldPatch::from([("status".to_string(), json!("completed"))]);

        let result = repo
            .update_session("user#u1", "session#missing", &patch)
            .await;

        assert!(matches!(result, Err(RepositoryError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_update_with_empty_patch_is_a_noop() {
        let repo = InMemoryRepository::new();
        // No item either; an empty patch must not even report NotFound.
        repo.update_session("user#u1", "session#missing", &FieldPatch::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_absent_key_succeeds() {
        let repo = InMemoryRepository::new();
        repo.delete_transaction("user#u1", "txn#missing")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_removes_item() {
        let repo = InMemoryRepository::new();
        let t = transaction("u1", "order#1", TransactionStatus::Success, ts(2025, 3, 1));
        repo.save_transaction(&t).await.unwrap();

        repo.delete_transaction(&t.pk(), &t.sk()).await.unwrap();

        let transactions = repo
            .transactions_for_user("u1", WindowFilter::Unbounded)
            .await
            .unwrap();
        assert!(transactions.is_empty());
    }
}
