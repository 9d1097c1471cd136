//! DynamoDB repository implementation.
//!
//! Implements the repository traits from `paygate_core::storage` using
//! DynamoDB. Every read goes through the planner: the schema registry decides
//! whether a lookup hits the table key or a named GSI, and whether a time
//! window joins the key condition or runs as a post-filter.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;

use paygate_core::payment::{
    keys, ExpiryMonth, OrderRecords, Schedule, Session, Token, Transaction, TransactionStatus,
    Webhook,
};
use paygate_core::schema::{
    SchemaRegistry, EXPIRY_ATTR, ORDER_ID_ATTR, PK_ATTR, SCHEDULES_TABLE, SESSIONS_TABLE, SK_ATTR,
    STATUS_LABEL_ATTR, SUBSCRIPTION_ID_ATTR, TOKENS_TABLE, TRANSACTIONS_TABLE, WEBHOOKS_TABLE,
};
use paygate_core::storage::{
    FieldPatch, OrderRepository, Result, ScheduleRepository, SessionRepository, TokenRepository,
    TransactionRepository, WebhookRepository, WindowFilter,
};

use super::conversions::{
    item_to_schedule, item_to_session, item_to_token, item_to_transaction, item_to_webhook,
    schedule_to_item, session_to_item, token_to_item, transaction_to_item, webhook_to_item,
};
use super::error::{
    map_delete_item_error, map_put_item_error, map_query_error, map_update_item_error,
};
use super::plan::{plan_query, plan_update};

type Item = HashMap<String, AttributeValue>;

/// AWS client configuration, resolved from the environment.
///
/// `AWS_ENDPOINT_URL` points the client at a local DynamoDB; `AWS_REGION`
/// falls back to `us-east-1`. Credentials come from the SDK default chain.
#[derive(Debug, Clone)]
pub struct AwsConfig {
    /// Custom endpoint URL (for local DynamoDB).
    pub endpoint_url: Option<String>,
    /// AWS region.
    pub region: String,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            endpoint_url: std::env::var("AWS_ENDPOINT_URL").ok(),
            region: std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
        }
    }
}

impl AwsConfig {
    /// Returns a display string for the target environment.
    pub fn target_display(&self) -> String {
        match &self.endpoint_url {
            Some(url) => format!("Local DynamoDB ({})", url),
            None => format!("AWS DynamoDB (region: {})", self.region),
        }
    }

    /// Builds a DynamoDB client for this configuration.
    pub async fn client(&self) -> Client {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(self.region.clone()));
        if let Some(endpoint) = &self.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let config = loader.load().await;
        Client::new(&config)
    }
}

/// DynamoDB-based repository implementation.
///
/// Holds the client and the schema registry; the registry is injected at
/// construction, never read from global state.
pub struct DynamoDbRepository {
    client: Client,
    registry: SchemaRegistry,
}

impl DynamoDbRepository {
    /// Creates a new repository with the given DynamoDB client and schema
    /// registry.
    pub fn new(client: Client, registry: SchemaRegistry) -> Self {
        Self { client, registry }
    }

    /// Creates a new repository from environment configuration.
    ///
    /// Uses the AWS SDK default credential chain; see [`AwsConfig`] for the
    /// endpoint and region overrides.
    pub async fn from_env(registry: SchemaRegistry) -> Result<Self> {
        let client = AwsConfig::default().client().await;
        Ok(Self::new(client, registry))
    }

    /// Runs one planned query and converts the result items.
    ///
    /// A filter that can never match returns an empty vec without touching
    /// the store.
    async fn query_entities<T>(
        &self,
        table_name: &str,
        key_attr: &str,
        key_value: &str,
        window: WindowFilter,
        convert: fn(&Item) -> Result<T>,
    ) -> Result<Vec<T>> {
        if window.matches_nothing() {
            return Ok(Vec::new());
        }

        let table = self.registry.table(table_name)?;
        let plan = plan_query(table, key_attr, key_value, window.range())?;

        tracing::debug!(
            table = %plan.table_name,
            index = ?plan.index_name,
            key_condition = %plan.key_condition,
            filtered = plan.filter_expression.is_some(),
            "running query"
        );

        let mut request = self
            .client
            .query()
            .table_name(&plan.table_name)
            .key_condition_expression(&plan.key_condition)
            .set_expression_attribute_names(Some(plan.names))
            .set_expression_attribute_values(Some(plan.values));
        if let Some(index_name) = &plan.index_name {
            request = request.index_name(index_name);
        }
        if let Some(filter) = &plan.filter_expression {
            request = request.filter_expression(filter);
        }

        let result = request.send().await.map_err(map_query_error)?;

        let items = result.items.unwrap_or_default();
        items.iter().map(convert).collect()
    }

    /// Unconditional put: saving an existing key overwrites it.
    async fn put_item(&self, table_name: &str, item: Item) -> Result<()> {
        self.client
            .put_item()
            .table_name(table_name)
            .set_item(Some(item))
            .send()
            .await
            .map_err(map_put_item_error)?;

        Ok(())
    }

    /// Merges a partial patch into the item at the exact primary key.
    ///
    /// Guarded by `attribute_exists(pk)` so patching an absent key reports
    /// NotFound instead of creating a partial item. An empty patch is a
    /// no-op.
    async fn update_item(
        &self,
        table_name: &str,
        entity_type: &'static str,
        pk: &str,
        sk: &str,
        patch: &FieldPatch,
    ) -> Result<()> {
        let Some(plan) = plan_update(patch) else {
            return Ok(());
        };

        self.client
            .update_item()
            .table_name(table_name)
            .key(PK_ATTR, AttributeValue::S(pk.to_string()))
            .key(SK_ATTR, AttributeValue::S(sk.to_string()))
            .update_expression(&plan.expression)
            .set_expression_attribute_names(Some(plan.names))
            .set_expression_attribute_values(Some(plan.values))
            .condition_expression("attribute_exists(pk)")
            .send()
            .await
            .map_err(|e| map_update_item_error(e, entity_type, format!("{pk}/{sk}")))?;

        Ok(())
    }

    /// Unconditional delete: deleting an absent key succeeds.
    async fn delete_item(&self, table_name: &str, pk: &str, sk: &str) -> Result<()> {
        self.client
            .delete_item()
            .table_name(table_name)
            .key(PK_ATTR, AttributeValue::S(pk.to_string()))
            .key(SK_ATTR, AttributeValue::S(sk.to_string()))
            .send()
            .await
            .map_err(map_delete_item_error)?;

        Ok(())
    }
}

// ============================================================================
// TransactionRepository implementation
// ============================================================================

#[async_trait]
impl TransactionRepository for DynamoDbRepository {
    async fn transactions_for_user(
        &self,
        user_id: &str,
        window: WindowFilter,
    ) -> Result<Vec<Transaction>> {
        self.query_entities(
            TRANSACTIONS_TABLE,
            PK_ATTR,
            &keys::user_pk(user_id),
            window,
            item_to_transaction,
        )
        .await
    }

    async fn transactions_for_order(
        &self,
        order_id: &str,
        window: WindowFilter,
    ) -> Result<Vec<Transaction>> {
        self.query_entities(
            TRANSACTIONS_TABLE,
            ORDER_ID_ATTR,
            order_id,
            window,
            item_to_transaction,
        )
        .await
    }

    async fn failed_transactions(&self, window: WindowFilter) -> Result<Vec<Transaction>> {
        self.query_entities(
            TRANSACTIONS_TABLE,
            STATUS_LABEL_ATTR,
            &keys::status_label(TransactionStatus::Failed.as_str()),
            window,
            item_to_transaction,
        )
        .await
    }

    async fn save_transaction(&self, transaction: &Transaction) -> Result<()> {
        let item = transaction_to_item(transaction)?;
        self.put_item(TRANSACTIONS_TABLE, item).await
    }

    async fn update_transaction(&self, pk: &str, sk: &str, patch: &FieldPatch) -> Result<()> {
        self.update_item(TRANSACTIONS_TABLE, "Transaction", pk, sk, patch)
            .await
    }

    async fn delete_transaction(&self, pk: &str, sk: &str) -> Result<()> {
        self.delete_item(TRANSACTIONS_TABLE, pk, sk).await
    }
}

// ============================================================================
// SessionRepository implementation
// ============================================================================

#[async_trait]
impl SessionRepository for DynamoDbRepository {
    async fn sessions_for_user(
        &self,
        user_id: &str,
        window: WindowFilter,
    ) -> Result<Vec<Session>> {
        self.query_entities(
            SESSIONS_TABLE,
            PK_ATTR,
            &keys::user_pk(user_id),
            window,
            item_to_session,
        )
        .await
    }

    async fn sessions_for_order(
        &self,
        order_id: &str,
        window: WindowFilter,
    ) -> Result<Vec<Session>> {
        self.query_entities(
            SESSIONS_TABLE,
            ORDER_ID_ATTR,
            order_id,
            window,
            item_to_session,
        )
        .await
    }

    async fn save_session(&self, session: &Session) -> Result<()> {
        let item = session_to_item(session)?;
        self.put_item(SESSIONS_TABLE, item).await
    }

    async fn update_session(&self, pk: &str, sk: &str, patch: &FieldPatch) -> Result<()> {
        self.update_item(SESSIONS_TABLE, "Session", pk, sk, patch)
            .await
    }

    async fn delete_session(&self, pk: &str, sk: &str) -> Result<()> {
        self.delete_item(SESSIONS_TABLE, pk, sk).await
    }
}

// ============================================================================
// ScheduleRepository implementation
// ============================================================================

#[async_trait]
impl ScheduleRepository for DynamoDbRepository {
    async fn schedules_for_user(
        &self,
        user_id: &str,
        window: WindowFilter,
    ) -> Result<Vec<Schedule>> {
        self.query_entities(
            SCHEDULES_TABLE,
            PK_ATTR,
            &keys::user_pk(user_id),
            window,
            item_to_schedule,
        )
        .await
    }

    async fn schedules_for_subscription(
        &self,
        subscription_id: &str,
        window: WindowFilter,
    ) -> Result<Vec<Schedule>> {
        self.query_entities(
            SCHEDULES_TABLE,
            SUBSCRIPTION_ID_ATTR,
            subscription_id,
            window,
            item_to_schedule,
        )
        .await
    }

    async fn schedules_for_order(
        &self,
        order_id: &str,
        window: WindowFilter,
    ) -> Result<Vec<Schedule>> {
        self.query_entities(
            SCHEDULES_TABLE,
            ORDER_ID_ATTR,
            order_id,
            window,
            item_to_schedule,
        )
        .await
    }

    async fn save_schedule(&self, schedule: &Schedule) -> Result<()> {
        let item = schedule_to_item(schedule)?;
        self.put_item(SCHEDULES_TABLE, item).await
    }

    async fn update_schedule(&self, pk: &str, sk: &str, patch: &FieldPatch) -> Result<()> {
        self.update_item(SCHEDULES_TABLE, "Schedule", pk, sk, patch)
            .await
    }

    async fn delete_schedule(&self, pk: &str, sk: &str) -> Result<()> {
        self.delete_item(SCHEDULES_TABLE, pk, sk).await
    }
}

// ============================================================================
// TokenRepository implementation
// ============================================================================

#[async_trait]
impl TokenRepository for DynamoDbRepository {
    async fn tokens_for_user(&self, user_id: &str) -> Result<Vec<Token>> {
        self.query_entities(
            TOKENS_TABLE,
            PK_ATTR,
            &keys::user_pk(user_id),
            WindowFilter::Unbounded,
            item_to_token,
        )
        .await
    }

    async fn tokens_expiring_in(&self, month: ExpiryMonth) -> Result<Vec<Token>> {
        self.query_entities(
            TOKENS_TABLE,
            EXPIRY_ATTR,
            &month.to_string(),
            WindowFilter::Unbounded,
            item_to_token,
        )
        .await
    }

    async fn save_token(&self, token: &Token) -> Result<()> {
        self.put_item(TOKENS_TABLE, token_to_item(token)).await
    }

    async fn update_token(&self, pk: &str, sk: &str, patch: &FieldPatch) -> Result<()> {
        self.update_item(TOKENS_TABLE, "Token", pk, sk, patch).await
    }

    async fn delete_token(&self, pk: &str, sk: &str) -> Result<()> {
        self.delete_item(TOKENS_TABLE, pk, sk).await
    }
}

// ============================================================================
// WebhookRepository implementation
// ============================================================================

#[async_trait]
impl WebhookRepository for DynamoDbRepository {
    async fn webhooks_for_order(&self, order_id: &str) -> Result<Vec<Webhook>> {
        // The composite order label is the table partition key here.
        self.query_entities(
            WEBHOOKS_TABLE,
            PK_ATTR,
            order_id,
            WindowFilter::Unbounded,
            item_to_webhook,
        )
        .await
    }

    async fn webhooks_for_subscription(&self, subscription_id: &str) -> Result<Vec<Webhook>> {
        self.query_entities(
            WEBHOOKS_TABLE,
            SUBSCRIPTION_ID_ATTR,
            subscription_id,
            WindowFilter::Unbounded,
            item_to_webhook,
        )
        .await
    }

    async fn save_webhook(&self, webhook: &Webhook) -> Result<()> {
        let item = webhook_to_item(webhook)?;
        self.put_item(WEBHOOKS_TABLE, item).await
    }

    async fn update_webhook(&self, pk: &str, sk: &str, patch: &FieldPatch) -> Result<()> {
        self.update_item(WEBHOOKS_TABLE, "Webhook", pk, sk, patch)
            .await
    }

    async fn delete_webhook(&self, pk: &str, sk: &str) -> Result<()> {
        self.delete_item(WEBHOOKS_TABLE, pk, sk).await
    }
}

// ============================================================================
// OrderRepository implementation
// ============================================================================

#[async_trait]
impl OrderRepository for DynamoDbRepository {
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
    use super::AwsConfig;

    #[test]
    fn test_target_display_distinguishes_local_endpoint() {
        let local = AwsConfig {
            endpoint_url: Some("http://localhost:8000".to_string()),
            region: "us-east-1".to_string(),
        };
        assert_eq!(local.target_display(), "Local DynamoDB (http://localhost:8000)");

        let remote = AwsConfig {
            endpoint_url: None,
            region: "eu-west-1".to_string(),
        };
        assert_eq!(remote.target_display(), "AWS DynamoDB (region: eu-west-1)");
    }
}
