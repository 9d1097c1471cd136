//! Demo data generation (Functional Core) and insertion (Imperative Shell).

use chrono::{Datelike, Duration, Utc};
use serde_json::json;

use paygate::storage::dynamodb::DynamoDbRepository;
use paygate_core::payment::{
    keys, ExpiryMonth, Payloads, Schedule, Session, SessionKind, SessionStatus, Token,
    Transaction, TransactionStatus, Webhook,
};
use paygate_core::storage::{
    ScheduleRepository, SessionRepository, TokenRepository, TransactionRepository,
    WebhookRepository,
};

use super::error::Result;

/// One order's worth of demo records.
#[derive(Debug, Clone)]
pub struct SeedBatch {
    pub transactions: Vec<Transaction>,
    pub sessions: Vec<Session>,
    pub schedules: Vec<Schedule>,
    pub tokens: Vec<Token>,
    pub webhooks: Vec<Webhook>,
}

impl SeedBatch {
    pub fn len(&self) -> usize {
        self.transactions.len()
            + self.sessions.len()
            + self.schedules.len()
            + self.tokens.len()
            + self.webhooks.len()
    }
}

/// Generates a demo order history: one transaction and session pair per
/// month walking backwards from today, plus a schedule, a stored token and
/// a pair of webhooks. Every failed transaction alternates with a success
/// so both sides of the status GSI get data.
pub fn generate_seed_batch(user_id: &str, order_id: &str, months: u32) -> SeedBatch {
    let order_label = keys::order_label(order_id);
    let subscription_label = keys::subscription_label(order_id);
    let now = Utc::now();

    let mut transactions = Vec::new();
    let mut sessions = Vec::new();
    for i in 0..months {
        let created_at = now - Duration::days(30 * i64::from(i));
        let status = if i % 2 == 0 {
            TransactionStatus::Success
        } else {
            TransactionStatus::Failed
        };

        let payloads = Payloads {
            request_data: json!({"amount": "9.99", "currency": "USD"}),
            response_data: json!({"result": status.as_str()}),
        };

        transactions.push(
            Transaction::new(user_id, &order_label, "subscription", status, payloads.clone())
                .with_card("4242", "VISA", "Demo Holder")
                .with_created_at(created_at),
        );
        sessions.push(
            Session::new(user_id, &order_label, SessionKind::Card, "demo", payloads)
                .with_status(SessionStatus::Completed)
                .with_created_at(created_at),
        );
    }

    let schedule = Schedule::new(
        user_id,
        &order_label,
        &subscription_label,
        "active",
        "monthly",
        "9.99",
        "USD",
        "reg#demo",
        now,
        now + Duration::days(30),
    )
    .with_notes("seeded demo schedule")
    .with_created_at(now);

    let expiry = ExpiryMonth::new(now.year() + 3, 12).expect("expiry year in range");
    let token = Token::new(user_id, "reg#demo", "4242", expiry, "Demo Holder", "VISA")
        .with_created_at(now);

    let webhooks = vec![
        Webhook::new(
            &order_label,
            json!({"event": "charge.success"}),
            "payment_recorded",
            true,
            format!("seed-{order_id}-1"),
        )
        .with_subscription_id(&subscription_label)
        .with_created_at(now),
        Webhook::new(
            &order_label,
            json!({"event": "charge.failed"}),
            "retry_scheduled",
            false,
            format!("seed-{order_id}-2"),
        )
        .with_created_at(now - Duration::days(1)),
    ];

    SeedBatch {
        transactions,
        sessions,
        schedules: vec![schedule],
        tokens: vec![token],
        webhooks,
    }
}

/// Inserts a batch through the repository, fail-fast. Returns the number of
/// records written.
pub async fn seed_batch(repo: &DynamoDbRepository, batch: &SeedBatch) -> Result<usize> {
    for transaction in &batch.transactions {
        repo.save_transaction(transaction).await?;
    }
    for session in &batch.sessions {
        repo.save_session(session).await?;
    }
    for schedule in &batch.schedules {
        repo.save_schedule(schedule).await?;
    }
    for token in &batch.tokens {
        repo.save_token(token).await?;
    }
    for webhook in &batch.webhooks {
        repo.save_webhook(webhook).await?;
    }

    Ok(batch.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_shares_one_order_label() {
        let batch = generate_seed_batch("demo-user", "1009", 4);

        assert_eq!(batch.transactions.len(), 4);
        assert_eq!(batch.sessions.len(), 4);
        assert_eq!(batch.len(), 4 + 4 + 1 + 1 + 2);

        assert!(batch.transactions.iter().all(|t| t.order_id == "order#1009"));
        assert!(batch.sessions.iter().all(|s| s.order_id == "order#1009"));
        assert_eq!(batch.schedules[0].subscription_id, "sub#1009");
        assert!(batch.webhooks.iter().all(|w| w.pk() == "order#1009"));
    }

    #[test]
    fn test_batch_covers_both_transaction_statuses() {
        let batch = generate_seed_batch("demo-user", "1009", 4);

        let failed = batch
            .transactions
            .iter()
            .filter(|t| t.status == TransactionStatus::Failed)
            .count();
        assert_eq!(failed, 2);
    }
}
