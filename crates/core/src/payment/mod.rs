pub mod keys;
mod types;

pub use types::{
    ExpiryMonth, InvalidExpiryMonth, OrderRecords, Payloads, Schedule, Session, SessionKind,
    SessionStatus, Token, Transaction, TransactionStatus, Webhook,
};
