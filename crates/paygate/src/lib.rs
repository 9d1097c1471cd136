//! Storage backends for paygate.
//!
//! Implements the repository traits from `paygate_core::storage` against
//! DynamoDB, plus an in-memory backend for tests. Query construction is a
//! pure planning step (`storage::dynamodb::plan`) so the access-path and
//! window-placement decisions are testable without a store.

pub mod storage;
