//! In-memory storage backend for testing.
//!
//! This module provides an in-memory implementation of the repository traits
//! that stores all data in HashMaps wrapped in `Arc<RwLock<_>>`, keyed by the
//! same (pk, sk) pairs the DynamoDB backend uses. Useful for testing and
//! development scenarios where persistence is not required.

mod repository;

pub use repository::InMemoryRepository;
