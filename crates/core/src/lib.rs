//! Core types for the paygate project.
//!
//! Domain entities for payment-gateway records, the table schema registry,
//! and the storage traits implemented by the backends in the `paygate`
//! crate. This crate is pure: no AWS SDK, no I/O beyond reading a schema
//! file on request.

pub mod payment;
pub mod schema;
pub mod storage;
