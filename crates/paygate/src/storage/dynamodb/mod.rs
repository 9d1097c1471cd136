//! DynamoDB storage backend implementation.
//!
//! This module provides a DynamoDB-based implementation of the repository
//! traits using `aws-sdk-dynamodb`. Access paths (table key vs. named GSI)
//! and window placement (key condition vs. post-filter) are decided by the
//! pure planner in [`plan`], driven entirely by the schema registry.

mod conversions;
mod error;
mod plan;
mod repository;

pub use plan::{plan_query, plan_update, QueryPlan, UpdatePlan};
pub use repository::{AwsConfig, DynamoDbRepository};
