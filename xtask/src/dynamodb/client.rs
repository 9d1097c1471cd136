//! Table-state inspection against a live DynamoDB endpoint.
//!
//! Client construction lives in `paygate::storage::dynamodb::AwsConfig`; this
//! module only reads table/GSI status for the planners.

use super::error::{DynamodbError, Result};
use super::planning::{GsiState, GsiStatus, TableState, TableStatus};
use aws_sdk_dynamodb::Client;

/// Fetches current table state, returns None if table doesn't exist.
pub async fn get_table_state(client: &Client, table_name: &str) -> Result<Option<TableState>> {
    match client.describe_table().table_name(table_name).send().await {
        Ok(response) => {
            let Some(table) = response.table() else {
                return Ok(None);
            };

            // Parse GSIs
            let gsis = table
                .global_secondary_indexes()
                .iter()
                .map(|gsi| GsiState {
                    name: gsi.index_name().unwrap_or_default().to_string(),
                    status: match gsi.index_status() {
                        Some(aws_sdk_dynamodb::types::IndexStatus::Active) => GsiStatus::Active,
                        Some(aws_sdk_dynamodb::types::IndexStatus::Creating) => GsiStatus::Creating,
                        Some(aws_sdk_dynamodb::types::IndexStatus::Updating) => GsiStatus::Updating,
                        Some(aws_sdk_dynamodb::types::IndexStatus::Deleting) => GsiStatus::Deleting,
                        _ => GsiStatus::Active,
                    },
                })
                .collect();

            // Parse table status
            let status = match table.table_status() {
                Some(aws_sdk_dynamodb::types::TableStatus::Active) => TableStatus::Active,
                Some(aws_sdk_dynamodb::types::TableStatus::Creating) => TableStatus::Creating,
                Some(aws_sdk_dynamodb::types::TableStatus::Updating) => TableStatus::Updating,
                Some(aws_sdk_dynamodb::types::TableStatus::Deleting) => TableStatus::Deleting,
                _ => TableStatus::Active,
            };

            Ok(Some(TableState { status, gsis }))
        }
        Err(err) => {
            let err_str = err.to_string();
            // Check if it's a ResourceNotFoundException
            if err_str.contains("ResourceNotFoundException") || err_str.contains("not found") {
                Ok(None)
            } else {
                Err(DynamodbError::AwsSdk(err_str))
            }
        }
    }
}
