//! DynamoDB infrastructure management commands.

mod client;
mod deploy;
mod error;
mod planning;
mod seed;

pub use error::{DynamodbError, Result};

use crate::prelude::*;
use dialoguer::Confirm;
use paygate::storage::dynamodb::{AwsConfig, DynamoDbRepository};
use paygate_core::schema::{default_registry, SchemaRegistry, TableSchema};

/// DynamoDB infrastructure management commands.
#[derive(Debug, clap::Parser)]
pub struct DynamodbCommand {
    #[command(subcommand)]
    pub action: DynamodbAction,
}

/// Available DynamoDB actions.
#[derive(Debug, clap::Subcommand)]
pub enum DynamodbAction {
    /// Deploy or destroy DynamoDB table infrastructure.
    Deploy(DeployCommand),

    /// Seed the tables with demo payment records.
    Seed(SeedCommand),
}

/// Deploy or update DynamoDB infrastructure.
#[derive(Debug, clap::Parser)]
#[command(long_about = "Deploy or destroy DynamoDB table infrastructure.

By default, this command creates or updates every paygate table declared in
the schema registry, each with its named Global Secondary Indexes (GSIs).

The command shows a plan of changes before applying and asks for confirmation.

Environment variables:
  AWS_ENDPOINT_URL    - Use local DynamoDB (e.g., http://localhost:8000)
  AWS_REGION          - AWS region (defaults to us-east-1)
  AWS_PROFILE         - AWS profile to use for credentials")]
pub struct DeployCommand {
    /// Skip confirmation prompts.
    #[arg(long)]
    pub force: bool,

    /// Destroy the tables instead of creating/updating.
    #[arg(long)]
    pub destroy: bool,

    /// JSON file declaring the table schemas (defaults to the built-in registry).
    #[arg(long, value_name = "FILE")]
    pub tables_file: Option<std::path::PathBuf>,
}

/// Seed the tables with demo payment records.
#[derive(Debug, clap::Parser)]
#[command(long_about = "Generate and insert demo payment records into DynamoDB.

Creates one order's worth of history: a monthly trail of transactions and
checkout sessions, a recurring schedule, a stored card token, and a pair of
webhooks, all correlated by the same composite order label.")]
pub struct SeedCommand {
    /// User to attribute the records to.
    #[arg(long, default_value = "demo-user")]
    pub user_id: String,

    /// Raw order id; the composite order label is derived from it.
    #[arg(long, default_value = "1009")]
    pub order_id: String,

    /// Number of transaction/session months to generate.
    #[arg(long, default_value = "5")]
    pub months: u32,

    /// JSON file declaring the table schemas (defaults to the built-in registry).
    #[arg(long, value_name = "FILE")]
    pub tables_file: Option<std::path::PathBuf>,

    /// Skip confirmation prompts.
    #[arg(long)]
    pub force: bool,
}

/// Main entry point for dynamodb command.
pub async fn run(command: DynamodbCommand, global: crate::Global) -> Result<()> {
    match command.action {
        DynamodbAction::Deploy(deploy_cmd) => run_deploy(deploy_cmd, &global).await,
        DynamodbAction::Seed(seed_cmd) => run_seed(seed_cmd, &global).await,
    }
}

fn load_registry(tables_file: Option<&std::path::Path>) -> Result<SchemaRegistry> {
    match tables_file {
        Some(path) => Ok(SchemaRegistry::from_file(path)?),
        None => Ok(default_registry()),
    }
}

/// Registry tables in a stable display order.
fn sorted_tables(registry: &SchemaRegistry) -> Vec<&TableSchema> {
    let mut tables: Vec<&TableSchema> = registry.tables().collect();
    tables.sort_by(|a, b| a.table_name.cmp(&b.table_name));
    tables
}

async fn run_deploy(cmd: DeployCommand, global: &crate::Global) -> Result<()> {
    let aws_config = AwsConfig::default();
    let registry = load_registry(cmd.tables_file.as_deref())?;

    if !global.is_silent() {
        aprintln!("{} {}", p_b("Target:"), aws_config.target_display());
        aprintln!();
    }

    let dynamo_client = aws_config.client().await;

    if cmd.destroy {
        // Destroy flow
        let mut plans = Vec::new();
        for table in sorted_tables(&registry) {
            let current_state =
                client::get_table_state(&dynamo_client, &table.table_name).await?;
            plans.push(planning::calculate_destroy_plan(
                current_state.as_ref(),
                &table.table_name,
            ));
        }

        if !global.is_silent() {
            aprintln!("{}", p_y("Destroy Plan:"));
            for plan in &plans {
                for line in planning::format_destroy_plan(plan) {
                    aprintln!("  {}", p_r(&line));
                }
            }
            aprintln!();
        }

        if plans.iter().all(planning::DestroyPlan::is_no_change) {
            if !global.is_silent() {
                aprintln!("{}", p_g("Nothing to destroy."));
            }
            return Ok(());
        }

        if !cmd.force {
            let confirmed = Confirm::new()
                .with_prompt("Are you sure you want to delete these tables? ALL DATA WILL BE LOST")
                .default(false)
                .interact()
                .map_err(|e| DynamodbError::AwsSdk(e.to_string()))?;

            if !confirmed {
                return Err(DynamodbError::UserCancelled);
            }
        }

        if !global.is_silent() {
            aprintln!("{}", p_b("Deleting tables..."));
        }

        for plan in &plans {
            deploy::execute_destroy_plan(&dynamo_client, plan).await?;
        }

        if !global.is_silent() {
            aprintln!("{}", p_g("Tables destroyed successfully."));
        }
    } else {
        // Deploy flow
        let mut plans = Vec::new();
        for table in sorted_tables(&registry) {
            let current_state =
                client::get_table_state(&dynamo_client, &table.table_name).await?;
            plans.push(planning::calculate_deploy_plan(
                current_state.as_ref(),
                table,
            ));
        }

        if !global.is_silent() {
            aprintln!("{}", p_c("Deploy Plan:"));
            for plan in &plans {
                for line in planning::format_deploy_plan(plan) {
                    if line.starts_with('+') {
                        aprintln!("  {}", p_g(&line));
                    } else if line.starts_with('-') {
                        aprintln!("  {}", p_r(&line));
                    } else if line.starts_with('~') {
                        aprintln!("  {}", p_y(&line));
                    } else {
                        aprintln!("  {}", line);
                    }
                }
            }
            aprintln!();
        }

        if plans.iter().all(planning::DeployPlan::is_no_change) {
            if !global.is_silent() {
                aprintln!("{}", p_g("Infrastructure is up to date."));
            }
            return Ok(());
        }

        if !cmd.force {
            let confirmed = Confirm::new()
                .with_prompt("Apply these changes?")
                .default(true)
                .interact()
                .map_err(|e| DynamodbError::AwsSdk(e.to_string()))?;

            if !confirmed {
                return Err(DynamodbError::UserCancelled);
            }
        }

        if !global.is_silent() {
            aprintln!("{}", p_b("Applying changes..."));
        }

        for plan in &plans {
            deploy::execute_deploy_plan(&dynamo_client, plan).await?;
        }

        if !global.is_silent() {
            aprintln!("{}", p_g("Infrastructure deployed successfully."));
        }
    }

    Ok(())
}

async fn run_seed(cmd: SeedCommand, global: &crate::Global) -> Result<()> {
    let aws_config = AwsConfig::default();
    let registry = load_registry(cmd.tables_file.as_deref())?;

    if !global.is_silent() {
        aprintln!("{} {}", p_b("Target:"), aws_config.target_display());
        aprintln!("{} {}", p_b("User:"), cmd.user_id);
        aprintln!("{} order#{}", p_b("Order:"), cmd.order_id);
        aprintln!("{} {}", p_b("Months:"), cmd.months);
        aprintln!();
    }

    let dynamo_client = aws_config.client().await;

    // Verify every table exists before writing anything
    for table in sorted_tables(&registry) {
        let table_state = client::get_table_state(&dynamo_client, &table.table_name).await?;
        if table_state.is_none() {
            return Err(DynamodbError::TableNotFound {
                table_name: table.table_name.clone(),
            });
        }
    }

    let batch = seed::generate_seed_batch(&cmd.user_id, &cmd.order_id, cmd.months);

    if !global.is_silent() {
        aprintln!("{}", p_c("Records to create:"));
        aprintln!("  {} transactions", batch.transactions.len());
        aprintln!("  {} sessions", batch.sessions.len());
        aprintln!("  {} schedules", batch.schedules.len());
        aprintln!("  {} tokens", batch.tokens.len());
        aprintln!("  {} webhooks", batch.webhooks.len());
        aprintln!();
    }

    if !cmd.force {
        let confirmed = Confirm::new()
            .with_prompt(format!("Insert {} records?", batch.len()))
            .default(true)
            .interact()
            .map_err(|e| DynamodbError::AwsSdk(e.to_string()))?;

        if !confirmed {
            return Err(DynamodbError::UserCancelled);
        }
    }

    let repo = DynamoDbRepository::new(dynamo_client, registry);
    let inserted = seed::seed_batch(&repo, &batch).await?;

    if !global.is_silent() {
        aprintln!("{} {} records inserted.", p_g("Success:"), inserted);
    }

    Ok(())
}
