//! Pure functions for calculating deployment plans (Functional Core).

use paygate_core::schema::{GsiSchema, TableSchema};

/// Represents the current state of a table.
#[derive(Debug, Clone)]
pub struct TableState {
    pub status: TableStatus,
    pub gsis: Vec<GsiState>,
}

/// Table status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStatus {
    Active,
    Creating,
    Updating,
    Deleting,
}

/// GSI state.
#[derive(Debug, Clone)]
pub struct GsiState {
    pub name: String,
    pub status: GsiStatus,
}

/// GSI status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GsiStatus {
    Active,
    Creating,
    Updating,
    Deleting,
}

/// Planned changes for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployPlan {
    /// Table doesn't exist, needs to be created.
    CreateTable { schema: TableSchema },
    /// Table exists, GSIs need to be added.
    AddGsis {
        table_name: String,
        gsis_to_add: Vec<GsiSchema>,
    },
    /// Table is up to date, no changes needed.
    NoChanges { table_name: String },
}

impl DeployPlan {
    pub fn is_no_change(&self) -> bool {
        matches!(self, DeployPlan::NoChanges { .. })
    }
}

/// Plan for destroying a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestroyPlan {
    /// Table exists and will be deleted.
    DeleteTable { table_name: String },
    /// Table doesn't exist, nothing to do.
    AlreadyGone { table_name: String },
}

impl DestroyPlan {
    pub fn is_no_change(&self) -> bool {
        matches!(self, DestroyPlan::AlreadyGone { .. })
    }
}

/// Pure function: Calculate what changes are needed to reach desired state.
pub fn calculate_deploy_plan(current: Option<&TableState>, desired: &TableSchema) -> DeployPlan {
    match current {
        None => DeployPlan::CreateTable {
            schema: desired.clone(),
        },
        Some(state) => {
            // Find GSIs that exist in desired but not in current
            let existing_gsi_names: Vec<&str> =
                state.gsis.iter().map(|g| g.name.as_str()).collect();

            let gsis_to_add: Vec<GsiSchema> = desired
                .gsis
                .iter()
                .filter(|gsi| !existing_gsi_names.contains(&gsi.name.as_str()))
                .cloned()
                .collect();

            if gsis_to_add.is_empty() {
                DeployPlan::NoChanges {
                    table_name: desired.table_name.clone(),
                }
            } else {
                DeployPlan::AddGsis {
                    table_name: desired.table_name.clone(),
                    gsis_to_add,
                }
            }
        }
    }
}

/// Pure function: Calculate destroy plan.
pub fn calculate_destroy_plan(current: Option<&TableState>, table_name: &str) -> DestroyPlan {
    match current {
        Some(_) => DestroyPlan::DeleteTable {
            table_name: table_name.to_string(),
        },
        None => DestroyPlan::AlreadyGone {
            table_name: table_name.to_string(),
        },
    }
}

/// Pure function: Format a deploy plan for display.
pub fn format_deploy_plan(plan: &DeployPlan) -> Vec<String> {
    match plan {
        DeployPlan::CreateTable { schema } => {
            let mut lines = vec![
                format!("+ Create table: {}", schema.table_name),
                format!("  Partition key: {} (S)", schema.partition_key.name),
            ];
            if let Some(sk) = &schema.sort_key {
                lines.push(format!("  Sort key: {} (S)", sk.name));
            }
            for gsi in &schema.gsis {
                lines.push(format!("  + GSI: {}", gsi.name));
                lines.push(format!("    Partition key: {} (S)", gsi.partition_key.name));
                if let Some(sk) = &gsi.sort_key {
                    lines.push(format!("    Sort key: {} (S)", sk.name));
                }
            }
            lines.push("  Billing: PAY_PER_REQUEST".to_string());
            lines
        }
        DeployPlan::AddGsis {
            table_name,
            gsis_to_add,
        } => {
            let mut lines = vec![format!("~ Update table: {}", table_name)];
            for gsi in gsis_to_add {
                lines.push(format!("  + Add GSI: {}", gsi.name));
            }
            lines
        }
        DeployPlan::NoChanges { table_name } => {
            vec![format!("= Table '{}' is up to date", table_name)]
        }
    }
}

/// Pure function: Format a destroy plan for display.
pub fn format_destroy_plan(plan: &DestroyPlan) -> Vec<String> {
    match plan {
        DestroyPlan::DeleteTable { table_name } => {
            vec![format!(
                "- Delete table: {} (ALL DATA WILL BE LOST)",
                table_name
            )]
        }
        DestroyPlan::AlreadyGone { table_name } => {
            vec![format!("= Table '{}' does not exist", table_name)]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paygate_core::schema::{default_registry, TRANSACTIONS_TABLE};

    fn transactions_schema() -> TableSchema {
        default_registry().table(TRANSACTIONS_TABLE).unwrap().clone()
    }

    #[test]
    fn test_missing_table_is_created() {
        let plan = calculate_deploy_plan(None, &transactions_schema());
        assert!(matches!(plan, DeployPlan::CreateTable { .. }));
    }

    #[test]
    fn test_missing_gsis_are_added() {
        let state = TableState {
            status: TableStatus::Active,
            gsis: vec![GsiState {
                name: "order_gsi".to_string(),
                status: GsiStatus::Active,
            }],
        };

        let plan = calculate_deploy_plan(Some(&state), &transactions_schema());

        match plan {
            DeployPlan::AddGsis { gsis_to_add, .. } => {
                assert_eq!(gsis_to_add.len(), 1);
                assert_eq!(gsis_to_add[0].name, "status_gsi");
            }
            other => panic!("expected AddGsis, got {other:?}"),
        }
    }

    #[test]
    fn test_complete_table_needs_no_changes() {
        let state = TableState {
            status: TableStatus::Active,
            gsis: vec![
                GsiState {
                    name: "order_gsi".to_string(),
                    status: GsiStatus::Active,
                },
                GsiState {
                    name: "status_gsi".to_string(),
                    status: GsiStatus::Active,
                },
            ],
        };

        let plan = calculate_deploy_plan(Some(&state), &transactions_schema());
        assert!(plan.is_no_change());
    }

    #[test]
    fn test_destroy_plan_for_absent_table() {
        let plan = calculate_destroy_plan(None, "paygate_transactions");
        assert!(plan.is_no_change());
    }
}
