//! Table selection and preview commands

use anyhow::Result;

use crate::project::{Project, resolve_connection};

/// Make a table active
pub async fn select(config_path: &str, reference: &str, schema: &str, table: &str) -> Result<()> {
    let mut project = Project::load(config_path)?;
    let workbench = project.workbench()?;
    let id = resolve_connection(&*workbench.workspace().await, reference)?;

    match workbench.select_table(Some(id), schema, table).await {
        Some(found) => println!(
            "✓ Selected {}.{} ({} columns)",
            schema,
            table,
            found.columns.len()
        ),
        None => println!("✓ Selected {}.{} (not in the schema cache)", schema, table),
    }
    project.finish(workbench)
}

/// Print a bounded preview of the active table as JSON lines
pub async fn preview(config_path: &str) -> Result<()> {
    let mut project = Project::load(config_path)?;
    let workbench = project.workbench()?;

    let preview = workbench.preview_selected().await;

    project.finish(workbench)?;
    match preview {
        Ok(preview) => {
            for row in &preview.rows {
                println!("{}", serde_json::to_string(row)?);
            }
            tracing::info!("{} row(s) from {}", preview.rows.len(), preview.table.qualified_name());
            Ok(())
        }
        Err(outcome) => anyhow::bail!("{}", outcome.message),
    }
}
