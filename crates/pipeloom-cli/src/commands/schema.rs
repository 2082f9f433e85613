//! Schema browsing commands

use anyhow::Result;

use crate::project::{Project, ensure, resolve_connection};

/// Reload the schemas of a connection
pub async fn fetch(config_path: &str, reference: &str) -> Result<()> {
    let mut project = Project::load(config_path)?;
    let workbench = project.workbench()?;
    let id = resolve_connection(&*workbench.workspace().await, reference)?;

    let outcome = workbench.fetch_schemas(id).await;

    project.finish(workbench)?;
    ensure(&outcome)
}

/// Print cached schemas with their tables and columns
pub async fn show(config_path: &str, reference: &str, only: Option<&str>) -> Result<()> {
    let project = Project::load(config_path)?;
    let workbench = project.workbench()?;
    let ws = workbench.workspace().await;
    let id = resolve_connection(&ws, reference)?;

    let Some(schemas) = ws.schemas.get(id) else {
        println!("No schemas cached; run `pipeloom connection test {}` first", reference);
        return Ok(());
    };

    for schema in schemas.iter().filter(|s| only.is_none_or(|o| o == s.name)) {
        println!("{}", schema.name);
        if schema.tables.is_empty() {
            println!("  (tables not loaded)");
        }
        for table in &schema.tables {
            println!("  {}", table.name);
            for column in &table.columns {
                let mut flags = Vec::new();
                if column.is_primary_key {
                    flags.push("PK".to_string());
                }
                if let Some(target) = &column.references {
                    flags.push(format!("FK → {}", target));
                }
                println!(
                    "    {:<24} {:<16} {}",
                    column.name,
                    column.data_type,
                    flags.join(" ")
                );
            }
        }
    }
    Ok(())
}
