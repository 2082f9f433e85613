//! Pipeline graph commands

use anyhow::{Context, Result};
use pipeloom_core::pipeline::DeleteOutcome;

use crate::project::{Project, ensure, resolve_connection};

/// Add a table node, either blank or copied from a cached table
pub async fn add_table(
    config_path: &str,
    from: Option<&str>,
    connection: Option<&str>,
) -> Result<()> {
    let mut project = Project::load(config_path)?;
    let workbench = project.workbench()?;

    let id = match from {
        None => workbench.add_table().await,
        Some(qualified) => {
            let (schema, table) = qualified
                .split_once('.')
                .ok_or_else(|| anyhow::anyhow!("Expected schema.table, got '{}'", qualified))?;
            let mut ws = workbench.workspace_mut().await;
            let found = match connection {
                Some(reference) => {
                    let id = resolve_connection(&ws, reference)?;
                    ws.schemas.table(id, schema, table).cloned()
                }
                None => ws
                    .schemas
                    .connections()
                    .find_map(|id| ws.schemas.table(id, schema, table))
                    .cloned(),
            };
            let found =
                found.ok_or_else(|| anyhow::anyhow!("Table '{}' is not cached", qualified))?;
            ws.pipeline.add_table_from(&found, None)
        }
    };
    println!("{}", id);
    project.finish(workbench)
}

/// Connect two nodes
pub async fn connect(config_path: &str, source: &str, target: &str) -> Result<()> {
    let mut project = Project::load(config_path)?;
    let workbench = project.workbench()?;

    let edge = workbench.connect_nodes(source, target).await;

    project.finish(workbench)?;
    match edge {
        Some(edge) => {
            println!("{}", edge);
            Ok(())
        }
        None => anyhow::bail!("Both '{}' and '{}' must be existing nodes", source, target),
    }
}

/// Flag or unflag nodes and edges
pub async fn select(config_path: &str, ids: &[String], all: bool, clear: bool) -> Result<()> {
    let mut project = Project::load(config_path)?;
    let workbench = project.workbench()?;
    {
        let mut ws = workbench.workspace_mut().await;
        if all && clear {
            ws.pipeline.clear_selection();
        } else if all {
            ws.pipeline.select_all();
        } else {
            let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
            let matched = ws.pipeline.set_selected(&ids, !clear);
            if matched < ids.len() {
                tracing::warn!("{} id(s) did not match any node or edge", ids.len() - matched);
            }
            println!("✓ {} item(s) {}", matched, if clear { "unflagged" } else { "flagged" });
        }
    }
    project.finish(workbench)
}

/// Delete flagged nodes and edges
pub async fn delete_selected(config_path: &str) -> Result<()> {
    let mut project = Project::load(config_path)?;
    let workbench = project.workbench()?;

    let outcome = workbench.delete_selected().await;

    project.finish(workbench)?;
    tracing::debug!(?outcome, "Delete finished");
    if let DeleteOutcome::NothingSelected = outcome {
        tracing::info!("Flag items with `pipeloom pipeline select` first");
    }
    Ok(())
}

/// Remove a node and its edges, or every edge with the id
pub async fn remove(config_path: &str, id: &str) -> Result<()> {
    let mut project = Project::load(config_path)?;
    let workbench = project.workbench()?;
    {
        let mut ws = workbench.workspace_mut().await;
        if ws.pipeline.node(id).is_some() {
            ws.pipeline.remove_node(id)?;
            println!("✓ Removed node {}", id);
        } else {
            match ws.pipeline.remove_edge(id) {
                0 => anyhow::bail!("No node or edge with id '{}'", id),
                n => println!("✓ Removed {} edge(s) {}", n, id),
            }
        }
    }
    project.finish(workbench)
}

/// Lay out a cached schema as nodes and relationships
pub async fn seed(config_path: &str, reference: &str, schema: &str) -> Result<()> {
    let mut project = Project::load(config_path)?;
    let workbench = project.workbench()?;
    let id = resolve_connection(&*workbench.workspace().await, reference)?;

    let outcome = workbench.seed_pipeline(id, schema).await;

    project.finish(workbench)?;
    ensure(&outcome)
}

/// Export the pipeline as JSON
pub async fn export(config_path: &str, output: Option<&str>) -> Result<()> {
    let project = Project::load(config_path)?;
    let workbench = project.workbench()?;
    let json = workbench.export_pipeline().await?;

    match output {
        Some(path) => {
            std::fs::write(path, &json).with_context(|| format!("Failed to write {}", path))?;
            println!("✓ Exported pipeline to {}", path);
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// Replace the pipeline from an export
pub async fn import(config_path: &str, file: &str) -> Result<()> {
    let mut project = Project::load(config_path)?;
    let workbench = project.workbench()?;
    let json = std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file))?;

    let outcome = workbench.import_pipeline(&json).await;

    project.finish(workbench)?;
    ensure(&outcome)
}

/// Print nodes and edges
pub async fn show(config_path: &str) -> Result<()> {
    let project = Project::load(config_path)?;
    let workbench = project.workbench()?;
    let ws = workbench.workspace().await;

    println!("Nodes:");
    for node in ws.pipeline.nodes() {
        let flag = if node.selected { "*" } else { " " };
        println!(
            " {} {:<14} {:<14} {:<24} ({:.0}, {:.0})",
            flag,
            node.id,
            format!("{:?}", node.kind).to_lowercase(),
            node.data.label,
            node.position.x,
            node.position.y
        );
    }
    println!("Edges:");
    for edge in ws.pipeline.edges() {
        let flag = if edge.selected { "*" } else { " " };
        let label = edge
            .data
            .as_ref()
            .and_then(|d| d.label.as_deref())
            .unwrap_or("");
        println!(" {} {} {} → {} {}", flag, edge.id, edge.source, edge.target, label);
    }
    Ok(())
}
