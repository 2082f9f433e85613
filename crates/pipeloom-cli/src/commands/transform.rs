//! Transformation commands

use anyhow::Result;
use pipeloom_core::transform::PassthroughInterpreter;

use crate::project::{Project, ensure};

/// Interpret an instruction against a table
pub async fn run(
    config_path: &str,
    instruction: &str,
    table: Option<&str>,
    schema: Option<&str>,
    passthrough: bool,
) -> Result<()> {
    let mut project = Project::load(config_path)?;
    let workbench = project.workbench()?;

    let (table, schema) = {
        let mut ws = workbench.workspace_mut().await;
        if passthrough {
            ws.transformation
                .set_interpreter(Box::new(PassthroughInterpreter));
        }
        let active = ws.selection.active.as_ref();
        (
            table
                .map(str::to_string)
                .or_else(|| active.map(|a| a.table.clone()))
                .unwrap_or_default(),
            schema
                .map(str::to_string)
                .or_else(|| active.map(|a| a.schema.clone()))
                .unwrap_or_default(),
        )
    };

    let outcome = workbench
        .process_transformation(instruction, &table, &schema)
        .await;
    if let Some(planned) = workbench.planned_table().await {
        let columns: Vec<&str> = planned.columns.iter().map(|c| c.name.as_str()).collect();
        println!("Resulting columns: {}", columns.join(", "));
    }

    project.finish(workbench)?;
    match outcome {
        Some(outcome) => ensure(&outcome),
        None => anyhow::bail!("Instruction, table and schema are all required"),
    }
}

/// Apply the pending plan to preview rows
pub async fn preview(config_path: &str) -> Result<()> {
    let mut project = Project::load(config_path)?;
    let workbench = project.workbench()?;

    let preview = workbench.preview_transformation().await;

    project.finish(workbench)?;
    match preview {
        Ok(preview) => {
            for row in &preview.rows {
                println!("{}", serde_json::to_string(row)?);
            }
            Ok(())
        }
        Err(outcome) => anyhow::bail!("{}", outcome.message),
    }
}

/// Add the pending plan to the pipeline
pub async fn commit(config_path: &str) -> Result<()> {
    let mut project = Project::load(config_path)?;
    let workbench = project.workbench()?;

    let node = workbench.commit_transformation().await;

    project.finish(workbench)?;
    if node.is_none() {
        anyhow::bail!("No pending transformation");
    }
    Ok(())
}

/// Drop the pending plan
pub async fn discard(config_path: &str) -> Result<()> {
    let mut project = Project::load(config_path)?;
    let workbench = project.workbench()?;

    let discarded = workbench.workspace_mut().await.transformation.discard();
    match discarded {
        Some(plan) => println!("✓ Discarded plan for {}", plan.target.qualified_name()),
        None => println!("• Nothing to discard"),
    }
    project.finish(workbench)
}
