//! Show project status command

use anyhow::Result;
use pipeloom_core::ConnectionStatus;

use crate::project::{Project, ensure};

/// Run the status command
pub async fn run(config_path: &str, probe: bool) -> Result<()> {
    let mut project = Project::load(config_path)?;
    let workbench = project.workbench()?;

    {
        let cfg = &project.config.project;
        println!("Project:  {}", cfg.name);
        println!("Backend:  {:?} ({})", cfg.backend.mode, cfg.backend.base_url);
        if let Some(proxy) = &project.prefs.cors_proxy_url {
            println!("Proxy:    {}", proxy);
        }

        let session = workbench.session().await;
        match session.user() {
            Some(user) => println!("User:     {}", user),
            None => println!("User:     (logged out)"),
        }
        drop(session);

        let ws = workbench.workspace().await;
        let connected = ws
            .registry
            .connections()
            .iter()
            .filter(|c| matches!(c.status, ConnectionStatus::Connected | ConnectionStatus::Selected))
            .count();
        println!(
            "Connections: {} ({} connected)",
            ws.registry.len(),
            connected
        );
        println!(
            "Pipeline:    {} node(s), {} edge(s)",
            ws.pipeline.nodes().len(),
            ws.pipeline.edges().len()
        );
        if let Some(active) = &ws.selection.active {
            println!("Active table: {}", active.qualified_name());
        }
        if let Some(result) = ws.transformation.processing_result() {
            let marker = if result.success { "✓" } else { "✗" };
            println!("Last transformation: {} {}", marker, result.message);
        }
    }

    let outcome = if probe {
        Some(workbench.probe().await)
    } else {
        None
    };
    project.finish(workbench)?;
    match outcome {
        Some(outcome) => ensure(&outcome),
        None => Ok(()),
    }
}
