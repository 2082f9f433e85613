//! Initialize a new Pipeloom project

use anyhow::Result;
use pipeloom_core::config::{CONFIG_FILE, DEFAULT_BASE_URL};
use std::fs;
use std::path::Path;

/// Run the init command
pub async fn run(path: &str, name: Option<&str>, demo: bool) -> Result<()> {
    let project_dir = Path::new(path);

    // Create directory if it doesn't exist
    if !project_dir.exists() {
        fs::create_dir_all(project_dir)?;
    }

    // Get absolute path for deriving name
    let abs_path = project_dir.canonicalize()?;

    // Derive project name from directory name if not provided
    let project_name = match name {
        Some(n) => n.to_string(),
        None => abs_path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("Could not determine project name from path"))?,
    };

    // Check if already initialized
    if project_dir.join(CONFIG_FILE).exists() {
        anyhow::bail!(
            "Directory '{}' already contains a {}",
            project_dir.display(),
            CONFIG_FILE
        );
    }

    tracing::info!("Creating new Pipeloom project: {}", project_name);

    let mode = if demo { "demo" } else { "live" };
    let config = format!(
        r#"# Pipeloom Project Configuration
name: {project_name}

backend:
  # live: HTTP database gateway, demo: built-in sample databases
  mode: {mode}
  base_url: "{DEFAULT_BASE_URL}"
  connect_timeout_secs: 10
  request_timeout_secs: 30

# Rows fetched when previewing a table
preview_limit: 50

# Where connections, schemas and the pipeline are kept between runs
state_dir: ".pipeloom"
"#
    );
    fs::write(project_dir.join(CONFIG_FILE), config)?;

    fs::create_dir_all(project_dir.join(".pipeloom"))?;
    let gitignore = project_dir.join(".gitignore");
    if !gitignore.exists() {
        fs::write(gitignore, ".pipeloom/\n")?;
    }

    println!("✓ Created project '{}' ({} backend)", project_name, mode);
    println!();
    println!("Next steps:");
    println!("  pipeloom connection add --name local --host localhost --username root");
    println!("  pipeloom connection test local");
    println!("  pipeloom connection select-db local airportdb");
    Ok(())
}
