//! Flat-file upload command

use anyhow::Result;
use std::path::Path;

use crate::project::Project;

/// Parse a file, add it to the pipeline and print the first rows
pub async fn run(config_path: &str, file: &str, preview: usize) -> Result<()> {
    let mut project = Project::load(config_path)?;
    let workbench = project.workbench()?;

    let upload = workbench.upload_file(Path::new(file)).await;

    project.finish(workbench)?;
    let upload = upload.map_err(|outcome| anyhow::anyhow!("{}", outcome.message))?;
    println!("{}", upload.node_id);
    for column in &upload.file.table.columns {
        println!("  {:<24} {}", column.name, column.data_type);
    }
    for row in upload.file.preview(preview) {
        println!("{}", serde_json::to_string(row)?);
    }
    Ok(())
}
