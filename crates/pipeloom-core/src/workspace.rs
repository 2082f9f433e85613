//! Workspace snapshot
//!
//! Everything one designer session works on: connections, cached schemas,
//! the active table, the transformation processor and the pipeline graph.
//! The CLI persists it as JSON between invocations.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::connection::ConnectionId;
use crate::error::Result;
use crate::pipeline::PipelineGraph;
use crate::registry::ConnectionRegistry;
use crate::schema::{SchemaCache, SelectionState, TableSelection};
use crate::transform::TransformationProcessor;

/// All designer state
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    /// Known connections
    #[serde(default)]
    pub registry: ConnectionRegistry,

    /// Schemas per connection
    #[serde(default)]
    pub schemas: SchemaCache,

    /// Active table
    #[serde(default)]
    pub selection: SelectionState,

    /// Transformation requests
    #[serde(default)]
    pub transformation: TransformationProcessor,

    /// Pipeline designer graph
    #[serde(default)]
    pub pipeline: PipelineGraph,

    /// Tables picked for the pipeline, as `schema.table`
    #[serde(default)]
    pub selected_tables: Vec<String>,
}

impl Workspace {
    /// Create an empty workspace
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a workspace; a missing file yields an empty one
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("No workspace at {}, starting empty", path.display());
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Write the workspace, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        tracing::debug!("Saved workspace to {}", path.display());
        Ok(())
    }

    /// Remove a connection along with its cached schemas and selection.
    ///
    /// [`ConnectionRegistry::remove_connection`] alone leaves those behind.
    pub fn forget_connection(&mut self, id: ConnectionId) -> bool {
        let removed = self.registry.remove_connection(id).is_some();
        self.schemas.invalidate(id);
        self.selection.clear_for(id);
        removed
    }

    /// Add or remove a table from the pipeline selection; returns whether
    /// it is now selected
    pub fn toggle_selected_table(&mut self, table: &TableSelection) -> bool {
        let name = table.qualified_name();
        if let Some(index) = self.selected_tables.iter().position(|t| *t == name) {
            self.selected_tables.remove(index);
            false
        } else {
            self.selected_tables.push(name);
            true
        }
    }

    /// Export the pipeline graph with the selected tables
    pub fn export_pipeline(&self) -> Result<String> {
        self.pipeline.export_snapshot(&self.selected_tables)
    }

    /// Replace the pipeline graph and selected tables from an export
    pub fn import_pipeline(&mut self, json: &str) -> Result<()> {
        let (graph, selected) = PipelineGraph::import_snapshot(json)?;
        self.pipeline = graph;
        self.selected_tables = selected;
        Ok(())
    }
}
