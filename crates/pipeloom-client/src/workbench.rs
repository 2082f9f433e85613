//! Workbench service
//!
//! Owns the [`Workspace`], the [`Session`] and a [`Backend`], and runs the
//! user-level operations that need the network. Backend failures never
//! escape: each operation ends in an [`Outcome`], updates connection state
//! where that applies, and leaves a notice on the session.
//!
//! Locks are taken for short synchronous sections only; no guard is held
//! across a backend call.

use chrono::Utc;
use futures::future::join_all;
use pipeloom_core::config::{BackendMode, ProjectConfig};
use pipeloom_core::connection::ConnectionDraft;
use pipeloom_core::flatfile::FlatFile;
use pipeloom_core::interpreter::{apply_ops, apply_to_table};
use pipeloom_core::pipeline::{DeleteOutcome, EdgeKind, TransformationConfig};
use pipeloom_core::registry::TestReport;
use pipeloom_core::schema::{Schema, Table, TableSelection};
use pipeloom_core::session::Preferences;
use pipeloom_core::transform::TransformationRequest;
use pipeloom_core::{ConnectionId, Outcome, Session, Workspace};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::api::ApiClient;
use crate::backend::Backend;
use crate::demo::DemoBackend;
use crate::error::{Error, Result};

/// Message shown when something fails for a reason the user cannot act on
pub const UNEXPECTED_ERROR: &str = "An unexpected error occurred";

/// Rows previewed when nothing else is configured
pub const DEFAULT_PREVIEW_LIMIT: usize = 50;

/// Build the backend named by the project configuration
pub fn backend_for(project: &ProjectConfig, prefs: &Preferences) -> Result<Box<dyn Backend>> {
    Ok(match project.backend.mode {
        BackendMode::Live => Box::new(ApiClient::new(
            &project.backend,
            prefs.cors_proxy_url.as_deref(),
        )?),
        BackendMode::Demo => Box::new(DemoBackend::with_latency(Duration::from_millis(200))),
    })
}

/// Rows fetched for a table
#[derive(Debug, Clone, PartialEq)]
pub struct TablePreview {
    /// Table the rows belong to
    pub table: TableSelection,
    /// At most the preview limit of rows
    pub rows: Vec<Value>,
}

/// A flat file placed on the pipeline canvas
#[derive(Debug, Clone, PartialEq)]
pub struct Upload {
    /// Id of the new table node
    pub node_id: String,
    /// Parsed file
    pub file: FlatFile,
}

/// Stateful front end over a backend
pub struct Workbench {
    backend: Box<dyn Backend>,
    workspace: RwLock<Workspace>,
    session: Mutex<Session>,
    preview_limit: usize,
}

impl Workbench {
    /// Create a workbench over existing state
    pub fn new(backend: Box<dyn Backend>, workspace: Workspace, session: Session) -> Self {
        Self {
            backend,
            workspace: RwLock::new(workspace),
            session: Mutex::new(session),
            preview_limit: DEFAULT_PREVIEW_LIMIT,
        }
    }

    /// Cap previews at `limit` rows
    pub fn with_preview_limit(mut self, limit: usize) -> Self {
        self.preview_limit = limit.max(1);
        self
    }

    /// Read access to the workspace
    pub async fn workspace(&self) -> RwLockReadGuard<'_, Workspace> {
        self.workspace.read().await
    }

    /// Write access to the workspace
    pub async fn workspace_mut(&self) -> RwLockWriteGuard<'_, Workspace> {
        self.workspace.write().await
    }

    /// The user session
    pub async fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().await
    }

    /// Give back the state for persisting
    pub fn into_parts(self) -> (Workspace, Session) {
        (self.workspace.into_inner(), self.session.into_inner())
    }

    async fn report(&self, title: &str, outcome: &Outcome) {
        let mut session = self.session.lock().await;
        if outcome.success {
            session.success(title, &outcome.message);
        } else {
            session.destructive(title, &outcome.message);
        }
    }

    async fn fail(&self, title: &str, message: impl Into<String>) -> Outcome {
        let outcome = Outcome::failed(message);
        self.report(title, &outcome).await;
        outcome
    }

    /// User-facing text for `err`; unexpected errors are logged and hidden
    fn describe(context: &str, err: &Error) -> String {
        if err.is_expected() {
            err.to_string()
        } else {
            tracing::error!("{}: {}", context, err);
            UNEXPECTED_ERROR.to_string()
        }
    }

    /// Log in and remember it
    pub async fn login(&self, user: &str) {
        let mut session = self.session.lock().await;
        session.login(user);
        session.success("Logged in", format!("Welcome, {}", user));
    }

    /// Log out
    pub async fn logout(&self) {
        let mut session = self.session.lock().await;
        session.logout();
        session.info("Logged out", "See you soon");
    }

    /// Register a connection after checking its required fields
    pub async fn add_connection(&self, draft: ConnectionDraft) -> Result<ConnectionId> {
        if draft.name.trim().is_empty() {
            return Err(pipeloom_core::Error::Validation { field: "name" }.into());
        }
        draft.credential.require_host()?;
        let name = draft.name.clone();
        let id = self.workspace.write().await.registry.add_connection(draft);
        self.session
            .lock()
            .await
            .success("Connection added", format!("{} is ready to test", name));
        Ok(id)
    }

    /// Test a connection against the backend.
    ///
    /// Records the result on the connection. On success the schema cache
    /// is refreshed too; a failed refresh is only logged and does not change
    /// the test outcome.
    pub async fn test_connection(&self, id: ConnectionId) -> Outcome {
        let credential = self
            .workspace
            .read()
            .await
            .registry
            .get_connection_by_id(id)
            .map(|conn| conn.credential.clone());
        let Some(credential) = credential else {
            return self
                .fail("Connection test failed", format!("connection not found: {}", id))
                .await;
        };
        if let Err(e) = credential.require_host() {
            return self.fail("Connection test failed", e.to_string()).await;
        }

        tracing::info!(connection = %id, backend = self.backend.name(), "Testing connection");
        let result = self.backend.connect(&credential).await;

        let (report, outcome) = match result {
            Ok(databases) => {
                let message = format!("Connected, {} database(s) available", databases.len());
                (
                    Some(TestReport::connected(message.clone(), databases)),
                    Outcome::ok(message),
                )
            }
            Err(e) if e.is_expected() => {
                let message = e.to_string();
                (Some(TestReport::failed(message.clone())), Outcome::failed(message))
            }
            Err(e) => {
                tracing::error!(connection = %id, "Unexpected error testing connection: {}", e);
                (None, Outcome::failed(UNEXPECTED_ERROR))
            }
        };

        {
            let mut ws = self.workspace.write().await;
            let recorded = match report {
                Some(report) => ws.registry.record_test(id, report, Utc::now()).map(|_| ()),
                None => ws.registry.mark_error(id, UNEXPECTED_ERROR),
            };
            if recorded.is_err() {
                tracing::warn!(connection = %id, "Connection removed while its test was running");
            }
        }

        let title = if outcome.success {
            "Connection successful"
        } else {
            "Connection failed"
        };
        self.report(title, &outcome).await;

        if outcome.success {
            if let Err(e) = self.refresh_schemas(id).await {
                tracing::warn!(connection = %id, "Schema fetch after test failed: {}", e);
            }
        }
        outcome
    }

    /// Test every registered connection concurrently
    pub async fn test_all_connections(&self) -> Vec<(ConnectionId, Outcome)> {
        let ids: Vec<ConnectionId> = self
            .workspace
            .read()
            .await
            .registry
            .connections()
            .iter()
            .map(|c| c.id)
            .collect();
        let outcomes = join_all(ids.iter().map(|id| self.test_connection(*id))).await;
        ids.into_iter().zip(outcomes).collect()
    }

    /// Reload the cached schemas of a connection; returns the number of
    /// tables loaded.
    ///
    /// Every database the last test reported becomes a schema; the selected
    /// database, if any, also gets its tables. Results from a fetch that
    /// was overtaken by a newer one are dropped.
    async fn refresh_schemas(&self, id: ConnectionId) -> Result<usize> {
        let (ticket, credential, databases) = {
            let mut ws = self.workspace.write().await;
            let conn = ws
                .registry
                .get_connection_by_id(id)
                .ok_or_else(|| pipeloom_core::Error::ConnectionNotFound { id: id.to_string() })?;
            let credential = conn.credential.clone();
            let databases = conn.databases.clone();
            (ws.schemas.begin_fetch(id), credential, databases)
        };

        let mut schemas: Vec<Schema> = databases
            .into_iter()
            .map(|name| Schema::new(name, Vec::new()))
            .collect();
        let mut loaded = 0;
        if let Some(database) = credential.database.clone() {
            let tables = self.backend.select_database(&credential).await?;
            loaded = tables.len();
            match schemas.iter_mut().find(|s| s.name == database) {
                Some(schema) => schema.tables = tables,
                None => schemas.push(Schema::new(database, tables)),
            }
        }

        let mut ws = self.workspace.write().await;
        if ws.schemas.complete_fetch(ticket, schemas) {
            tracing::debug!(connection = %id, tables = loaded, "Schema cache updated");
        }
        Ok(loaded)
    }

    /// Reload the cached schemas of a connection
    pub async fn fetch_schemas(&self, id: ConnectionId) -> Outcome {
        let outcome = match self.refresh_schemas(id).await {
            Ok(tables) => Outcome::ok(format!("Loaded {} table(s)", tables)),
            Err(e) => Outcome::failed(Self::describe("Schema fetch failed", &e)),
        };
        self.report("Schemas", &outcome).await;
        outcome
    }

    /// Pick the database a connection works against and load its tables.
    ///
    /// The connection stays `selected` even when the table listing fails.
    pub async fn select_database_for_connection(&self, id: ConnectionId, database: &str) -> Outcome {
        let selected = self
            .workspace
            .write()
            .await
            .registry
            .select_database_for_connection(id, database)
            .map(|_| ());
        if let Err(e) = selected {
            return self.fail("Database selection failed", e.to_string()).await;
        }

        let outcome = match self.refresh_schemas(id).await {
            Ok(tables) => Outcome::ok(format!("Loaded {} table(s) from {}", tables, database.trim())),
            Err(e) => Outcome::failed(format!(
                "Failed to load tables: {}",
                Self::describe("Table listing failed", &e)
            )),
        };
        self.report("Database selected", &outcome).await;
        outcome
    }

    /// Make a table active; returns its metadata when cached
    pub async fn select_table(
        &self,
        connection: Option<ConnectionId>,
        schema: &str,
        table: &str,
    ) -> Option<Table> {
        let mut ws = self.workspace.write().await;
        ws.selection.select_table(connection, schema, table);
        ws.selection.resolve(&ws.schemas).cloned()
    }

    /// Fetch a bounded preview of the active table.
    ///
    /// A preview that completes after the selection changed is discarded.
    pub async fn preview_selected(&self) -> std::result::Result<TablePreview, Outcome> {
        let (ticket, credential) = {
            let ws = self.workspace.read().await;
            let ticket = ws.selection.begin_preview(self.preview_limit);
            let credential = ws
                .selection
                .connection
                .and_then(|c| ws.registry.get_connection_by_id(c))
                .map(|c| c.credential.clone());
            (ticket, credential)
        };
        let Some(ticket) = ticket else {
            return Err(self.fail("Preview failed", "No table selected").await);
        };
        let Some(credential) = credential else {
            return Err(self
                .fail("Preview failed", "The selected table has no connection")
                .await);
        };

        let credential = credential.with_database(&ticket.selection().schema);
        let rows = match self
            .backend
            .preview_table(&credential, ticket.selection(), ticket.limit())
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                return Err(self
                    .fail("Preview failed", Self::describe("Preview failed", &e))
                    .await);
            }
        };

        let ws = self.workspace.read().await;
        match ws.selection.accept_preview(&ticket, rows) {
            Some(rows) => Ok(TablePreview {
                table: ticket.selection().clone(),
                rows,
            }),
            None => Err(Outcome::failed("Selection changed while the preview was loading")),
        }
    }

    /// Interpret an instruction against `(schema, table)`.
    ///
    /// Returns `None` when any input is blank; the previous result is then
    /// kept.
    pub async fn process_transformation(
        &self,
        instruction: &str,
        table: &str,
        schema: &str,
    ) -> Option<Outcome> {
        let result = {
            let mut guard = self.workspace.write().await;
            let ws = &mut *guard;
            let metadata = ws
                .selection
                .connection
                .into_iter()
                .chain(ws.schemas.connections())
                .find_map(|c| ws.schemas.table(c, schema, table))
                .filter(|t| !t.columns.is_empty());
            let request = TransformationRequest::new(instruction, table, schema);
            ws.transformation.process(&request, metadata).cloned()
        };
        if let Some(outcome) = &result {
            self.report("Transformation", outcome).await;
        }
        result
    }

    /// Shape of the pending plan's output, when the target table is cached
    pub async fn planned_table(&self) -> Option<Table> {
        let ws = self.workspace.read().await;
        let plan = ws.transformation.pending()?;
        ws.selection
            .connection
            .into_iter()
            .chain(ws.schemas.connections())
            .find_map(|c| ws.schemas.table(c, &plan.target.schema, &plan.target.table))
            .filter(|t| !t.columns.is_empty())
            .map(|t| apply_to_table(t, &plan.ops))
    }

    /// Run the pending transformation over a preview of its table without
    /// committing it
    pub async fn preview_transformation(&self) -> std::result::Result<TablePreview, Outcome> {
        let (plan, credential) = {
            let ws = self.workspace.read().await;
            let plan = ws.transformation.pending().cloned();
            let credential = plan.as_ref().and_then(|plan| {
                ws.selection
                    .connection
                    .into_iter()
                    .chain(ws.schemas.connections())
                    .find(|c| ws.schemas.table(*c, &plan.target.schema, &plan.target.table).is_some())
                    .or(ws.selection.connection)
                    .and_then(|c| ws.registry.get_connection_by_id(c))
                    .map(|c| c.credential.clone())
            });
            (plan, credential)
        };
        let Some(plan) = plan else {
            return Err(self.fail("Preview failed", "No pending transformation").await);
        };
        let Some(credential) = credential else {
            return Err(self
                .fail("Preview failed", "No connection serves the target table")
                .await);
        };

        let credential = credential.with_database(&plan.target.schema);
        let rows = match self
            .backend
            .preview_table(&credential, &plan.target, self.preview_limit)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                return Err(self
                    .fail("Preview failed", Self::describe("Preview failed", &e))
                    .await);
            }
        };

        match apply_ops(&rows, &plan.ops) {
            Ok(rows) => Ok(TablePreview {
                table: plan.target,
                rows,
            }),
            Err(e) => Err(self.fail("Preview failed", e.to_string()).await),
        }
    }

    /// Commit the pending transformation as a node on the pipeline canvas,
    /// wired to its table's node when there is one
    pub async fn commit_transformation(&self) -> Option<String> {
        let committed = {
            let mut ws = self.workspace.write().await;
            ws.transformation.commit().map(|plan| {
                let source = ws.pipeline.find_table(&plan.target.table).map(|n| n.id.clone());
                let label = format!("Transform {}", plan.target.table);
                let instruction = plan.instruction.clone();
                let node = ws.pipeline.add_transformation(
                    label,
                    TransformationConfig {
                        instruction: plan.instruction,
                        target: Some(plan.target),
                        ops: plan.ops,
                    },
                    None,
                );
                if let Some(source) = source {
                    ws.pipeline
                        .connect_with(&source, &node, EdgeKind::DataFlow, Some(instruction));
                }
                node
            })
        };
        let mut session = self.session.lock().await;
        match &committed {
            Some(node) => session.success("Transformation applied", format!("Added node {}", node)),
            None => session.info("Nothing to apply", "Process an instruction first"),
        }
        committed
    }

    /// Add a default table node
    pub async fn add_table(&self) -> String {
        self.workspace.write().await.pipeline.add_table()
    }

    /// Connect two nodes on the canvas
    pub async fn connect_nodes(&self, source: &str, target: &str) -> Option<String> {
        self.workspace.write().await.pipeline.on_connect(source, target)
    }

    /// Delete the flagged nodes and edges
    pub async fn delete_selected(&self) -> DeleteOutcome {
        let outcome = self.workspace.write().await.pipeline.delete_selected();
        let mut session = self.session.lock().await;
        match &outcome {
            DeleteOutcome::NothingSelected => {
                session.info("Nothing selected", "Select nodes or edges to delete")
            }
            DeleteOutcome::Deleted { nodes, edges } => session.success(
                "Deleted",
                format!("Removed {} node(s) and {} edge(s)", nodes, edges),
            ),
        }
        outcome
    }

    /// Lay out a cached schema on the canvas
    pub async fn seed_pipeline(&self, connection: ConnectionId, schema: &str) -> Outcome {
        let seeded = {
            let mut guard = self.workspace.write().await;
            let ws = &mut *guard;
            ws.schemas
                .get(connection)
                .and_then(|schemas| schemas.iter().find(|s| s.name == schema))
                .map(|found| ws.pipeline.seed_from_schema(found).len())
        };
        match seeded {
            Some(nodes) => {
                let outcome = Outcome::ok(format!("Added {} table node(s) from {}", nodes, schema));
                self.report("Pipeline seeded", &outcome).await;
                outcome
            }
            None => {
                self.fail("Pipeline not seeded", format!("schema '{}' is not cached", schema))
                    .await
            }
        }
    }

    /// Export the pipeline as JSON
    pub async fn export_pipeline(&self) -> Result<String> {
        Ok(self.workspace.read().await.export_pipeline()?)
    }

    /// Replace the pipeline from an export
    pub async fn import_pipeline(&self, json: &str) -> Outcome {
        let imported = self.workspace.write().await.import_pipeline(json);
        match imported {
            Ok(()) => {
                let outcome = Outcome::ok("Pipeline imported");
                self.report("Import", &outcome).await;
                outcome
            }
            Err(e) => self.fail("Import failed", e.to_string()).await,
        }
    }

    /// Parse a flat file and place it on the canvas as a table node
    pub async fn upload_file(&self, path: &Path) -> std::result::Result<Upload, Outcome> {
        let file = match FlatFile::load(path) {
            Ok(file) => file,
            Err(e) => return Err(self.fail("Upload failed", e.to_string()).await),
        };
        let node_id = self
            .workspace
            .write()
            .await
            .pipeline
            .add_table_from(&file.table, None);
        self.session.lock().await.success(
            "File uploaded",
            format!("{} ({} rows)", file.table.name, file.rows.len()),
        );
        Ok(Upload { node_id, file })
    }

    /// Check that the backend answers at all
    pub async fn probe(&self) -> Outcome {
        let outcome = match self.backend.probe().await {
            Ok(()) => Outcome::ok(format!("{} backend is reachable", self.backend.name())),
            Err(e) => Outcome::failed(Self::describe("Probe failed", &e)),
        };
        self.report("Backend", &outcome).await;
        outcome
    }
}
