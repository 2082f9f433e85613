//! Connection registry
//!
//! In-memory store of every known connection, with the status transitions
//! driven by connection tests and database selection.
//!
//! Removing a connection does not touch the schema cache or the table
//! selection; callers that reference the removed id reset those themselves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::connection::{Connection, ConnectionDraft, ConnectionId, ConnectionKind, ConnectionStatus};
use crate::credential::Credential;
use crate::error::{Error, Result};

/// Result of a connectivity check, as recorded on the connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestReport {
    /// Whether the backend accepted the credentials
    pub success: bool,
    /// Message to surface to the user
    pub message: String,
    /// Databases visible to the login (empty on failure)
    pub databases: Vec<String>,
}

impl TestReport {
    /// A successful test listing `databases`
    pub fn connected(message: impl Into<String>, databases: Vec<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            databases,
        }
    }

    /// A failed test
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            databases: Vec::new(),
        }
    }
}

/// All known connections, in creation order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionRegistry {
    connections: Vec<Connection>,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection in `pending` state and return its id.
    ///
    /// No duplicate detection is done: two drafts for the same host and
    /// database become two connections.
    pub fn add_connection(&mut self, draft: ConnectionDraft) -> ConnectionId {
        let id = ConnectionId::new();
        tracing::info!(connection = %id, name = %draft.name, "Adding connection");
        self.connections.push(Connection::from_draft(id, draft));
        id
    }

    /// Remove a connection, returning it if it existed
    pub fn remove_connection(&mut self, id: ConnectionId) -> Option<Connection> {
        let index = self.connections.iter().position(|c| c.id == id)?;
        tracing::info!(connection = %id, "Removing connection");
        Some(self.connections.remove(index))
    }

    /// Look up a connection
    pub fn get_connection_by_id(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id == id)
    }

    /// Look up a connection by display name (first match)
    pub fn find_by_name(&self, name: &str) -> Option<&Connection> {
        self.connections.iter().find(|c| c.name == name)
    }

    /// All connections
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Connections on one side of the pipeline
    pub fn connections_of_kind(&self, kind: ConnectionKind) -> impl Iterator<Item = &Connection> {
        self.connections.iter().filter(move |c| c.kind == kind)
    }

    /// Number of connections
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Current status of a connection
    pub fn status(&self, id: ConnectionId) -> Option<ConnectionStatus> {
        self.get_connection_by_id(id).map(|c| c.status)
    }

    /// When a connection was last tested
    pub fn last_tested(&self, id: ConnectionId) -> Option<DateTime<Utc>> {
        self.get_connection_by_id(id).and_then(|c| c.last_tested)
    }

    fn get_mut(&mut self, id: ConnectionId) -> Result<&mut Connection> {
        self.connections
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::ConnectionNotFound { id: id.to_string() })
    }

    /// Replace a connection's credential wholesale.
    ///
    /// The connection goes back to `pending` since the old test result no
    /// longer describes the new credential.
    pub fn update_credential(&mut self, id: ConnectionId, credential: Credential) -> Result<()> {
        let conn = self.get_mut(id)?;
        conn.credential = credential;
        conn.status = ConnectionStatus::Pending;
        conn.last_tested = None;
        conn.last_message = None;
        conn.databases.clear();
        Ok(())
    }

    /// Rename a connection
    pub fn rename(&mut self, id: ConnectionId, name: impl Into<String>) -> Result<()> {
        self.get_mut(id)?.name = name.into();
        Ok(())
    }

    /// Record the outcome of a connectivity test.
    ///
    /// Success always moves the connection to `connected`. Failure moves it
    /// to `failed`, except that a `selected` connection stays `selected`.
    pub fn record_test(
        &mut self,
        id: ConnectionId,
        report: TestReport,
        at: DateTime<Utc>,
    ) -> Result<&Connection> {
        let conn = self.get_mut(id)?;
        conn.last_tested = Some(at);
        if report.success {
            conn.status = ConnectionStatus::Connected;
            conn.databases = report.databases;
        } else if conn.status != ConnectionStatus::Selected {
            conn.status = ConnectionStatus::Failed;
        }
        tracing::debug!(connection = %id, status = %conn.status, "Recorded connection test");
        conn.last_message = Some(report.message);
        Ok(conn)
    }

    /// Mark a connection as errored after an unexpected failure
    pub fn mark_error(&mut self, id: ConnectionId, message: impl Into<String>) -> Result<()> {
        let conn = self.get_mut(id)?;
        if conn.status != ConnectionStatus::Selected {
            conn.status = ConnectionStatus::Error;
        }
        conn.last_message = Some(message.into());
        Ok(())
    }

    /// Pick the database a connection works against.
    ///
    /// Sets the database and `selected` together. Nothing is rolled back if
    /// a later table listing fails.
    pub fn select_database_for_connection(
        &mut self,
        id: ConnectionId,
        database: &str,
    ) -> Result<&Connection> {
        let database = database.trim();
        if database.is_empty() {
            return Err(Error::Validation { field: "database" });
        }
        let conn = self.get_mut(id)?;
        conn.credential = conn.credential.with_database(database);
        conn.status = ConnectionStatus::Selected;
        tracing::info!(connection = %id, database, "Selected database");
        Ok(conn)
    }

    /// Drop the selected database, going back to `connected`
    pub fn clear_database(&mut self, id: ConnectionId) -> Result<()> {
        let conn = self.get_mut(id)?;
        conn.credential = conn.credential.without_database();
        if conn.status == ConnectionStatus::Selected {
            conn.status = ConnectionStatus::Connected;
        }
        Ok(())
    }
}
