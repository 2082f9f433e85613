//! The seam between the workbench and whatever answers database requests

use async_trait::async_trait;
use pipeloom_core::schema::{Table, TableSelection};
use pipeloom_core::Credential;
use serde_json::Value;

use crate::error::Result;

/// A service that can reach external databases on our behalf.
///
/// [`crate::api::ApiClient`] talks to the HTTP backend;
/// [`crate::demo::DemoBackend`] answers from built-in sample data.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Check the credentials and list the databases the login can see
    async fn connect(&self, credential: &Credential) -> Result<Vec<String>>;

    /// List the tables of `credential.database`
    async fn select_database(&self, credential: &Credential) -> Result<Vec<Table>>;

    /// Fetch up to `limit` rows of a table
    async fn preview_table(
        &self,
        credential: &Credential,
        table: &TableSelection,
        limit: usize,
    ) -> Result<Vec<Value>>;

    /// Check that the backend is reachable at all
    async fn probe(&self) -> Result<()>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}
