//! Schema metadata, the per-connection schema cache and table selection
//!
//! Schemas are fetched wholesale per connection and replace whatever was
//! cached before. Each fetch is issued a [`FetchTicket`]; only the newest
//! ticket for a connection may write to the cache, so a slow response can
//! never overwrite a fresher one.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::connection::ConnectionId;

/// A column of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    /// Column name
    pub name: String,

    /// Column type as reported by the database (free text)
    #[serde(rename = "type")]
    pub data_type: String,

    /// Part of the primary key
    #[serde(default)]
    pub is_primary_key: bool,

    /// Part of a foreign key
    #[serde(default)]
    pub is_foreign_key: bool,

    /// Referenced column as `table.column`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<String>,
}

impl Column {
    /// Plain column
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            is_primary_key: false,
            is_foreign_key: false,
            references: None,
        }
    }

    /// Mark as primary key
    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }

    /// Mark as foreign key referencing `table.column`
    pub fn references(mut self, target: impl Into<String>) -> Self {
        self.is_foreign_key = true;
        self.references = Some(target.into());
        self
    }

    /// Split `references` into `(table, column)`
    pub fn reference_target(&self) -> Option<(&str, &str)> {
        self.references.as_deref()?.split_once('.')
    }
}

/// A table and its columns, in display order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Table name
    pub name: String,

    /// Columns in display order
    #[serde(default)]
    pub columns: Vec<Column>,
}

impl Table {
    /// Create a table
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// First column with the given name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Names of the primary key columns
    pub fn primary_key(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.is_primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// A named schema (database namespace) with its tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Schema name
    pub name: String,

    /// Tables in display order
    #[serde(default)]
    pub tables: Vec<Table>,
}

impl Schema {
    /// Create a schema
    pub fn new(name: impl Into<String>, tables: Vec<Table>) -> Self {
        Self {
            name: name.into(),
            tables,
        }
    }

    /// Look up a table
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }
}

/// Proof that a schema fetch was started; see [`SchemaCache::begin_fetch`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    connection: ConnectionId,
    generation: u64,
}

impl FetchTicket {
    /// Connection the fetch is for
    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    /// Generation number of the fetch
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Schemas per connection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaCache {
    entries: BTreeMap<ConnectionId, Vec<Schema>>,

    #[serde(skip)]
    generations: HashMap<ConnectionId, u64>,
}

impl SchemaCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fetch for `connection`, superseding any fetch in flight
    pub fn begin_fetch(&mut self, connection: ConnectionId) -> FetchTicket {
        let generation = self.generations.entry(connection).or_insert(0);
        *generation += 1;
        FetchTicket {
            connection,
            generation: *generation,
        }
    }

    /// Whether `ticket` is still the newest fetch for its connection
    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        self.generations.get(&ticket.connection) == Some(&ticket.generation)
    }

    /// Store the result of a fetch.
    ///
    /// Replaces the cached list wholesale and returns `true`, unless a newer
    /// fetch was started since, in which case the result is dropped.
    pub fn complete_fetch(&mut self, ticket: FetchTicket, schemas: Vec<Schema>) -> bool {
        if !self.is_current(&ticket) {
            tracing::debug!(
                connection = %ticket.connection,
                generation = ticket.generation,
                "Discarding stale schema response"
            );
            return false;
        }
        self.entries.insert(ticket.connection, schemas);
        true
    }

    /// Replace the cached schemas for `connection` without a ticket
    pub fn replace(&mut self, connection: ConnectionId, schemas: Vec<Schema>) {
        let ticket = self.begin_fetch(connection);
        self.complete_fetch(ticket, schemas);
    }

    /// Cached schemas for a connection
    pub fn get(&self, connection: ConnectionId) -> Option<&[Schema]> {
        self.entries.get(&connection).map(Vec::as_slice)
    }

    /// Look up one table
    pub fn table(&self, connection: ConnectionId, schema: &str, table: &str) -> Option<&Table> {
        self.get(connection)?
            .iter()
            .find(|s| s.name == schema)?
            .table(table)
    }

    /// Forget everything cached for a connection; in-flight fetches are
    /// superseded as well
    pub fn invalidate(&mut self, connection: ConnectionId) -> Option<Vec<Schema>> {
        self.begin_fetch(connection);
        self.entries.remove(&connection)
    }

    /// Connections with cached schemas
    pub fn connections(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.entries.keys().copied()
    }
}

/// An active `(schema, table)` pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableSelection {
    /// Schema name
    pub schema: String,
    /// Table name
    pub table: String,
}

impl TableSelection {
    /// Create a selection
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// `schema.table`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }
}

/// Proof that a preview was requested for a particular selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewTicket {
    selection: TableSelection,
    generation: u64,
    limit: usize,
}

impl PreviewTicket {
    /// Selection being previewed
    pub fn selection(&self) -> &TableSelection {
        &self.selection
    }

    /// Maximum number of rows to keep
    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// Which table is active for preview and transformation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectionState {
    /// Connection the selection belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionId>,

    /// Active pair
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<TableSelection>,

    #[serde(skip)]
    generation: u64,
}

impl SelectionState {
    /// Create an empty selection
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `(schema, table)` active.
    ///
    /// The pair is not checked against the schema cache; use
    /// [`SelectionState::resolve`] for that.
    pub fn select_table(
        &mut self,
        connection: Option<ConnectionId>,
        schema: impl Into<String>,
        table: impl Into<String>,
    ) {
        self.connection = connection;
        self.active = Some(TableSelection::new(schema, table));
        self.generation += 1;
    }

    /// Clear the selection
    pub fn clear(&mut self) {
        self.connection = None;
        self.active = None;
        self.generation += 1;
    }

    /// Clear the selection if it belongs to `connection`
    pub fn clear_for(&mut self, connection: ConnectionId) {
        if self.connection == Some(connection) {
            self.clear();
        }
    }

    /// Find the selected table's metadata in `cache`
    pub fn resolve<'a>(&self, cache: &'a SchemaCache) -> Option<&'a Table> {
        let active = self.active.as_ref()?;
        cache.table(self.connection?, &active.schema, &active.table)
    }

    /// Start a bounded preview of the active table
    pub fn begin_preview(&self, limit: usize) -> Option<PreviewTicket> {
        Some(PreviewTicket {
            selection: self.active.clone()?,
            generation: self.generation,
            limit,
        })
    }

    /// Trim `rows` to the ticket's limit, or drop them if the selection
    /// changed while the preview was loading
    pub fn accept_preview(
        &self,
        ticket: &PreviewTicket,
        mut rows: Vec<serde_json::Value>,
    ) -> Option<Vec<serde_json::Value>> {
        if ticket.generation != self.generation || self.active.as_ref() != Some(&ticket.selection) {
            tracing::debug!(table = %ticket.selection.qualified_name(), "Discarding stale preview");
            return None;
        }
        rows.truncate(ticket.limit);
        Some(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn airport_schema() -> Schema {
        Schema::new(
            "airportdb",
            vec![
                Table::new(
                    "airline",
                    vec![
                        Column::new("airline_id", "int").primary_key(),
                        Column::new("iata", "char(2)"),
                    ],
                ),
                Table::new(
                    "flight",
                    vec![
                        Column::new("flight_id", "int").primary_key(),
                        Column::new("airline_id", "int").references("airline.airline_id"),
                    ],
                ),
            ],
        )
    }

    #[test]
    fn test_complete_fetch_replaces_wholesale() {
        let mut cache = SchemaCache::new();
        let conn = ConnectionId::new();
        cache.replace(conn, vec![airport_schema(), Schema::new("other", vec![])]);
        assert_eq!(cache.get(conn).unwrap().len(), 2);

        let ticket = cache.begin_fetch(conn);
        assert!(cache.complete_fetch(ticket, vec![Schema::new("fresh", vec![])]));
        let schemas = cache.get(conn).unwrap();
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].name, "fresh");
    }

    #[test]
    fn test_stale_fetch_is_dropped() {
        let mut cache = SchemaCache::new();
        let conn = ConnectionId::new();
        let first = cache.begin_fetch(conn);
        let second = cache.begin_fetch(conn);

        // the second response lands first
        assert!(cache.complete_fetch(second, vec![Schema::new("new", vec![])]));
        assert!(!cache.complete_fetch(first, vec![Schema::new("old", vec![])]));
        assert_eq!(cache.get(conn).unwrap()[0].name, "new");
    }

    #[test]
    fn test_tickets_are_per_connection() {
        let mut cache = SchemaCache::new();
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        let ta = cache.begin_fetch(a);
        let _tb = cache.begin_fetch(b);
        assert!(cache.is_current(&ta));
    }

    #[test]
    fn test_invalidate_supersedes_in_flight() {
        let mut cache = SchemaCache::new();
        let conn = ConnectionId::new();
        let ticket = cache.begin_fetch(conn);
        cache.invalidate(conn);
        assert!(!cache.complete_fetch(ticket, vec![airport_schema()]));
        assert!(cache.get(conn).is_none());
    }

    #[test]
    fn test_table_lookup_and_reference_target() {
        let mut cache = SchemaCache::new();
        let conn = ConnectionId::new();
        cache.replace(conn, vec![airport_schema()]);
        let flight = cache.table(conn, "airportdb", "flight").unwrap();
        assert_eq!(flight.primary_key(), vec!["flight_id"]);
        let fk = flight.column("airline_id").unwrap();
        assert!(fk.is_foreign_key);
        assert_eq!(fk.reference_target(), Some(("airline", "airline_id")));
        assert!(cache.table(conn, "airportdb", "missing").is_none());
    }

    #[test]
    fn test_select_table_does_not_validate() {
        let cache = SchemaCache::new();
        let mut selection = SelectionState::new();
        selection.select_table(Some(ConnectionId::new()), "nope", "ghost");
        assert_eq!(selection.active, Some(TableSelection::new("nope", "ghost")));
        assert!(selection.resolve(&cache).is_none());
    }

    #[test]
    fn test_preview_is_bounded() {
        let mut selection = SelectionState::new();
        selection.select_table(None, "airportdb", "flight");
        let ticket = selection.begin_preview(50).unwrap();
        let rows: Vec<_> = (0..80).map(|i| json!({ "flight_id": i })).collect();
        let accepted = selection.accept_preview(&ticket, rows).unwrap();
        assert_eq!(accepted.len(), 50);
    }

    #[test]
    fn test_preview_dropped_after_selection_change() {
        let mut selection = SelectionState::new();
        selection.select_table(None, "airportdb", "flight");
        let ticket = selection.begin_preview(50).unwrap();
        selection.select_table(None, "airportdb", "airline");
        assert!(selection.accept_preview(&ticket, vec![json!({})]).is_none());
    }

    #[test]
    fn test_no_preview_without_selection() {
        assert!(SelectionState::new().begin_preview(50).is_none());
    }

    #[test]
    fn test_clear_for_only_matching_connection() {
        let mut selection = SelectionState::new();
        let conn = ConnectionId::new();
        selection.select_table(Some(conn), "s", "t");
        selection.clear_for(ConnectionId::new());
        assert!(selection.active.is_some());
        selection.clear_for(conn);
        assert!(selection.active.is_none());
    }

    #[test]
    fn test_column_json_shape() {
        let col = Column::new("airline_id", "int").references("airline.airline_id");
        let json = serde_json::to_value(&col).unwrap();
        assert_eq!(json["type"], "int");
        assert_eq!(json["isForeignKey"], true);
        assert_eq!(json["references"], "airline.airline_id");
    }
}
