//! Pipeline graph
//!
//! The node/edge model behind the visual pipeline designer. Table nodes
//! describe source or target tables, transformation nodes hold a committed
//! transformation plan, and edges connect them.
//!
//! Node ids come from a per-graph counter that never goes backwards, so an
//! id is never handed out twice even after deletions.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::schema::{Column, Schema, Table, TableSelection};
use crate::transform::TransformOp;

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Node type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A database table
    Table,
    /// A transformation step
    Transformation,
}

/// Canvas position
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Position {
    /// Horizontal offset
    pub x: f64,
    /// Vertical offset
    pub y: f64,
}

impl Position {
    /// Create a position
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Configuration of a transformation node
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransformationConfig {
    /// Instruction the steps came from
    pub instruction: String,
    /// Table the steps apply to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TableSelection>,
    /// Steps in order
    #[serde(default)]
    pub ops: Vec<TransformOp>,
}

/// Payload of a node
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeData {
    /// Display label (table name for table nodes)
    pub label: String,

    /// Columns of a table node
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<Column>,

    /// Configuration of a transformation node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformation: Option<TransformationConfig>,
}

/// A node on the canvas
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    /// Identifier
    pub id: String,

    /// Node type
    #[serde(rename = "type")]
    pub kind: NodeKind,

    /// Canvas position
    pub position: Position,

    /// Payload
    pub data: NodeData,

    /// Flagged for bulk operations
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub selected: bool,
}

/// Edge type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Foreign key style relationship between tables
    #[default]
    Relationship,
    /// Data moving through a transformation
    DataFlow,
}

/// Optional edge payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EdgeData {
    /// Display label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// A connection between two nodes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Edge {
    /// Identifier, derived from the endpoints
    pub id: String,

    /// Source node id
    pub source: String,

    /// Target node id
    pub target: String,

    /// Edge type
    #[serde(rename = "type", default)]
    pub kind: EdgeKind,

    /// Optional payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<EdgeData>,

    /// Flagged for bulk operations
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub selected: bool,
}

/// Result of [`PipelineGraph::delete_selected`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Nothing was flagged; the graph is unchanged
    NothingSelected,
    /// Counts of what was removed
    Deleted {
        /// Nodes removed
        nodes: usize,
        /// Edges removed, including those left dangling
        edges: usize,
    },
}

/// Exported form of a graph
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSnapshot {
    /// Format version; exports without one are version 1
    #[serde(default = "legacy_version")]
    pub version: u32,
    /// Nodes
    pub nodes: Vec<Node>,
    /// Edges
    pub edges: Vec<Edge>,
    /// Tables the user had selected when exporting
    #[serde(default)]
    pub selected_tables: Vec<String>,
}

fn legacy_version() -> u32 {
    1
}

/// Nodes and edges of the designer
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    next_seq: u64,
}

impl PipelineGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// All nodes
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// All edges
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Look up a node
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Whether a node exists
    pub fn contains_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    /// First table node with the given label
    pub fn find_table(&self, label: &str) -> Option<&Node> {
        self.nodes
            .iter()
            .find(|n| n.kind == NodeKind::Table && n.data.label == label)
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.next_seq += 1;
        format!("{}-{}", prefix, self.next_seq)
    }

    fn random_position() -> Position {
        let mut rng = rand::rng();
        Position::new(rng.random_range(50.0..650.0), rng.random_range(50.0..450.0))
    }

    /// Add a table node with the default `id`/`name` columns at a random
    /// position and return its id
    pub fn add_table(&mut self) -> String {
        let label = format!("table_{}", self.next_seq + 1);
        let columns = vec![
            Column::new("id", "int").primary_key(),
            Column::new("name", "varchar(255)"),
        ];
        self.add_table_node(label, columns, Self::random_position())
    }

    /// Add a table node with explicit contents
    pub fn add_table_node(
        &mut self,
        label: impl Into<String>,
        columns: Vec<Column>,
        position: Position,
    ) -> String {
        let id = self.next_id("table");
        let label = label.into();
        tracing::debug!(node = %id, label = %label, "Adding table node");
        self.nodes.push(Node {
            id: id.clone(),
            kind: NodeKind::Table,
            position,
            data: NodeData {
                label,
                columns,
                transformation: None,
            },
            selected: false,
        });
        id
    }

    /// Add a table node describing `table`
    pub fn add_table_from(&mut self, table: &Table, position: Option<Position>) -> String {
        self.add_table_node(
            table.name.clone(),
            table.columns.clone(),
            position.unwrap_or_else(Self::random_position),
        )
    }

    /// Add a transformation node
    pub fn add_transformation(
        &mut self,
        label: impl Into<String>,
        config: TransformationConfig,
        position: Option<Position>,
    ) -> String {
        let id = self.next_id("transform");
        self.nodes.push(Node {
            id: id.clone(),
            kind: NodeKind::Transformation,
            position: position.unwrap_or_else(Self::random_position),
            data: NodeData {
                label: label.into(),
                columns: Vec::new(),
                transformation: Some(config),
            },
            selected: false,
        });
        id
    }

    /// Connect two nodes with a relationship edge.
    ///
    /// Nothing happens unless both ids name existing nodes. The edge id is
    /// derived from the pair, and an identical edge may already exist.
    pub fn on_connect(&mut self, source: &str, target: &str) -> Option<String> {
        self.connect_with(source, target, EdgeKind::Relationship, None)
    }

    /// Connect two nodes with an edge of the given kind and label
    pub fn connect_with(
        &mut self,
        source: &str,
        target: &str,
        kind: EdgeKind,
        label: Option<String>,
    ) -> Option<String> {
        if !self.contains_node(source) || !self.contains_node(target) {
            tracing::debug!(source, target, "Ignoring edge to unknown node");
            return None;
        }
        let id = format!("e{}-{}", source, target);
        self.edges.push(Edge {
            id: id.clone(),
            source: source.to_string(),
            target: target.to_string(),
            kind,
            data: label.map(|label| EdgeData { label: Some(label) }),
            selected: false,
        });
        Some(id)
    }

    /// Flag or unflag nodes and edges by id; returns how many matched
    pub fn set_selected(&mut self, ids: &[&str], selected: bool) -> usize {
        let wanted: HashSet<&str> = ids.iter().copied().collect();
        let mut matched = 0;
        for node in self.nodes.iter_mut().filter(|n| wanted.contains(n.id.as_str())) {
            node.selected = selected;
            matched += 1;
        }
        for edge in self.edges.iter_mut().filter(|e| wanted.contains(e.id.as_str())) {
            edge.selected = selected;
            matched += 1;
        }
        matched
    }

    /// Flag everything
    pub fn select_all(&mut self) {
        self.nodes.iter_mut().for_each(|n| n.selected = true);
        self.edges.iter_mut().for_each(|e| e.selected = true);
    }

    /// Unflag everything
    pub fn clear_selection(&mut self) {
        self.nodes.iter_mut().for_each(|n| n.selected = false);
        self.edges.iter_mut().for_each(|e| e.selected = false);
    }

    /// Remove every flagged node and edge, plus edges left dangling
    pub fn delete_selected(&mut self) -> DeleteOutcome {
        let removed: HashSet<String> = self
            .nodes
            .iter()
            .filter(|n| n.selected)
            .map(|n| n.id.clone())
            .collect();
        let any_edge = self.edges.iter().any(|e| e.selected);
        if removed.is_empty() && !any_edge {
            return DeleteOutcome::NothingSelected;
        }

        let nodes_before = self.nodes.len();
        let edges_before = self.edges.len();
        self.nodes.retain(|n| !n.selected);
        self.edges.retain(|e| {
            !e.selected && !removed.contains(&e.source) && !removed.contains(&e.target)
        });
        let outcome = DeleteOutcome::Deleted {
            nodes: nodes_before - self.nodes.len(),
            edges: edges_before - self.edges.len(),
        };
        tracing::info!(?outcome, "Deleted selected elements");
        outcome
    }

    /// Remove one node and its edges
    pub fn remove_node(&mut self, id: &str) -> Result<Node> {
        let index = self
            .nodes
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(|| Error::NodeNotFound { id: id.to_string() })?;
        self.edges.retain(|e| e.source != id && e.target != id);
        Ok(self.nodes.remove(index))
    }

    /// Remove every edge with the given id; returns how many were removed
    pub fn remove_edge(&mut self, id: &str) -> usize {
        let before = self.edges.len();
        self.edges.retain(|e| e.id != id);
        before - self.edges.len()
    }

    /// Lay out one table node per table of `schema` on a grid, and one
    /// relationship edge per resolvable foreign key. Returns the new node ids.
    pub fn seed_from_schema(&mut self, schema: &Schema) -> Vec<String> {
        const PER_ROW: usize = 4;
        let mut ids = Vec::with_capacity(schema.tables.len());
        for (i, table) in schema.tables.iter().enumerate() {
            let position = Position::new(
                (i % PER_ROW) as f64 * 300.0 + 50.0,
                (i / PER_ROW) as f64 * 250.0 + 50.0,
            );
            ids.push(self.add_table_from(table, Some(position)));
        }

        for (table, source_id) in schema.tables.iter().zip(&ids) {
            for column in &table.columns {
                let Some((ref_table, ref_column)) = column.reference_target() else {
                    continue;
                };
                let target = schema
                    .tables
                    .iter()
                    .position(|t| t.name == ref_table)
                    .map(|i| ids[i].clone());
                let Some(target_id) = target else {
                    tracing::debug!(
                        table = %table.name,
                        reference = ref_table,
                        "Skipping relationship to table outside schema"
                    );
                    continue;
                };
                self.connect_with(
                    source_id,
                    &target_id,
                    EdgeKind::Relationship,
                    Some(format!("{} → {}.{}", column.name, ref_table, ref_column)),
                );
            }
        }
        ids
    }

    /// Snapshot of the graph
    pub fn snapshot(&self, selected_tables: &[String]) -> PipelineSnapshot {
        PipelineSnapshot {
            version: SNAPSHOT_VERSION,
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
            selected_tables: selected_tables.to_vec(),
        }
    }

    /// Serialize the graph as pretty JSON.
    ///
    /// The output depends only on the graph and `selected_tables`.
    pub fn export_snapshot(&self, selected_tables: &[String]) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.snapshot(selected_tables))?)
    }

    /// Rebuild a graph from an exported snapshot
    pub fn from_snapshot(snapshot: PipelineSnapshot) -> Result<Self> {
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(Error::InvalidSnapshot {
                message: format!(
                    "snapshot version {} is newer than supported version {}",
                    snapshot.version, SNAPSHOT_VERSION
                ),
            });
        }
        let mut ids = HashSet::new();
        for node in &snapshot.nodes {
            if !ids.insert(node.id.as_str()) {
                return Err(Error::InvalidSnapshot {
                    message: format!("duplicate node id '{}'", node.id),
                });
            }
        }
        for edge in &snapshot.edges {
            for end in [&edge.source, &edge.target] {
                if !ids.contains(end.as_str()) {
                    return Err(Error::InvalidSnapshot {
                        message: format!("edge '{}' references missing node '{}'", edge.id, end),
                    });
                }
            }
        }

        let next_seq = snapshot
            .nodes
            .iter()
            .filter_map(|n| n.id.rsplit('-').next()?.parse::<u64>().ok())
            .max()
            .unwrap_or(0)
            .max(snapshot.nodes.len() as u64);
        if next_seq == u64::MAX {
            return Err(Error::InvalidSnapshot {
                message: "node ids leave no room for new nodes".to_string(),
            });
        }

        Ok(Self {
            nodes: snapshot.nodes,
            edges: snapshot.edges,
            next_seq,
        })
    }

    /// Parse an exported snapshot; returns the graph and its selected tables
    pub fn import_snapshot(json: &str) -> Result<(Self, Vec<String>)> {
        let snapshot: PipelineSnapshot = serde_json::from_str(json)?;
        let selected = snapshot.selected_tables.clone();
        Ok((Self::from_snapshot(snapshot)?, selected))
    }
}
