//! Connection records
//!
//! A connection names one external database, carries its credential and
//! tracks where it is in the test/select lifecycle:
//!
//! ```text
//! pending ──test ok──▶ connected ──pick db──▶ selected
//!    │                     │
//!    └──test failed──▶ failed ◀──test failed──┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::credential::Credential;
use crate::error::{Error, Result};

/// Opaque connection identifier (UUIDv4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    /// Generate a fresh random id
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ConnectionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        uuid::Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| Error::ConnectionNotFound { id: s.to_string() })
    }
}

/// Which side of the pipeline a connection feeds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    /// Data is read from here
    #[default]
    Source,
    /// Data is written here
    Target,
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.pad("source"),
            Self::Target => f.pad("target"),
        }
    }
}

impl FromStr for ConnectionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "source" => Ok(Self::Source),
            "target" => Ok(Self::Target),
            other => Err(Error::ConfigInvalid {
                message: format!("connection type must be 'source' or 'target', got '{}'", other),
            }),
        }
    }
}

/// Lifecycle status of a connection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Created, never tested
    #[default]
    Pending,
    /// Last test succeeded
    Connected,
    /// A database has been picked
    Selected,
    /// Last test failed
    Failed,
    /// An unexpected error happened while talking to the backend
    Error,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Connected => "connected",
            Self::Selected => "selected",
            Self::Failed => "failed",
            Self::Error => "error",
        };
        f.pad(s)
    }
}

/// What a connection form submits
#[derive(Debug, Clone)]
pub struct ConnectionDraft {
    /// Display label
    pub name: String,
    /// Source or target
    pub kind: ConnectionKind,
    /// Addressing details
    pub credential: Credential,
}

impl ConnectionDraft {
    /// Create a draft
    pub fn new(name: impl Into<String>, kind: ConnectionKind, credential: Credential) -> Self {
        Self {
            name: name.into(),
            kind,
            credential,
        }
    }
}

/// A registered connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    /// Identifier
    pub id: ConnectionId,

    /// Display label
    pub name: String,

    /// Source or target
    #[serde(rename = "type")]
    pub kind: ConnectionKind,

    /// Addressing details
    pub credential: Credential,

    /// Lifecycle status
    pub status: ConnectionStatus,

    /// When the connection was last tested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_tested: Option<DateTime<Utc>>,

    /// Message from the last test or selection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,

    /// Databases reported by the last successful test
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub databases: Vec<String>,
}

impl Connection {
    /// Build a pending connection from a draft
    pub fn from_draft(id: ConnectionId, draft: ConnectionDraft) -> Self {
        Self {
            id,
            name: draft.name,
            kind: draft.kind,
            credential: draft.credential,
            status: ConnectionStatus::Pending,
            last_tested: None,
            last_message: None,
            databases: Vec::new(),
        }
    }

    /// Selected database, if any
    pub fn database(&self) -> Option<&str> {
        self.credential.database.as_deref()
    }

    /// Whether schemas can be browsed (a database is selected)
    pub fn can_browse(&self) -> bool {
        self.credential.require_database().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::DbEngine;

    #[test]
    fn test_connection_ids_are_unique() {
        let ids: std::collections::HashSet<_> = (0..1000).map(|_| ConnectionId::new()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_connection_id_round_trips_through_display() {
        let id = ConnectionId::new();
        let parsed: ConnectionId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<ConnectionId>().is_err());
    }

    #[test]
    fn test_from_draft_is_pending() {
        let draft = ConnectionDraft::new(
            "warehouse",
            ConnectionKind::Target,
            Credential::new(DbEngine::Postgresql, "pg"),
        );
        let conn = Connection::from_draft(ConnectionId::new(), draft);
        assert_eq!(conn.status, ConnectionStatus::Pending);
        assert!(conn.last_tested.is_none());
        assert!(!conn.can_browse());
    }

    #[test]
    fn test_connection_serializes_type_field() {
        let draft = ConnectionDraft::new(
            "src",
            ConnectionKind::Source,
            Credential::new(DbEngine::Mysql, "localhost"),
        );
        let conn = Connection::from_draft(ConnectionId::new(), draft);
        let json = serde_json::to_value(&conn).unwrap();
        assert_eq!(json["type"], "source");
        assert_eq!(json["status"], "pending");
        assert!(json.get("lastTested").is_none());
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("Target".parse::<ConnectionKind>().unwrap(), ConnectionKind::Target);
        assert!("sink".parse::<ConnectionKind>().is_err());
    }
}
