//! Database credentials
//!
//! A [`Credential`] addresses one external database. Once embedded in a
//! connection it is never mutated in place; edits build a new value.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Supported database engines
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DbEngine {
    /// MySQL / MariaDB
    #[default]
    Mysql,
    /// PostgreSQL
    #[serde(alias = "postgres")]
    Postgresql,
    /// Microsoft SQL Server
    #[serde(alias = "mssql")]
    Sqlserver,
    /// Oracle Database
    Oracle,
    /// MongoDB
    Mongodb,
    /// SQLite (file based, no port)
    Sqlite,
}

impl DbEngine {
    /// All engines, in display order
    pub const ALL: [DbEngine; 6] = [
        DbEngine::Mysql,
        DbEngine::Postgresql,
        DbEngine::Sqlserver,
        DbEngine::Oracle,
        DbEngine::Mongodb,
        DbEngine::Sqlite,
    ];

    /// Wire name used as `db_type` by the backend API
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mysql => "mysql",
            Self::Postgresql => "postgresql",
            Self::Sqlserver => "sqlserver",
            Self::Oracle => "oracle",
            Self::Mongodb => "mongodb",
            Self::Sqlite => "sqlite",
        }
    }

    /// Port used when the credential does not name one
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Self::Mysql => Some(3306),
            Self::Postgresql => Some(5432),
            Self::Sqlserver => Some(1433),
            Self::Oracle => Some(1521),
            Self::Mongodb => Some(27017),
            Self::Sqlite => None,
        }
    }
}

impl fmt::Display for DbEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for DbEngine {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Self::Mysql),
            "postgresql" | "postgres" => Ok(Self::Postgresql),
            "sqlserver" | "mssql" => Ok(Self::Sqlserver),
            "oracle" => Ok(Self::Oracle),
            "mongodb" | "mongo" => Ok(Self::Mongodb),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(Error::ConfigInvalid {
                message: format!("unsupported database engine '{}'", other),
            }),
        }
    }
}

/// A password that never shows up in `Debug` or `Display` output
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wrap a raw password
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the raw value, for building wire requests only
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the password is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(****)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

/// Everything needed to address one external database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    /// Database engine
    pub connection_type: DbEngine,

    /// Host name or address
    pub host: String,

    /// Port; the engine default applies when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,

    /// Login user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Login password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<Secret>,

    /// Selected database, unset until the user picks one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

impl Credential {
    /// Create a credential for `host` with no login details
    pub fn new(connection_type: DbEngine, host: impl Into<String>) -> Self {
        Self {
            connection_type,
            host: host.into(),
            port: None,
            username: None,
            password: None,
            database: None,
        }
    }

    /// Set the port
    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    /// Set the username
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the password
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(Secret::new(password));
        self
    }

    /// Return a copy addressing `database`
    pub fn with_database(&self, database: impl Into<String>) -> Self {
        Self {
            database: Some(database.into()),
            ..self.clone()
        }
    }

    /// Return a copy with no database selected
    pub fn without_database(&self) -> Self {
        Self {
            database: None,
            ..self.clone()
        }
    }

    /// The explicit port, or the engine default rendered as a string
    pub fn effective_port(&self) -> Option<String> {
        match self.port.as_deref().map(str::trim) {
            Some(p) if !p.is_empty() => Some(p.to_string()),
            _ => self
                .connection_type
                .default_port()
                .map(|p| p.to_string()),
        }
    }

    /// Fail unless a host is present; needed for any network action
    pub fn require_host(&self) -> Result<&str> {
        let host = self.host.trim();
        if host.is_empty() {
            return Err(Error::Validation { field: "host" });
        }
        Ok(host)
    }

    /// Fail unless a database is selected; needed for schema browsing
    pub fn require_database(&self) -> Result<&str> {
        match self.database.as_deref().map(str::trim) {
            Some(db) if !db.is_empty() => Ok(db),
            _ => Err(Error::Validation { field: "database" }),
        }
    }

    /// Username or the empty string
    pub fn username_or_empty(&self) -> &str {
        self.username.as_deref().unwrap_or("")
    }

    /// Whether this addresses the local demo server as root
    pub fn is_local_root(&self) -> bool {
        self.host.trim() == "localhost" && self.username.as_deref() == Some("root")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("mysql", DbEngine::Mysql)]
    #[case("Postgres", DbEngine::Postgresql)]
    #[case("postgresql", DbEngine::Postgresql)]
    #[case("mssql", DbEngine::Sqlserver)]
    #[case("mongo", DbEngine::Mongodb)]
    #[case(" sqlite ", DbEngine::Sqlite)]
    fn test_engine_from_str(#[case] input: &str, #[case] expected: DbEngine) {
        assert_eq!(input.parse::<DbEngine>().unwrap(), expected);
    }

    #[test]
    fn test_engine_from_str_unknown() {
        assert!("db2".parse::<DbEngine>().is_err());
    }

    #[test]
    fn test_effective_port_defaults_per_engine() {
        let cred = Credential::new(DbEngine::Postgresql, "db.internal");
        assert_eq!(cred.effective_port(), Some("5432".to_string()));

        let cred = cred.with_port("6543");
        assert_eq!(cred.effective_port(), Some("6543".to_string()));

        let sqlite = Credential::new(DbEngine::Sqlite, "/tmp/app.db");
        assert_eq!(sqlite.effective_port(), None);
    }

    #[test]
    fn test_blank_port_falls_back_to_default() {
        let cred = Credential::new(DbEngine::Mysql, "localhost").with_port("  ");
        assert_eq!(cred.effective_port(), Some("3306".to_string()));
    }

    #[test]
    fn test_require_host() {
        let cred = Credential::new(DbEngine::Mysql, "   ");
        let err = cred.require_host().unwrap_err();
        assert_eq!(err.to_string(), "host is required");

        let cred = Credential::new(DbEngine::Mysql, " localhost ");
        assert_eq!(cred.require_host().unwrap(), "localhost");
    }

    #[test]
    fn test_require_database() {
        let cred = Credential::new(DbEngine::Mysql, "localhost");
        assert!(cred.require_database().is_err());

        let selected = cred.with_database("airportdb");
        assert_eq!(selected.require_database().unwrap(), "airportdb");
        // original untouched
        assert!(cred.database.is_none());
    }

    #[test]
    fn test_password_is_redacted() {
        let cred = Credential::new(DbEngine::Mysql, "localhost")
            .with_username("root")
            .with_password("hunter2");
        let debug = format!("{:?}", cred);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("****"));
        assert_eq!(cred.password.as_ref().unwrap().expose(), "hunter2");
    }

    #[test]
    fn test_is_local_root() {
        let cred = Credential::new(DbEngine::Mysql, "localhost").with_username("root");
        assert!(cred.is_local_root());
        let cred = Credential::new(DbEngine::Mysql, "localhost").with_username("admin");
        assert!(!cred.is_local_root());
    }

    #[test]
    fn test_credential_json_shape() {
        let cred = Credential::new(DbEngine::Postgresql, "pg.local")
            .with_username("etl")
            .with_password("pw");
        let json = serde_json::to_value(&cred).unwrap();
        assert_eq!(json["connectionType"], "postgresql");
        assert_eq!(json["host"], "pg.local");
        assert_eq!(json["password"], "pw");
        assert!(json.get("database").is_none());
    }
}
