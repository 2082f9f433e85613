//! Pipeloom Core Library
//!
//! This crate provides the state model behind the Pipeloom pipeline designer:
//! - Credentials and the connection registry
//! - Schema cache and table selection
//! - Transformation requests, interpreter and preview
//! - The pipeline graph and its JSON export
//! - Flat-file uploads, session notices and configuration
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ Connection  │────▶│   Schema    │────▶│  Transform  │────▶│  Pipeline   │
//! │  Registry   │     │   Cache     │     │   Request   │     │   Graph     │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use pipeloom_core::{Workspace, ConnectionDraft, ConnectionKind, Credential, DbEngine};
//!
//! let mut ws = Workspace::new();
//! let id = ws.registry.add_connection(ConnectionDraft::new(
//!     "orders",
//!     ConnectionKind::Source,
//!     Credential::new(DbEngine::Mysql, "localhost").with_username("root"),
//! ));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod connection;
pub mod credential;
pub mod error;
pub mod flatfile;
pub mod interpreter;
pub mod outcome;
pub mod pipeline;
pub mod registry;
pub mod schema;
pub mod session;
pub mod transform;
pub mod workspace;

pub use config::{Config, ProjectConfig};
pub use connection::{Connection, ConnectionDraft, ConnectionId, ConnectionKind, ConnectionStatus};
pub use credential::{Credential, DbEngine};
pub use error::{Error, Result};
pub use outcome::Outcome;
pub use pipeline::PipelineGraph;
pub use registry::ConnectionRegistry;
pub use schema::{Column, Schema, SchemaCache, Table, TableSelection};
pub use session::Session;
pub use workspace::Workspace;
