//! CLI command implementations

pub mod connection;
pub mod init;
pub mod pipeline;
pub mod schema;
pub mod session;
pub mod status;
pub mod table;
pub mod transform;
pub mod upload;
