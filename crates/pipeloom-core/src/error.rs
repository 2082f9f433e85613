//! Error types for pipeloom-core

use thiserror::Error;

/// Result type alias for pipeloom-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in pipeloom-core
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file could not be found
    #[error("configuration file not found: {path}")]
    ConfigNotFound {
        /// Path that was searched
        path: String,
    },

    /// Failed to parse YAML configuration
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// Invalid configuration value
    #[error("invalid configuration: {message}")]
    ConfigInvalid {
        /// Description of what's invalid
        message: String,
    },

    /// A required field was missing or blank
    #[error("{field} is required")]
    Validation {
        /// Name of the missing field
        field: &'static str,
    },

    /// No connection with the given id is registered
    #[error("connection not found: {id}")]
    ConnectionNotFound {
        /// The id that was looked up
        id: String,
    },

    /// A node referenced by id does not exist in the pipeline graph
    #[error("node not found: {id}")]
    NodeNotFound {
        /// The id that was looked up
        id: String,
    },

    /// Pipeline snapshot could not be imported
    #[error("invalid pipeline snapshot: {message}")]
    InvalidSnapshot {
        /// Description of the problem
        message: String,
    },

    /// Instruction could not be turned into transformation steps
    #[error("could not interpret instruction '{instruction}': {message}")]
    Interpret {
        /// The instruction text
        instruction: String,
        /// Description of the problem
        message: String,
    },

    /// Transformation step failed validation or execution
    #[error("transform error in '{transform}': {message}")]
    TransformError {
        /// Name of the step
        transform: String,
        /// Description of the error
        message: String,
    },

    /// Flat file could not be read as a table
    #[error("cannot import '{file}': {message}")]
    FlatFile {
        /// File name
        file: String,
        /// Description of the problem
        message: String,
    },

    /// CSV parsing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
