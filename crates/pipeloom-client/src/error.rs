//! Error types for pipeloom-client

use thiserror::Error;

/// Result type alias for pipeloom-client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while talking to a backend
#[derive(Error, Debug)]
pub enum Error {
    /// The request never got a response
    #[error("network error: {0}")]
    Network(String),

    /// The backend did not answer in time
    #[error("request timed out after {after_secs}s")]
    Timeout {
        /// Timeout that elapsed
        after_secs: u64,
    },

    /// The backend answered with a non-2xx status
    #[error("backend returned HTTP {status}: {body}")]
    HttpStatus {
        /// Status code
        status: u16,
        /// Start of the response body
        body: String,
    },

    /// The body was not the JSON we expected
    #[error("malformed response: {message}")]
    MalformedBody {
        /// Description of the problem
        message: String,
    },

    /// The backend answered but refused the request
    #[error("{message}")]
    Rejected {
        /// Message from the backend
        message: String,
    },

    /// The host could not be reached
    #[error("cannot reach host '{host}'")]
    Unreachable {
        /// Host that was tried
        host: String,
    },

    /// Core model error
    #[error(transparent)]
    Core(#[from] pipeloom_core::Error),
}

impl Error {
    /// Whether this is one of the failures a backend call is expected to
    /// produce, as opposed to a bug or corrupt local state
    pub fn is_expected(&self) -> bool {
        match self {
            Self::Network(_)
            | Self::Timeout { .. }
            | Self::HttpStatus { .. }
            | Self::MalformedBody { .. }
            | Self::Rejected { .. }
            | Self::Unreachable { .. } => true,
            Self::Core(e) => matches!(e, pipeloom_core::Error::Validation { .. }),
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                after_secs: timeout_secs,
            }
        } else if err.is_decode() {
            Self::MalformedBody {
                message: err.to_string(),
            }
        } else {
            Self::Network(err.to_string())
        }
    }
}
