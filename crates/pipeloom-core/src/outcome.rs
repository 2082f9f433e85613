//! User-facing operation outcome

use serde::{Deserialize, Serialize};

/// Success flag plus a message meant for the user.
///
/// Every operation that talks to a backend ends in one of these instead of
/// an error, so callers never have to unwind a failure themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// Whether the operation succeeded
    pub success: bool,

    /// Human readable description
    pub message: String,
}

impl Outcome {
    /// A successful outcome
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    /// A failed outcome
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
