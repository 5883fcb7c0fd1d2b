//! Action error types.

use thiserror::Error;

/// Failure reported by an effect action implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ActionFailure(String);

impl ActionFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl From<String> for ActionFailure {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for ActionFailure {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

/// Errors raised while dispatching a batch of actions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// An effect returned an error; the rest of the batch was skipped
    #[error("Action '{action}' failed: {message}")]
    Failed { action: String, message: String },

    /// The dispatcher's table has no implementation for this name
    #[error("Action '{action}' has no implementation")]
    Unresolved { action: String },
}
