//! Service error types.

use crate::actions::ActionError;
use crate::checkpoint::CheckpointError;
use crate::service::ServiceStatus;
use thiserror::Error;

/// Errors that can occur while driving a service
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The operation is not allowed in the service's current status
    #[error("Cannot {operation} a service that is {status}")]
    InvalidUsage {
        operation: &'static str,
        status: ServiceStatus,
    },

    /// An action failed; the step that scheduled it stays committed
    #[error(transparent)]
    Action(#[from] ActionError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}
