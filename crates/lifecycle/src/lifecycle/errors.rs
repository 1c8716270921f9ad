use std::error::Error as StdError;

use thiserror::Error;

use crate::error::CommonError;
use crate::sync::queue::QueueError;

/// Boxed error raised by a user-supplied lifecycle operation
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Lifecycle and state machine errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    /// A direct transition named a target with no edge from the current state
    #[error("Invalid transition from '{from}' to '{to}'")]
    InvalidTransition { from: String, to: String },

    #[error("Unknown operator '{0}'")]
    UnknownOperator(String),

    #[error("Unknown state '{0}'")]
    UnknownState(String),

    /// The operation callback failed; `source` is the callback's own error
    #[error("{source}")]
    OperationFailed {
        operation: String,
        #[source]
        source: BoxError,
    },

    #[error("Stopped waiting for state '{state}': the state machine was discarded")]
    WaitAbandoned { state: String },
}

impl LifecycleError {
    pub fn invalid_transition(from: impl ToString, to: impl ToString) -> Self {
        Self::InvalidTransition { from: from.to_string(), to: to.to_string() }
    }

    pub fn operation_failed(operation: impl Into<String>, source: BoxError) -> Self {
        Self::OperationFailed { operation: operation.into(), source }
    }

    /// Error raised by the operation callback, if this is an operation failure
    pub fn operation_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            Self::OperationFailed { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }

    /// Take back the callback's error unchanged
    pub fn into_operation_error(self) -> Result<BoxError, Self> {
        match self {
            Self::OperationFailed { source, .. } => Ok(source),
            other => Err(other),
        }
    }
}

/// Lifecycle operation result type
pub type LifecycleResult<T> = Result<T, LifecycleError>;
