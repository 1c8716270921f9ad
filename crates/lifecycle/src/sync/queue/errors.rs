use thiserror::Error;

use crate::error::CommonError;

/// Queue operation errors
///
/// These are the failures the queue itself can report for an item. Errors
/// raised by the processor travel to the caller untouched; a processor's
/// error type only has to be constructible from `QueueError` so that both
/// kinds can be delivered through the same `Completion`.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("Queue is at maximum capacity ({0})")]
    CapacityExceeded(usize),

    #[error("No Tokio runtime is available to drive the queue")]
    RuntimeUnavailable,

    #[error("Processor panicked while handling item {sequence}")]
    ProcessorPanicked { sequence: u64 },

    #[error("Item {sequence} was dropped before it was settled")]
    Abandoned { sequence: u64 },
}

/// Queue operation result type
pub type QueueResult<T> = Result<T, QueueError>;
