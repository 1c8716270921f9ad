use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use super::errors::QueueError;
use crate::error::{CommonError, CommonResult};

/// Queue configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Name attached to log lines and metrics
    pub name: String,
    /// Maximum number of items waiting behind the in-flight one; `None`
    /// accepts every item
    pub max_pending: Option<usize>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { name: "sequential-queue".to_string(), max_pending: None }
    }
}

impl QueueConfig {
    /// Create an unbounded configuration with the given name
    pub fn named<S: Into<String>>(name: S) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    /// Reject items with `CapacityExceeded` once `max_pending` are waiting
    #[must_use]
    pub fn bounded(mut self, max_pending: usize) -> Self {
        self.max_pending = Some(max_pending);
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> CommonResult<()> {
        if self.name.trim().is_empty() {
            return Err(CommonError::config_field("name", "Queue name must not be empty"));
        }

        if self.max_pending == Some(0) {
            return Err(CommonError::config_field(
                "max_pending",
                "Max pending must be greater than 0",
            ));
        }

        Ok(())
    }
}

/// A submitted payload together with the sink that settles its caller
pub(crate) struct WorkItem<P, T, E> {
    pub(crate) sequence: u64,
    pub(crate) payload: P,
    pub(crate) enqueued_at: Instant,
    pub(crate) completion: oneshot::Sender<Result<T, E>>,
}

/// Pending result of one enqueued payload
///
/// Resolves with the processor's outcome for exactly that payload. Dropping
/// the handle does not withdraw the item: it is still processed and its
/// outcome is discarded.
#[must_use = "a Completion resolves with the outcome of the enqueued item"]
#[derive(Debug)]
pub struct Completion<T, E> {
    sequence: u64,
    receiver: oneshot::Receiver<Result<T, E>>,
}

impl<T, E> Completion<T, E> {
    pub(crate) fn channel(sequence: u64) -> (oneshot::Sender<Result<T, E>>, Self) {
        let (sender, receiver) = oneshot::channel();
        (sender, Self { sequence, receiver })
    }

    /// A handle that is already settled with `outcome`
    pub fn settled(sequence: u64, outcome: Result<T, E>) -> Self {
        let (sender, completion) = Self::channel(sequence);
        // The receiver is alive in `completion`, so the send cannot fail.
        let _ = sender.send(outcome);
        completion
    }

    /// Sequence number the queue assigned to the item
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl<T, E> Future for Completion<T, E>
where
    E: From<QueueError>,
{
    type Output = Result<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let sequence = self.sequence;
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(QueueError::Abandoned { sequence }.into())),
            Poll::Pending => Poll::Pending,
        }
    }
}
