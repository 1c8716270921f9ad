use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{debug, instrument, warn};

use super::errors::{QueueError, QueueResult};
use super::metrics::{QueueMetrics, QueueMetricsSnapshot};
use super::types::{Completion, QueueConfig, WorkItem};

type Processor<P, T, E> = dyn Fn(P) -> BoxFuture<'static, Result<T, E>> + Send + Sync;

struct QueueState<P, T, E> {
    items: VecDeque<WorkItem<P, T, E>>,
    draining: bool,
    sequence_counter: u64,
}

impl<P, T, E> QueueState<P, T, E> {
    fn next_sequence(&mut self) -> u64 {
        let sequence = self.sequence_counter;
        self.sequence_counter += 1;
        sequence
    }
}

struct Shared<P, T, E> {
    state: Mutex<QueueState<P, T, E>>,
    processor: Box<Processor<P, T, E>>,
    config: QueueConfig,
    metrics: QueueMetrics,
}

/// FIFO queue that runs every payload through one processor, one at a time
///
/// ## Ordering
///
/// Items are processed and settled strictly in the order `enqueue` was
/// called, no matter how many tasks submit concurrently. At most one
/// processor future is in flight at any moment; the next item is not started
/// until the previous future has resolved.
///
/// ## Failure isolation
///
/// Every item has its own [`Completion`]. A processor error (or panic) is
/// delivered to that item's caller only and the drain loop moves on to the
/// next item.
///
/// ## Re-entrancy
///
/// Calling `enqueue` from inside the processor is allowed and appends to the
/// sequence the active drain loop is working through. Awaiting such a nested
/// completion from inside the processor never resolves: the nested item
/// cannot start before the current one finishes.
///
/// ## Runtime
///
/// The drain loop is a task spawned on the ambient Tokio runtime the first
/// time an item arrives at an idle queue. It exits as soon as the queue is
/// empty; the next `enqueue` starts a fresh one.
pub struct SequentialQueue<P, T, E> {
    shared: Arc<Shared<P, T, E>>,
}

impl<P, T, E> SequentialQueue<P, T, E>
where
    P: Send + 'static,
    T: Send + 'static,
    E: From<QueueError> + Send + 'static,
{
    /// Create a queue with default configuration
    pub fn new<F, Fut>(processor: F) -> Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::build(QueueConfig::default(), processor)
    }

    /// Create a queue with custom configuration
    pub fn with_config<F, Fut>(config: QueueConfig, processor: F) -> QueueResult<Self>
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        config.validate()?;
        Ok(Self::build(config, processor))
    }

    pub(crate) fn build<F, Fut>(config: QueueConfig, processor: F) -> Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let processor: Box<Processor<P, T, E>> =
            Box::new(move |payload| processor(payload).boxed());

        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState {
                    items: VecDeque::new(),
                    draining: false,
                    sequence_counter: 0,
                }),
                processor,
                config,
                metrics: QueueMetrics::new(),
            }),
        }
    }

    /// Append `payload` to the queue
    ///
    /// The returned handle resolves with the processor's outcome for this
    /// payload. The item is accepted at call time; the handle does not have to
    /// be polled for the item to run.
    #[instrument(skip_all, fields(queue = %self.shared.config.name))]
    pub fn enqueue(&self, payload: P) -> Completion<T, E> {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!("Rejecting work item: no active Tokio runtime detected");
                let sequence = self.shared.state.lock().next_sequence();
                return Completion::settled(sequence, Err(QueueError::RuntimeUnavailable.into()));
            }
        };

        let (completion, start_drain) = {
            let mut state = self.shared.state.lock();
            let sequence = state.next_sequence();

            if let Some(max_pending) = self.shared.config.max_pending {
                if state.items.len() >= max_pending {
                    self.shared.metrics.record_capacity_rejection();
                    warn!(sequence, max_pending, "Rejecting work item: queue is full");
                    return Completion::settled(
                        sequence,
                        Err(QueueError::CapacityExceeded(max_pending).into()),
                    );
                }
            }

            let (sender, completion) = Completion::channel(sequence);
            state.items.push_back(WorkItem {
                sequence,
                payload,
                enqueued_at: Instant::now(),
                completion: sender,
            });
            self.shared.metrics.record_enqueue(state.items.len());

            let start_drain = !state.draining;
            state.draining = true;
            debug!(sequence, depth = state.items.len(), "Work item enqueued");
            (completion, start_drain)
        };

        if start_drain {
            runtime.spawn(Self::drain(Arc::clone(&self.shared)));
        }

        completion
    }

    async fn drain(shared: Arc<Shared<P, T, E>>) {
        debug!(queue = %shared.config.name, "Drain loop started");
        let mut guard = DrainGuard { shared: Arc::clone(&shared), armed: true };

        loop {
            let item = {
                let mut state = shared.state.lock();
                if let Some(item) = state.items.pop_front() {
                    shared.metrics.update_depth(state.items.len());
                    item
                } else {
                    state.draining = false;
                    shared.metrics.update_depth(0);
                    break;
                }
            };

            let WorkItem { sequence, payload, enqueued_at, completion } = item;
            debug!(
                queue = %shared.config.name,
                sequence,
                waited_us = u64::try_from(enqueued_at.elapsed().as_micros()).unwrap_or(u64::MAX),
                "Processing work item"
            );

            let started = Instant::now();
            let processor = &shared.processor;
            let outcome = AssertUnwindSafe(async move { processor(payload).await })
                .catch_unwind()
                .await;

            let outcome = match outcome {
                Ok(result) => {
                    shared.metrics.record_outcome(result.is_ok(), started.elapsed());
                    result
                }
                Err(_) => {
                    shared.metrics.record_panic(started.elapsed());
                    warn!(queue = %shared.config.name, sequence, "Processor panicked");
                    Err(QueueError::ProcessorPanicked { sequence }.into())
                }
            };

            if completion.send(outcome).is_err() {
                debug!(
                    queue = %shared.config.name,
                    sequence,
                    "Completion handle dropped before the item was settled"
                );
            }
        }

        guard.armed = false;
        debug!(queue = %shared.config.name, "Drain loop idle");
    }
}

/// Releases the `draining` flag if the drain task is dropped before the queue
/// runs empty, e.g. when its runtime shuts down mid-item.
///
/// The in-flight item's sender is dropped with the task, so its caller sees
/// `Abandoned`. Items still waiting stay queued in order and the next
/// `enqueue` starts a fresh drain loop for them.
struct DrainGuard<P, T, E> {
    shared: Arc<Shared<P, T, E>>,
    armed: bool,
}

impl<P, T, E> Drop for DrainGuard<P, T, E> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let mut state = self.shared.state.lock();
        state.draining = false;
        warn!(
            queue = %self.shared.config.name,
            stranded = state.items.len(),
            "Drain loop dropped before the queue was empty"
        );
    }
}

impl<P, T, E> SequentialQueue<P, T, E> {
    /// Items waiting to be processed, excluding the one in flight
    pub fn len(&self) -> usize {
        self.shared.state.lock().items.len()
    }

    /// Check if no items are waiting
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a drain loop is currently active
    pub fn is_draining(&self) -> bool {
        self.shared.state.lock().draining
    }

    /// Queue name from the configuration
    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    /// Active configuration
    pub fn config(&self) -> &QueueConfig {
        &self.shared.config
    }

    /// Get queue metrics
    pub fn metrics(&self) -> QueueMetricsSnapshot {
        self.shared.metrics.snapshot()
    }
}

impl<P, T, E> Clone for SequentialQueue<P, T, E> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<P, T, E> fmt::Debug for SequentialQueue<P, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("SequentialQueue")
            .field("name", &self.shared.config.name)
            .field("pending", &state.items.len())
            .field("draining", &state.draining)
            .finish()
    }
}
