//! Serialized lifecycle orchestration for async resources.
//!
//! A [`Lifecycle`] drives one resource (a connection, a file handle, a
//! server) through `init -> opening -> opened -> ... -> closed` by running
//! user-supplied `open`, `close`, `suspend` and `resume` callbacks. Callers
//! may fire operations concurrently and without awaiting them; the controller
//! queues every request and runs them one at a time, in call order.
//!
//! # Building blocks
//!
//! - [`sync::queue`]: [`SequentialQueue`], a FIFO queue with one async
//!   processor and a completion handle per item
//! - [`lifecycle::machine`]: [`StateMachine`], a generic state machine over a
//!   fixed [`TransitionGraph`] with shared "wait until" handles
//! - [`lifecycle::manager`]: [`Lifecycle`], which combines the two
//!
//! # Example
//!
//! ```no_run
//! use resource_lifecycle::{BoxError, Lifecycle, LifecycleState, Operations};
//!
//! # async fn demo() -> Result<(), resource_lifecycle::LifecycleError> {
//! let lifecycle = Lifecycle::new(
//!     Operations::new()
//!         .on_open(|| async { Ok::<_, BoxError>(()) })
//!         .on_close(|| async { Ok::<_, BoxError>(()) }),
//! );
//!
//! lifecycle.on(|state| println!("now {state}"));
//! let opened = lifecycle.open();
//! let closed = lifecycle.close();
//!
//! opened.await?;
//! closed.await?;
//! assert_eq!(lifecycle.state(), LifecycleState::Closed);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod error;
pub mod lifecycle;
pub mod sync;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "test-utils", test))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
pub use error::{CommonError, CommonResult};
pub use lifecycle::{
    lifecycle_graph, BoxError, Lifecycle, LifecycleConfig, LifecycleError, LifecycleResult,
    LifecycleState, ManagedResource, Observer, Operation, OperationCompletion, Operations,
    StateLabel, StateMachine, StateWait, TransitionGraph,
};
pub use sync::queue::{
    Completion, QueueConfig, QueueError, QueueMetrics, QueueMetricsSnapshot, QueueResult,
    SequentialQueue,
};
