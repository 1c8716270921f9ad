//! Serialization primitives for asynchronous work
//!
//! ## Submodules
//!
//! - **`queue`**: FIFO queue that funnels payloads through a single async
//!   processor, one at a time, with a completion handle per payload
//!
//! The lifecycle controller routes every lifecycle operation through a
//! [`SequentialQueue`] so that callbacks never overlap.

pub mod queue;

pub use queue::{
    Completion, QueueConfig, QueueError, QueueMetrics, QueueMetricsSnapshot, QueueResult,
    SequentialQueue,
};
