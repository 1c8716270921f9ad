// Sequential work queue
// One processor, one item at a time, strict FIFO settlement

mod core;
mod errors;
pub mod metrics;
mod types;

pub use self::core::SequentialQueue;
pub use self::errors::{QueueError, QueueResult};
pub use self::metrics::{QueueMetrics, QueueMetricsSnapshot};
pub use self::types::{Completion, QueueConfig};
