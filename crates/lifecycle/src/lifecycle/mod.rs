//! Lifecycle coordination for async resources
//!
//! - **[`machine`]**: generic state machine with shared arrival waiters
//! - **[`state`]**: the nine lifecycle states, operation names and the fixed
//!   transition graph
//! - **[`manager`]**: the [`Lifecycle`] controller that serializes operations
//!   through a sequential queue
//! - **[`config`]**: controller configuration

pub mod config;
pub mod errors;
pub mod machine;
pub mod manager;
pub mod state;

// Re-export commonly used types and traits for convenience
pub use config::LifecycleConfig;
pub use errors::{BoxError, LifecycleError, LifecycleResult};
pub use machine::{StateLabel, StateMachine, StateWait, TransitionGraph};
pub use manager::{
    Lifecycle, ManagedResource, Observer, OperationCompletion, OperationFuture, Operations,
};
pub use state::{lifecycle_graph, LifecycleState, Operation};
