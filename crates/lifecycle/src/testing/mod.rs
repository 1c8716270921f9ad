//! Testing utilities and helpers
//!
//! Compiled for the crate's own tests and, for downstream crates, behind the
//! `test-utils` feature.
//!
//! - **[`async_utils`]**: async assertions and timeout helpers
//! - **[`mocks`]**: recording observers and scripted operation callbacks
//!
//! ## Usage
//!
//! ```rust,no_run
//! use resource_lifecycle::testing::{ScriptedOperation, TransitionRecorder};
//! use resource_lifecycle::{Lifecycle, Operations};
//!
//! # async fn demo() {
//! let open = ScriptedOperation::new();
//! open.fail_next("boom");
//!
//! let lifecycle = Lifecycle::new(Operations::new().on_open(open.callback()));
//! let recorder = TransitionRecorder::new();
//! recorder.attach(&lifecycle);
//!
//! assert!(lifecycle.open().await.is_err());
//! assert_eq!(recorder.labels(), vec!["opening"]);
//! # }
//! ```

pub mod async_utils;
pub mod mocks;

// Note: Macros exported with #[macro_export] are available at crate root
pub use async_utils::timeout_ok;
pub use mocks::{ScriptedOperation, ScriptedResource, TransitionRecorder};
