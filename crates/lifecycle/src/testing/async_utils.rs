//! Async testing utilities
//!
//! Provides async-specific test helpers and assertions.

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

use std::future::Future;
use std::time::Duration;

/// Assert that an async condition becomes true within a timeout
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
///
/// use resource_lifecycle::{LifecycleState, Lifecycle, Operations};
///
/// #[tokio::test(flavor = "multi_thread")]
/// async fn test_eventually_open() {
///     let lifecycle = Lifecycle::new(Operations::new());
///     let _ = lifecycle.open();
///
///     resource_lifecycle::assert_eventually_async!(Duration::from_secs(1), async {
///         lifecycle.is(&[LifecycleState::Opened])
///     });
/// }
/// ```
#[macro_export]
macro_rules! assert_eventually_async {
    ($timeout:expr, $fut:expr) => {{
        let timeout_duration = $timeout;
        let result = tokio::time::timeout(timeout_duration, async {
            loop {
                if $fut.await {
                    break;
                }
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        })
        .await;

        assert!(result.is_ok(), "Condition did not become true within {:?}", timeout_duration);
    }};
}

/// Wait for a future to complete with a timeout, returning a Result
///
/// An elapsed timeout only stops the wait; whatever the future was waiting on
/// keeps going.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
///
/// use resource_lifecycle::testing::async_utils::timeout_ok;
/// use resource_lifecycle::{Lifecycle, LifecycleState, Operations};
///
/// #[tokio::test]
/// async fn test_wait_for_open() {
///     let lifecycle = Lifecycle::new(Operations::new());
///     let _ = lifecycle.open();
///
///     let arrived = timeout_ok(Duration::from_secs(1), lifecycle.until(LifecycleState::Opened))
///         .await;
///     assert!(arrived.is_ok());
/// }
/// ```
pub async fn timeout_ok<F, T>(duration: Duration, fut: F) -> Result<T, tokio::time::error::Elapsed>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, fut).await
}
