//! Integration tests for the lifecycle controller
//!
//! Drives complete open/suspend/resume/close scenarios through the public
//! API: no-op de-duplication, failure parking and reset, observer ordering,
//! and requests fired without awaiting.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use resource_lifecycle::testing::{
    timeout_ok, ScriptedOperation, ScriptedResource, TransitionRecorder,
};
use resource_lifecycle::{
    assert_eventually_async, BoxError, Lifecycle, LifecycleConfig, LifecycleError,
    LifecycleResult, LifecycleState, Operations, QueueError,
};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Lifecycle with a scripted callback for every operation
struct Harness {
    lifecycle: Lifecycle,
    open: ScriptedOperation,
    close: ScriptedOperation,
    suspend: ScriptedOperation,
    resume: ScriptedOperation,
    recorder: TransitionRecorder,
}

impl Harness {
    fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    fn with_delay(delay: Duration) -> Self {
        init_tracing();

        let open = ScriptedOperation::new().with_delay(delay);
        let close = ScriptedOperation::new().with_delay(delay);
        let suspend = ScriptedOperation::new().with_delay(delay);
        let resume = ScriptedOperation::new().with_delay(delay);

        let lifecycle = Lifecycle::new(
            Operations::new()
                .on_open(open.callback())
                .on_close(close.callback())
                .on_suspend(suspend.callback())
                .on_resume(resume.callback()),
        );
        let recorder = TransitionRecorder::new();
        recorder.attach(&lifecycle);

        Self { lifecycle, open, close, suspend, resume, recorder }
    }
}

/// Validates the basic open path.
///
/// # Test Steps
/// 1. Create a lifecycle and check it starts at `init`
/// 2. Await `open()`
/// 3. Verify `init -> opening -> opened` and a single callback invocation
#[tokio::test]
async fn test_open_drives_init_to_opened() -> LifecycleResult<()> {
    let harness = Harness::new();
    assert_eq!(harness.lifecycle.state(), LifecycleState::Init);

    harness.lifecycle.open().await?;

    assert_eq!(harness.lifecycle.state(), LifecycleState::Opened);
    assert_eq!(harness.recorder.labels(), vec!["opening", "opened"]);
    assert_eq!(harness.open.calls(), 1);
    Ok(())
}

/// Ensures a second `open()` issued before the first completes is a no-op.
#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_opens_invoke_callback_once() -> LifecycleResult<()> {
    let harness = Harness::with_delay(Duration::from_millis(10));

    let first = harness.lifecycle.open();
    let second = harness.lifecycle.open();
    first.await?;
    second.await?;

    assert_eq!(harness.open.calls(), 1);
    assert_eq!(harness.lifecycle.state(), LifecycleState::Opened);
    assert_eq!(harness.recorder.labels(), vec!["opening", "opened"]);
    Ok(())
}

/// Operations whose interim state is unreachable resolve without effect.
#[tokio::test]
async fn test_out_of_order_operations_are_no_ops() -> LifecycleResult<()> {
    let harness = Harness::new();

    harness.lifecycle.suspend().await?;
    assert_eq!(harness.lifecycle.state(), LifecycleState::Init);

    harness.lifecycle.open().await?;
    harness.lifecycle.resume().await?;
    assert_eq!(harness.lifecycle.state(), LifecycleState::Opened);

    assert_eq!(harness.suspend.calls(), 0);
    assert_eq!(harness.resume.calls(), 0);
    assert_eq!(harness.recorder.labels(), vec!["opening", "opened"]);
    Ok(())
}

/// Validates observer order across two awaited operations.
#[tokio::test]
async fn test_observer_records_open_then_suspend() -> LifecycleResult<()> {
    let harness = Harness::new();

    harness.lifecycle.open().await?;
    harness.lifecycle.suspend().await?;

    assert_eq!(harness.recorder.labels(), vec!["opening", "opened", "suspending", "suspended"]);
    Ok(())
}

/// Validates that requests fired without awaiting are applied in call order.
///
/// # Test Steps
/// 1. Call `open()` and `close()` back to back, dropping both handles
/// 2. Wait for `closed`
/// 3. Verify the observer saw the full sequence
#[tokio::test(flavor = "multi_thread")]
async fn test_open_then_close_without_awaiting() {
    let harness = Harness::with_delay(Duration::from_millis(5));

    drop(harness.lifecycle.open());
    drop(harness.lifecycle.close());

    let recorder = harness.recorder.clone();
    assert_eventually_async!(Duration::from_secs(2), async { recorder.len() == 4 });

    assert_eq!(harness.recorder.labels(), vec!["opening", "opened", "closing", "closed"]);
    assert_eq!(harness.lifecycle.state(), LifecycleState::Closed);
}

/// Validates failure parking, the no-op retry, and recovery through reset.
///
/// # Test Steps
/// 1. Script `open` to fail with "boom" and await `open()`
/// 2. Verify the error is "boom" and the state is parked at `opening`
/// 3. Call `open()` again: no callback, still `opening`
/// 4. `reset()` then `open()`: callback runs and the state reaches `opened`
#[tokio::test]
async fn test_failed_open_parks_until_reset() -> LifecycleResult<()> {
    let harness = Harness::new();
    harness.open.fail_next("boom");

    let err = harness.lifecycle.open().await.unwrap_err();
    assert_eq!(err.to_string(), "boom");
    assert!(matches!(
        &err,
        LifecycleError::OperationFailed { operation, .. } if operation == "open"
    ));
    assert_eq!(harness.lifecycle.state(), LifecycleState::Opening);

    harness.lifecycle.open().await?;
    assert_eq!(harness.open.calls(), 1);
    assert_eq!(harness.lifecycle.state(), LifecycleState::Opening);

    harness.lifecycle.reset();
    assert_eq!(harness.lifecycle.state(), LifecycleState::Init);

    harness.lifecycle.open().await?;
    assert_eq!(harness.open.calls(), 2);
    assert_eq!(harness.lifecycle.state(), LifecycleState::Opened);
    assert_eq!(harness.recorder.labels(), vec!["opening", "opening", "opened"]);
    Ok(())
}

/// Ensures a failure does not hold up operations queued behind it.
#[tokio::test]
async fn test_failure_does_not_block_later_operations() -> LifecycleResult<()> {
    let harness = Harness::new();
    harness.lifecycle.open().await?;
    harness.suspend.fail_next("disk full");

    let suspend = harness.lifecycle.suspend();
    let close = harness.lifecycle.close();

    assert_eq!(suspend.await.unwrap_err().to_string(), "disk full");
    close.await?;

    assert_eq!(harness.lifecycle.state(), LifecycleState::Closed);
    assert_eq!(harness.close.calls(), 1);
    Ok(())
}

/// Validates that `close()` reaches `closed` from every state that allows it.
#[tokio::test]
async fn test_close_from_each_open_state() -> LifecycleResult<()> {
    // opened
    let harness = Harness::new();
    harness.lifecycle.open().await?;
    harness.lifecycle.close().await?;
    assert_eq!(harness.lifecycle.state(), LifecycleState::Closed);

    // suspending: parked there by a failed suspend
    let harness = Harness::new();
    harness.lifecycle.open().await?;
    harness.suspend.fail_next("stalled");
    assert!(harness.lifecycle.suspend().await.is_err());
    assert_eq!(harness.lifecycle.state(), LifecycleState::Suspending);
    harness.lifecycle.close().await?;
    assert_eq!(harness.lifecycle.state(), LifecycleState::Closed);

    // suspended
    let harness = Harness::new();
    harness.lifecycle.open().await?;
    harness.lifecycle.suspend().await?;
    harness.lifecycle.close().await?;
    assert_eq!(harness.lifecycle.state(), LifecycleState::Closed);

    // resuming: close requested while resume is still running
    let harness = Harness::new();
    harness.lifecycle.open().await?;
    harness.lifecycle.suspend().await?;
    let resuming = harness.lifecycle.until(LifecycleState::Resuming);
    let resume = harness.lifecycle.resume();
    let close = harness.lifecycle.close();
    resuming.await?;
    resume.await?;
    close.await?;
    assert_eq!(harness.lifecycle.state(), LifecycleState::Closed);

    // resumed
    let harness = Harness::new();
    harness.lifecycle.open().await?;
    harness.lifecycle.suspend().await?;
    harness.lifecycle.resume().await?;
    harness.lifecycle.close().await?;
    assert_eq!(harness.lifecycle.state(), LifecycleState::Closed);
    assert_eq!(
        harness.recorder.labels(),
        vec![
            "opening",
            "opened",
            "suspending",
            "suspended",
            "resuming",
            "resumed",
            "closing",
            "closed"
        ]
    );
    Ok(())
}

/// Operations after `closed` are no-ops.
#[tokio::test]
async fn test_closed_is_terminal() -> LifecycleResult<()> {
    let harness = Harness::new();
    harness.lifecycle.open().await?;
    harness.lifecycle.close().await?;

    harness.lifecycle.open().await?;
    harness.lifecycle.close().await?;

    assert_eq!(harness.open.calls(), 1);
    assert_eq!(harness.close.calls(), 1);
    assert!(harness.lifecycle.is(&[LifecycleState::Closed]));
    assert!(harness.lifecycle.not(&[LifecycleState::Opened, LifecycleState::Init]));
    Ok(())
}

/// Validates the generic transition entry point.
///
/// # Test Steps
/// 1. Unknown operator names are rejected before anything is queued
/// 2. A named operator with its usual states behaves like the shortcut
/// 3. A target with no edge from the interim state leaves it parked there
#[tokio::test]
async fn test_generic_transition() -> LifecycleResult<()> {
    let harness = Harness::new();

    let err = harness
        .lifecycle
        .transition("restart", LifecycleState::Opening, LifecycleState::Opened)
        .unwrap_err();
    assert!(matches!(err, LifecycleError::UnknownOperator(ref name) if name == "restart"));

    // Interim unreachable from init: silent no-op.
    let lifecycle = &harness.lifecycle;
    lifecycle.transition("open", LifecycleState::Suspending, LifecycleState::Suspended)?.await?;
    assert_eq!(harness.open.calls(), 0);
    assert_eq!(harness.lifecycle.state(), LifecycleState::Init);

    lifecycle.transition("open", LifecycleState::Opening, LifecycleState::Closed)?.await?;
    assert_eq!(harness.open.calls(), 1);
    assert_eq!(harness.lifecycle.state(), LifecycleState::Opening);

    lifecycle.reset();
    lifecycle.transition("open", LifecycleState::Opening, LifecycleState::Opened)?.await?;
    assert_eq!(lifecycle.state(), LifecycleState::Opened);
    Ok(())
}

/// Validates that callbacks never overlap, even with many queued requests.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_callbacks_never_overlap() -> LifecycleResult<()> {
    init_tracing();
    let active = Arc::new(AtomicUsize::new(0));
    let overlaps = Arc::new(AtomicUsize::new(0));

    let guarded = {
        let active = Arc::clone(&active);
        let overlaps = Arc::clone(&overlaps);
        move || {
            let active = Arc::clone(&active);
            let overlaps = Arc::clone(&overlaps);
            async move {
                if active.fetch_add(1, Ordering::SeqCst) > 0 {
                    overlaps.fetch_add(1, Ordering::SeqCst);
                }
                tokio::time::sleep(Duration::from_millis(2)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, BoxError>(())
            }
        }
    };

    let lifecycle = Lifecycle::new(
        Operations::new()
            .on_open(guarded.clone())
            .on_suspend(guarded.clone())
            .on_resume(guarded.clone())
            .on_close(guarded),
    );

    let mut handles = vec![lifecycle.open()];
    for _ in 0..5 {
        handles.push(lifecycle.suspend());
        handles.push(lifecycle.resume());
    }
    handles.push(lifecycle.close());

    for handle in handles {
        handle.await?;
    }

    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    assert_eq!(lifecycle.state(), LifecycleState::Closed);
    assert_eq!(lifecycle.metrics().total_completed, 12);
    Ok(())
}

/// A timed-out wait is only a wait: the operation still finishes afterwards.
#[tokio::test(flavor = "multi_thread")]
async fn test_wait_timeout_does_not_cancel_operation() -> LifecycleResult<()> {
    let harness = Harness::with_delay(Duration::from_millis(100));

    let open = harness.lifecycle.open();
    let opened = harness.lifecycle.until(LifecycleState::Opened);
    let early = timeout_ok(Duration::from_millis(10), opened).await;
    assert!(early.is_err());

    timeout_ok(Duration::from_secs(2), harness.lifecycle.until(LifecycleState::Opened))
        .await
        .expect("lifecycle eventually opens")?;
    open.await?;
    assert_eq!(harness.open.calls(), 1);
    Ok(())
}

/// Validates driving a `ManagedResource` and sharing state across clones.
#[tokio::test]
async fn test_for_resource_and_clones() -> LifecycleResult<()> {
    init_tracing();
    let resource = Arc::new(ScriptedResource::new());
    let lifecycle = Lifecycle::for_resource(Arc::clone(&resource));
    let other_handle = lifecycle.clone();

    lifecycle.open().await?;
    other_handle.suspend().await?;
    lifecycle.resume().await?;
    other_handle.close().await?;

    assert_eq!(lifecycle.state(), LifecycleState::Closed);
    assert_eq!(resource.open.calls(), 1);
    assert_eq!(resource.suspend.calls(), 1);
    assert_eq!(resource.resume.calls(), 1);
    assert_eq!(resource.close.calls(), 1);
    assert_eq!(resource.total_calls(), 4);
    Ok(())
}

/// Ensures a lifecycle built from TOML configuration uses its name.
#[tokio::test]
async fn test_lifecycle_from_toml_config() -> LifecycleResult<()> {
    init_tracing();
    let config = LifecycleConfig::from_toml_str(
        r#"
        name = "replica-link"
        "#,
    )?;

    let lifecycle = Lifecycle::with_config(config, Operations::new())?;
    assert_eq!(lifecycle.name(), "replica-link");

    lifecycle.open().await?;
    lifecycle.close().await?;

    let metrics = lifecycle.metrics();
    assert_eq!(metrics.total_enqueued, 2);
    assert_eq!(metrics.total_completed, 2);
    assert!(!lifecycle.allows(LifecycleState::Opening));
    Ok(())
}

/// Callback errors of any `Into<BoxError>` type reach the caller unchanged.
#[tokio::test]
async fn test_anyhow_callback_error_is_propagated() -> anyhow::Result<()> {
    init_tracing();
    let lifecycle = Lifecycle::new(
        Operations::new()
            .on_open(|| async { Ok::<_, anyhow::Error>(()) })
            .on_suspend(|| async { Err(anyhow::anyhow!("handshake rejected by peer")) }),
    );

    lifecycle.open().await?;
    let err = lifecycle.suspend().await.expect_err("suspend must fail");

    assert_eq!(err.to_string(), "handshake rejected by peer");
    let source = err.into_operation_error().map_err(|other| anyhow::anyhow!("{other}"))?;
    assert_eq!(source.to_string(), "handshake rejected by peer");
    assert_eq!(lifecycle.state(), LifecycleState::Suspending);
    Ok(())
}

/// Ensures a burst of requests fired without awaiting is accepted in full.
///
/// # Test Steps
/// 1. Open the lifecycle
/// 2. Fire 1100 `close()` calls without awaiting any of them
/// 3. Verify every request settles `Ok` and the close callback ran once
#[tokio::test(flavor = "multi_thread")]
async fn test_request_burst_is_never_rejected() -> LifecycleResult<()> {
    let harness = Harness::new();
    harness.lifecycle.open().await?;

    let closes: Vec<_> = (0..1_100).map(|_| harness.lifecycle.close()).collect();
    for close in closes {
        close.await?;
    }

    assert_eq!(harness.close.calls(), 1);
    assert_eq!(harness.lifecycle.state(), LifecycleState::Closed);
    assert_eq!(harness.lifecycle.metrics().capacity_rejections, 0);
    Ok(())
}

/// Validates that the controller keeps working after the runtime that was
/// running an operation shuts down.
///
/// # Test Steps
/// 1. On a first runtime, start an `open()` whose callback stalls
/// 2. Shut that runtime down mid-callback
/// 3. Verify the stalled request resolves as abandoned and the state is parked
/// 4. `reset()` and `open()` again on a second runtime
/// 5. Verify the second open completes promptly
#[test]
fn test_operations_resume_after_runtime_shutdown() -> LifecycleResult<()> {
    init_tracing();
    let attempts = Arc::new(AtomicUsize::new(0));
    let lifecycle = Lifecycle::new(Operations::new().on_open({
        let attempts = Arc::clone(&attempts);
        move || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                }
                Ok::<_, BoxError>(())
            }
        }
    }));

    let first = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("first runtime");
    let stalled = first.block_on(async {
        let stalled = lifecycle.open();
        tokio::time::sleep(Duration::from_millis(20)).await;
        stalled
    });
    drop(first);
    assert_eq!(lifecycle.state(), LifecycleState::Opening);

    let second = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("second runtime");
    second.block_on(async {
        assert!(matches!(stalled.await, Err(LifecycleError::Queue(QueueError::Abandoned { .. }))));

        lifecycle.reset();
        timeout_ok(Duration::from_secs(1), lifecycle.open())
            .await
            .expect("operation queue restarted")?;

        assert_eq!(lifecycle.state(), LifecycleState::Opened);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        Ok(())
    })
}
