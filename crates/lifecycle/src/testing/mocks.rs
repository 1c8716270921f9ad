//! Recording observers and scripted operation callbacks
//!
//! Provides mock objects for testing lifecycles.

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::FutureExt;
use parking_lot::Mutex;

use crate::lifecycle::{BoxError, Lifecycle, LifecycleState, ManagedResource, OperationFuture};

/// Observer that records every state it is told about
///
/// # Examples
///
/// ```no_run
/// use resource_lifecycle::testing::mocks::TransitionRecorder;
/// use resource_lifecycle::{Lifecycle, Operations};
///
/// # async fn demo() {
/// let lifecycle = Lifecycle::new(Operations::new());
/// let recorder = TransitionRecorder::new();
/// recorder.attach(&lifecycle);
///
/// lifecycle.open().await.unwrap();
/// assert_eq!(recorder.labels(), vec!["opening", "opened"]);
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct TransitionRecorder {
    states: Arc<Mutex<Vec<LifecycleState>>>,
}

impl TransitionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install this recorder as the observer of `lifecycle`
    pub fn attach(&self, lifecycle: &Lifecycle) {
        lifecycle.on(self.observer());
    }

    /// An observer callback feeding this recorder
    pub fn observer(&self) -> impl Fn(LifecycleState) + Send + Sync + 'static {
        let states = Arc::clone(&self.states);
        move |state| states.lock().push(state)
    }

    pub fn states(&self) -> Vec<LifecycleState> {
        self.states.lock().clone()
    }

    /// Recorded states as their lowercase labels
    pub fn labels(&self) -> Vec<&'static str> {
        self.states.lock().iter().map(LifecycleState::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.states.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.states.lock().clear();
    }
}

#[derive(Debug, Default)]
struct Script {
    calls: AtomicUsize,
    delay: Mutex<Option<Duration>>,
    failures: Mutex<VecDeque<String>>,
}

/// Operation callback with a call counter, an optional delay and queued
/// failures
///
/// Clones share the same counter and script.
#[derive(Debug, Clone, Default)]
pub struct ScriptedOperation {
    script: Arc<Script>,
}

impl ScriptedOperation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `delay` on every call before settling
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.script.delay.lock() = Some(delay);
        self
    }

    /// Make the next call that has no earlier scripted failure fail with
    /// `message`
    pub fn fail_next(&self, message: impl Into<String>) {
        self.script.failures.lock().push_back(message.into());
    }

    /// Number of times the callback has been invoked
    pub fn calls(&self) -> usize {
        self.script.calls.load(Ordering::SeqCst)
    }

    /// The callback to register in [`crate::Operations`]
    pub fn callback(&self) -> impl Fn() -> OperationFuture + Send + Sync + 'static {
        let operation = self.clone();
        move || {
            let operation = operation.clone();
            async move { operation.invoke().await }.boxed()
        }
    }

    /// Run one scripted call
    pub async fn invoke(&self) -> Result<(), BoxError> {
        self.script.calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.script.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.script.failures.lock().pop_front();
        match failure {
            Some(message) => Err(message.into()),
            None => Ok(()),
        }
    }
}

/// A [`ManagedResource`] whose four operations are scripted
#[derive(Debug, Clone, Default)]
pub struct ScriptedResource {
    pub open: ScriptedOperation,
    pub close: ScriptedOperation,
    pub suspend: ScriptedOperation,
    pub resume: ScriptedOperation,
}

impl ScriptedResource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total calls across all four operations
    pub fn total_calls(&self) -> usize {
        self.open.calls() + self.close.calls() + self.suspend.calls() + self.resume.calls()
    }
}

#[async_trait::async_trait]
impl ManagedResource for ScriptedResource {
    async fn open(&self) -> Result<(), BoxError> {
        self.open.invoke().await
    }

    async fn close(&self) -> Result<(), BoxError> {
        self.close.invoke().await
    }

    async fn suspend(&self) -> Result<(), BoxError> {
        self.suspend.invoke().await
    }

    async fn resume(&self) -> Result<(), BoxError> {
        self.resume.invoke().await
    }
}
