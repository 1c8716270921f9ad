//! Lifecycle controller for a single managed resource
//!
//! A [`Lifecycle`] pairs a [`StateMachine`] pinned to the nine lifecycle
//! states with a [`SequentialQueue`] whose processor is the transition
//! runner. Every public operation is turned into a request and queued, so
//! at most one operation callback runs at a time and requests are applied in
//! the order they were made.
//!
//! ## Runner protocol
//!
//! For each dequeued request `(operation, interim, target)`:
//!
//! 1. If the current state has no edge to `interim`, the request is a no-op
//!    and resolves successfully without calling the operation.
//! 2. Otherwise the machine moves to `interim` and the observer is told.
//! 3. The operation callback runs. If it fails, its error is handed to the
//!    caller and the state stays at `interim`.
//! 4. The machine moves to `target` (and the observer is told) only if the
//!    state is still `interim` and the edge `interim -> target` exists.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use parking_lot::RwLock;
use tracing::{debug, info, instrument, warn};

use super::config::LifecycleConfig;
use super::errors::{BoxError, LifecycleError, LifecycleResult};
use super::machine::{StateMachine, StateWait};
use super::state::{lifecycle_graph, LifecycleState, Operation};
use crate::sync::queue::{Completion, QueueMetricsSnapshot, SequentialQueue};

/// Future produced by an operation callback
pub type OperationFuture = BoxFuture<'static, Result<(), BoxError>>;

type OperationFn = Arc<dyn Fn() -> OperationFuture + Send + Sync>;

/// Transition observer; called with every state the lifecycle lands on
pub type Observer = Arc<dyn Fn(LifecycleState) + Send + Sync>;

/// Handle resolving with the outcome of one queued lifecycle operation
pub type OperationCompletion = Completion<(), LifecycleError>;

/// A resource whose four lifecycle operations can be driven by [`Lifecycle`]
///
/// Every method defaults to a no-op.
#[async_trait::async_trait]
pub trait ManagedResource: Send + Sync + 'static {
    async fn open(&self) -> Result<(), BoxError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), BoxError> {
        Ok(())
    }

    async fn suspend(&self) -> Result<(), BoxError> {
        Ok(())
    }

    async fn resume(&self) -> Result<(), BoxError> {
        Ok(())
    }
}

/// The operation callbacks of a lifecycle
///
/// Operations that are not registered behave as no-ops that always succeed.
#[derive(Clone, Default)]
pub struct Operations {
    open: Option<OperationFn>,
    close: Option<OperationFn>,
    suspend: Option<OperationFn>,
    resume: Option<OperationFn>,
}

impl Operations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drive the four operations through `resource`
    pub fn from_resource<R: ManagedResource>(resource: Arc<R>) -> Self {
        let open = Arc::clone(&resource);
        let close = Arc::clone(&resource);
        let suspend = Arc::clone(&resource);
        let resume = resource;

        Self::new()
            .on_open(move || {
                let resource = Arc::clone(&open);
                async move { resource.open().await }
            })
            .on_close(move || {
                let resource = Arc::clone(&close);
                async move { resource.close().await }
            })
            .on_suspend(move || {
                let resource = Arc::clone(&suspend);
                async move { resource.suspend().await }
            })
            .on_resume(move || {
                let resource = Arc::clone(&resume);
                async move { resource.resume().await }
            })
    }

    pub fn on_open<F, Fut, E>(self, callback: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        self.on(Operation::Open, callback)
    }

    pub fn on_close<F, Fut, E>(self, callback: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        self.on(Operation::Close, callback)
    }

    pub fn on_suspend<F, Fut, E>(self, callback: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        self.on(Operation::Suspend, callback)
    }

    pub fn on_resume<F, Fut, E>(self, callback: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        self.on(Operation::Resume, callback)
    }

    /// Register the callback for `operation`, replacing any previous one
    pub fn on<F, Fut, E>(mut self, operation: Operation, callback: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        let callback: OperationFn = Arc::new(move || {
            let pending = callback();
            async move { pending.await.map_err(Into::into) }.boxed()
        });
        *self.slot(operation) = Some(callback);
        self
    }

    /// Whether a callback is registered for `operation`
    pub fn has(&self, operation: Operation) -> bool {
        self.get(operation).is_some()
    }

    fn get(&self, operation: Operation) -> Option<&OperationFn> {
        match operation {
            Operation::Open => self.open.as_ref(),
            Operation::Close => self.close.as_ref(),
            Operation::Suspend => self.suspend.as_ref(),
            Operation::Resume => self.resume.as_ref(),
        }
    }

    fn slot(&mut self, operation: Operation) -> &mut Option<OperationFn> {
        match operation {
            Operation::Open => &mut self.open,
            Operation::Close => &mut self.close,
            Operation::Suspend => &mut self.suspend,
            Operation::Resume => &mut self.resume,
        }
    }
}

impl fmt::Debug for Operations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registered: Vec<_> =
            Operation::ALL.into_iter().filter(|op| self.has(*op)).map(|op| op.as_str()).collect();
        f.debug_struct("Operations").field("registered", &registered).finish()
    }
}

/// A queued request for the runner
#[derive(Debug, Clone, Copy)]
struct TransitionRequest {
    operation: Operation,
    interim: LifecycleState,
    target: LifecycleState,
}

struct LifecycleCore {
    name: String,
    machine: RwLock<Arc<StateMachine<LifecycleState>>>,
    operations: Operations,
    observer: RwLock<Option<Observer>>,
}

impl LifecycleCore {
    fn machine(&self) -> Arc<StateMachine<LifecycleState>> {
        Arc::clone(&self.machine.read())
    }

    fn notify(&self, state: LifecycleState) {
        let observer = self.observer.read().clone();
        if let Some(observer) = observer {
            observer(state);
        }
    }

    fn apply(
        &self,
        machine: &StateMachine<LifecycleState>,
        operation: Operation,
        to: LifecycleState,
    ) -> LifecycleResult<()> {
        let from = machine.transition(to)?;
        info!(lifecycle = %self.name, %operation, %from, %to, "Lifecycle transition");
        self.notify(to);
        Ok(())
    }

    async fn run(self: Arc<Self>, request: TransitionRequest) -> LifecycleResult<()> {
        let TransitionRequest { operation, interim, target } = request;

        let machine = self.machine();
        if !machine.allows(interim) {
            debug!(
                lifecycle = %self.name,
                %operation,
                state = %machine.state(),
                %interim,
                "No edge to interim state, skipping operation"
            );
            return Ok(());
        }

        self.apply(&machine, operation, interim)?;

        if let Some(callback) = self.operations.get(operation) {
            if let Err(source) = callback().await {
                warn!(
                    lifecycle = %self.name,
                    %operation,
                    state = %interim,
                    error = %source,
                    "Lifecycle operation failed"
                );
                return Err(LifecycleError::operation_failed(operation.as_str(), source));
            }
        }

        // A reset during the callback swaps the machine; always use the live one.
        let machine = self.machine();
        let current = machine.state();
        if current != interim || !machine.graph().allows(interim, target) {
            debug!(
                lifecycle = %self.name,
                %operation,
                state = %current,
                %target,
                "State moved on during operation, skipping final transition"
            );
            return Ok(());
        }

        self.apply(&machine, operation, target)
    }
}

/// Coordinates open/suspend/resume/close of one resource
///
/// Operations are queued at call time and applied strictly in call order,
/// whether or not the returned [`OperationCompletion`] is awaited. Clones
/// share the same state, queue and observer.
///
/// Calling an operation whose interim state is unreachable from the current
/// state is a silent no-op. In particular a failed operation leaves the
/// lifecycle parked at its interim state, and repeating it does nothing until
/// [`Lifecycle::reset`] is called.
#[derive(Clone)]
pub struct Lifecycle {
    core: Arc<LifecycleCore>,
    queue: SequentialQueue<TransitionRequest, (), LifecycleError>,
}

impl Lifecycle {
    /// Create a lifecycle with default configuration
    pub fn new(operations: Operations) -> Self {
        Self::build(LifecycleConfig::default(), operations)
    }

    /// Create a lifecycle with custom configuration
    pub fn with_config(config: LifecycleConfig, operations: Operations) -> LifecycleResult<Self> {
        config.validate()?;
        Ok(Self::build(config, operations))
    }

    /// Create a lifecycle that drives `resource`
    pub fn for_resource<R: ManagedResource>(resource: Arc<R>) -> Self {
        Self::new(Operations::from_resource(resource))
    }

    fn build(config: LifecycleConfig, operations: Operations) -> Self {
        let core = Arc::new(LifecycleCore {
            name: config.name.clone(),
            machine: RwLock::new(Arc::new(fresh_machine())),
            operations,
            observer: RwLock::new(None),
        });

        let runner = Arc::clone(&core);
        let queue = SequentialQueue::build(config.queue_config(), move |request| {
            Arc::clone(&runner).run(request)
        });

        Self { core, queue }
    }

    /// Queue `open`: `opening -> opened`
    #[instrument(skip(self), fields(lifecycle = %self.core.name))]
    pub fn open(&self) -> OperationCompletion {
        self.request(Operation::Open)
    }

    /// Queue `close`: `closing -> closed`
    #[instrument(skip(self), fields(lifecycle = %self.core.name))]
    pub fn close(&self) -> OperationCompletion {
        self.request(Operation::Close)
    }

    /// Queue `suspend`: `suspending -> suspended`
    #[instrument(skip(self), fields(lifecycle = %self.core.name))]
    pub fn suspend(&self) -> OperationCompletion {
        self.request(Operation::Suspend)
    }

    /// Queue `resume`: `resuming -> resumed`
    #[instrument(skip(self), fields(lifecycle = %self.core.name))]
    pub fn resume(&self) -> OperationCompletion {
        self.request(Operation::Resume)
    }

    /// Queue the callback named `operator` with caller-chosen states
    ///
    /// Fails with [`LifecycleError::UnknownOperator`] when `operator` is not
    /// one of `open`, `close`, `suspend` or `resume`. The queued request
    /// follows the same runner protocol as the named operations.
    #[instrument(skip(self), fields(lifecycle = %self.core.name))]
    pub fn transition(
        &self,
        operator: &str,
        interim: LifecycleState,
        target: LifecycleState,
    ) -> LifecycleResult<OperationCompletion> {
        let operation: Operation = operator.parse()?;
        Ok(self.enqueue(TransitionRequest { operation, interim, target }))
    }

    fn request(&self, operation: Operation) -> OperationCompletion {
        let (interim, target) = operation.states();
        self.enqueue(TransitionRequest { operation, interim, target })
    }

    fn enqueue(&self, request: TransitionRequest) -> OperationCompletion {
        let completion = self.queue.enqueue(request);
        debug!(
            operation = %request.operation,
            interim = %request.interim,
            target = %request.target,
            sequence = completion.sequence(),
            "Lifecycle operation queued"
        );
        completion
    }

    /// Wait until the lifecycle lands on `state`
    ///
    /// The wait belongs to the current state machine; a [`Lifecycle::reset`]
    /// ends it with [`LifecycleError::WaitAbandoned`].
    pub fn until(&self, state: LifecycleState) -> StateWait<LifecycleState> {
        self.core.machine().until(state)
    }

    /// Install the transition observer, replacing the previous one
    pub fn on<F>(&self, observer: F)
    where
        F: Fn(LifecycleState) + Send + Sync + 'static,
    {
        *self.core.observer.write() = Some(Arc::new(observer));
    }

    pub fn state(&self) -> LifecycleState {
        self.core.machine().state()
    }

    /// Whether the current state is one of `states`
    pub fn is(&self, states: &[LifecycleState]) -> bool {
        self.core.machine().is(states)
    }

    /// Whether the current state is none of `states`
    pub fn not(&self, states: &[LifecycleState]) -> bool {
        self.core.machine().not(states)
    }

    /// Whether an edge leads from the current state to `state`
    pub fn allows(&self, state: LifecycleState) -> bool {
        self.core.machine().allows(state)
    }

    /// Discard the state machine and start over at `init`
    ///
    /// Queued operations, the operation table and the observer are kept.
    /// Only call this while no operation is running.
    pub fn reset(&self) {
        let fresh = Arc::new(fresh_machine());
        let previous = std::mem::replace(&mut *self.core.machine.write(), fresh);
        info!(lifecycle = %self.core.name, from = %previous.state(), "Lifecycle reset to init");
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Metrics of the operation queue
    pub fn metrics(&self) -> QueueMetricsSnapshot {
        self.queue.metrics()
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("name", &self.core.name)
            .field("state", &self.state())
            .field("operations", &self.core.operations)
            .field("queued", &self.queue.len())
            .finish()
    }
}

fn fresh_machine() -> StateMachine<LifecycleState> {
    StateMachine::new_unchecked(lifecycle_graph(), LifecycleState::Init)
}
