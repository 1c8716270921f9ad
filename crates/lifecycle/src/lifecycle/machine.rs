//! Generic finite-state machine with arrival waiters
//!
//! [`TransitionGraph`] is an immutable adjacency map from a state to the set
//! of states it may move to. [`StateMachine`] holds one current state of such
//! a graph, rejects transitions along missing edges, and lets any number of
//! tasks wait for the machine to land on a given state.
//!
//! Waiters are registered per target label, not per call: every
//! [`StateMachine::until`] issued for the same unreached state shares a single
//! release signal, fired by the next transition onto that state.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::{FutureExt, Shared};
use parking_lot::RwLock;
use tokio::sync::oneshot;
use tracing::debug;

use super::errors::{LifecycleError, LifecycleResult};

/// Label type usable as a state machine state
pub trait StateLabel:
    Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + Unpin + 'static
{
}

impl<T> StateLabel for T where
    T: Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + Unpin + 'static
{
}

/// Immutable directed graph of allowed transitions
///
/// States with no outgoing edges are terminal. A state mentioned only as a
/// target is still part of the graph.
#[derive(Debug, Clone)]
pub struct TransitionGraph<S: StateLabel> {
    edges: HashMap<S, HashSet<S>>,
}

impl<S: StateLabel> TransitionGraph<S> {
    /// Create an empty graph
    pub fn new() -> Self {
        Self { edges: HashMap::new() }
    }

    /// Add the edge `from -> to`
    pub fn edge(mut self, from: S, to: S) -> Self {
        self.edges.entry(to).or_default();
        self.edges.entry(from).or_default().insert(to);
        self
    }

    /// Add an edge from `from` to every state in `targets`
    pub fn edges(self, from: S, targets: impl IntoIterator<Item = S>) -> Self {
        let mut graph = self;
        graph.edges.entry(from).or_default();
        for to in targets {
            graph = graph.edge(from, to);
        }
        graph
    }

    pub fn allows(&self, from: S, to: S) -> bool {
        self.edges.get(&from).is_some_and(|targets| targets.contains(&to))
    }

    /// States reachable from `from` in one step
    pub fn targets(&self, from: S) -> impl Iterator<Item = S> + '_ {
        self.edges.get(&from).into_iter().flat_map(|targets| targets.iter().copied())
    }

    pub fn contains(&self, state: S) -> bool {
        self.edges.contains_key(&state)
    }

    /// Whether `state` belongs to the graph and has no outgoing edges
    pub fn is_terminal(&self, state: S) -> bool {
        self.edges.get(&state).is_some_and(HashSet::is_empty)
    }

    pub fn states(&self) -> impl Iterator<Item = S> + '_ {
        self.edges.keys().copied()
    }
}

impl<S: StateLabel> Default for TransitionGraph<S> {
    fn default() -> Self {
        Self::new()
    }
}

struct Waiter {
    release: oneshot::Sender<()>,
    arrival: Shared<oneshot::Receiver<()>>,
}

impl Waiter {
    fn new() -> Self {
        let (release, arrival) = oneshot::channel();
        Self { release, arrival: arrival.shared() }
    }
}

struct MachineState<S> {
    current: S,
    waiters: HashMap<S, Waiter>,
}

/// Current state of a [`TransitionGraph`] plus the waiters for unreached states
///
/// Reads never observe a half-applied transition. Dropping the machine
/// resolves every outstanding [`StateWait`] with
/// [`LifecycleError::WaitAbandoned`].
pub struct StateMachine<S: StateLabel> {
    graph: Arc<TransitionGraph<S>>,
    inner: RwLock<MachineState<S>>,
}

impl<S: StateLabel> StateMachine<S> {
    /// Create a machine positioned at `initial`
    ///
    /// Fails with [`LifecycleError::UnknownState`] when `initial` is not part
    /// of `graph`.
    pub fn new(graph: impl Into<Arc<TransitionGraph<S>>>, initial: S) -> LifecycleResult<Self> {
        let graph = graph.into();
        if !graph.contains(initial) {
            return Err(LifecycleError::UnknownState(initial.to_string()));
        }

        Ok(Self::new_unchecked(graph, initial))
    }

    /// Caller guarantees `initial` is part of `graph`
    pub(crate) fn new_unchecked(graph: Arc<TransitionGraph<S>>, initial: S) -> Self {
        Self {
            graph,
            inner: RwLock::new(MachineState { current: initial, waiters: HashMap::new() }),
        }
    }

    pub fn state(&self) -> S {
        self.inner.read().current
    }

    /// Whether an edge leads from the current state to `target`
    pub fn allows(&self, target: S) -> bool {
        self.graph.allows(self.state(), target)
    }

    /// Whether the current state is one of `states`
    pub fn is(&self, states: &[S]) -> bool {
        states.contains(&self.state())
    }

    /// Whether the current state is none of `states`
    pub fn not(&self, states: &[S]) -> bool {
        !self.is(states)
    }

    pub fn graph(&self) -> &Arc<TransitionGraph<S>> {
        &self.graph
    }

    /// Number of target states that currently have a registered waiter
    pub fn pending_waiters(&self) -> usize {
        self.inner.read().waiters.len()
    }

    /// Move to `target`, returning the state that was left
    ///
    /// Releases every waiter registered for `target`. On a missing edge the
    /// state is left untouched and [`LifecycleError::InvalidTransition`] is
    /// returned.
    pub fn transition(&self, target: S) -> LifecycleResult<S> {
        let mut inner = self.inner.write();
        let from = inner.current;

        if !self.graph.allows(from, target) {
            return Err(LifecycleError::invalid_transition(from, target));
        }

        inner.current = target;
        if let Some(waiter) = inner.waiters.remove(&target) {
            // Every wait may already be gone; nothing to release then.
            let _ = waiter.release.send(());
        }

        debug!(%from, to = %target, "State machine transitioned");
        Ok(from)
    }

    /// Wait until the machine lands on `target`
    ///
    /// Resolves immediately when `target` is the current state at call time.
    /// Otherwise the returned future shares the waiter for `target`, creating
    /// it if needed, and resolves on the next transition onto `target`.
    pub fn until(&self, target: S) -> StateWait<S> {
        let mut inner = self.inner.write();
        if inner.current == target {
            return StateWait { state: target, arrival: None };
        }

        let waiter = inner.waiters.entry(target).or_insert_with(Waiter::new);
        StateWait { state: target, arrival: Some(waiter.arrival.clone()) }
    }
}

impl<S: StateLabel> fmt::Debug for StateMachine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("StateMachine")
            .field("current", &inner.current)
            .field("waiting_for", &inner.waiters.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Future returned by [`StateMachine::until`]
#[must_use = "a StateWait does nothing unless awaited"]
pub struct StateWait<S> {
    state: S,
    arrival: Option<Shared<oneshot::Receiver<()>>>,
}

impl<S: StateLabel> StateWait<S> {
    /// State this wait is for
    pub fn state(&self) -> S {
        self.state
    }

    /// Whether the state had already been reached when the wait was created
    pub fn is_immediate(&self) -> bool {
        self.arrival.is_none()
    }
}

impl<S: StateLabel> Future for StateWait<S> {
    type Output = LifecycleResult<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let state = self.state;
        let Some(arrival) = self.arrival.as_mut() else {
            return Poll::Ready(Ok(()));
        };

        match arrival.poll_unpin(cx) {
            Poll::Ready(Ok(())) => Poll::Ready(Ok(())),
            Poll::Ready(Err(_)) => {
                Poll::Ready(Err(LifecycleError::WaitAbandoned { state: state.to_string() }))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<S: StateLabel> fmt::Debug for StateWait<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateWait")
            .field("state", &self.state)
            .field("immediate", &self.is_immediate())
            .finish()
    }
}
