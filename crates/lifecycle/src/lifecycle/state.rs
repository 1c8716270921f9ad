//! Lifecycle state labels, operation names and the fixed transition graph
//!
//! ```text
//! init       -> opening
//! opening    -> opened
//! opened     -> suspending, closing
//! suspending -> suspended, closing
//! suspended  -> resuming, closing
//! resuming   -> resumed
//! resumed    -> suspending, closing
//! closing    -> closed
//! closed     -> (terminal)
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::errors::LifecycleError;
use super::machine::TransitionGraph;

/// The nine states of a managed resource
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    #[default]
    Init,
    Opening,
    Opened,
    Suspending,
    Suspended,
    Resuming,
    Resumed,
    Closing,
    Closed,
}

impl LifecycleState {
    pub const ALL: [LifecycleState; 9] = [
        Self::Init,
        Self::Opening,
        Self::Opened,
        Self::Suspending,
        Self::Suspended,
        Self::Resuming,
        Self::Resumed,
        Self::Closing,
        Self::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Opening => "opening",
            Self::Opened => "opened",
            Self::Suspending => "suspending",
            Self::Suspended => "suspended",
            Self::Resuming => "resuming",
            Self::Resumed => "resumed",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }

    /// Interim state entered while an operation callback runs
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Opening | Self::Suspending | Self::Resuming | Self::Closing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleState {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| LifecycleError::UnknownState(s.to_string()))
    }
}

/// The four operation callbacks a lifecycle can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Open,
    Close,
    Suspend,
    Resume,
}

impl Operation {
    pub const ALL: [Operation; 4] = [Self::Open, Self::Close, Self::Suspend, Self::Resume];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Close => "close",
            Self::Suspend => "suspend",
            Self::Resume => "resume",
        }
    }

    /// Default `(interim, final)` states for this operation
    pub fn states(&self) -> (LifecycleState, LifecycleState) {
        match self {
            Self::Open => (LifecycleState::Opening, LifecycleState::Opened),
            Self::Close => (LifecycleState::Closing, LifecycleState::Closed),
            Self::Suspend => (LifecycleState::Suspending, LifecycleState::Suspended),
            Self::Resume => (LifecycleState::Resuming, LifecycleState::Resumed),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|operation| operation.as_str() == s)
            .ok_or_else(|| LifecycleError::UnknownOperator(s.to_string()))
    }
}

static LIFECYCLE_GRAPH: Lazy<Arc<TransitionGraph<LifecycleState>>> = Lazy::new(|| {
    use LifecycleState::*;

    Arc::new(
        TransitionGraph::new()
            .edge(Init, Opening)
            .edge(Opening, Opened)
            .edges(Opened, [Suspending, Closing])
            .edges(Suspending, [Suspended, Closing])
            .edges(Suspended, [Resuming, Closing])
            .edge(Resuming, Resumed)
            .edges(Resumed, [Suspending, Closing])
            .edge(Closing, Closed),
    )
});

/// The shared lifecycle transition graph
pub fn lifecycle_graph() -> Arc<TransitionGraph<LifecycleState>> {
    Arc::clone(&LIFECYCLE_GRAPH)
}
