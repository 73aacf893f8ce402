use std::error::Error;
use std::rc::Rc;

use thiserror::Error;

use crate::fiber::{FiberId, FiberTag};
use crate::reconciler::RootId;

/// Error type returned by user supplied hooks (render, lifecycle, callbacks).
pub type HookError = Box<dyn Error>;

pub type HookResult<T = ()> = Result<T, HookError>;

/// Contract violations in user supplied component definitions.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{component}.state: must be set to an object or null")]
    InvalidState { component: Rc<str> },
    #[error(
        "{component}.child_context(): child_context_types must be defined in order to use child_context()"
    )]
    MissingChildContextTypes { component: Rc<str> },
    #[error("{component}.child_context(): key \"{key}\" is not defined in child_context_types")]
    UndeclaredChildContextKey { component: Rc<str>, key: Rc<str> },
    #[error("there must be pending props for an initial mount of {component}")]
    MissingMountProps { component: Rc<str> },
    #[error("element type is invalid: {0}")]
    UnknownElementType(String),
}

/// Internal consistency failures. Seeing one of these is a reconciler defect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantError {
    #[error("there should always be pending or memoized props")]
    MissingProps,
    #[error("fiber {fiber:?} with tag {tag:?} does not carry the expected type")]
    TypeMismatch { fiber: FiberId, tag: FiberTag },
    #[error("unable to find node on an unmounted component")]
    UnmountedComponent,
    #[error("reflection did not terminate after switching to the alternate tree")]
    ReflectionLoop,
    #[error("a text update was scheduled for a fiber that was never committed")]
    TextUpdateWithoutCurrent,
    #[error("fiber tag {0:?} should not have side effects")]
    UnexpectedEffect(FiberTag),
    #[error("root {0:?} does not exist")]
    UnknownRoot(RootId),
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Invariant(#[from] InvariantError),
    #[error("{component} failed while rendering")]
    Render {
        component: Rc<str>,
        #[source]
        source: HookError,
    },
    #[error("work was requested while the reconciler was already performing work")]
    Reentrant,
}

/// A lifecycle, ref or callback failure trapped during commit.
///
/// Commit always runs to completion; every trapped failure is handed to the
/// configured error sink once the owning fiber has been processed.
#[derive(Debug)]
pub struct CapturedError {
    pub fiber: FiberId,
    pub component: Option<Rc<str>>,
    pub error: HookError,
    pub during_unmount: bool,
}
