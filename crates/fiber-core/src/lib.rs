#![doc = r"Incremental fiber reconciler: diffs element trees against committed fibers and applies the changes to a pluggable host."]

pub mod collections;
pub mod component;
pub mod config;
pub mod context;
pub mod element;
pub mod error;
pub mod fiber;
pub mod host;
pub mod platform;
pub mod reconciler;
pub mod reflection;
pub mod runtime;
pub mod update_queue;
pub mod value;

mod begin_work;
mod child_reconciler;
mod class_component;
mod commit;
mod complete_work;
mod work_loop;

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

pub use component::{
    ClassInstance, ClassRef, Component, ComponentClass, ComponentHandle, Context, FunctionComponent, Instance, State,
    Updater,
};
pub use config::{ErrorSink, ReconcilerConfig};
pub use context::ContextStack;
pub use element::{
    Coroutine, CoroutineHandler, Element, ElementBuilder, ElementType, Key, Node, Props, Ref, RefTarget, Yield,
};
pub use error::{CapturedError, ConfigError, HookError, HookResult, InvariantError, ReconcileError};
pub use fiber::{EffectTag, Fiber, FiberId, FiberProps, FiberStore, FiberTag, FiberType, Priority, StateNode};
pub use host::HostConfig;
pub use platform::{Clock, ClockDeadline, Deadline, RuntimeScheduler, TIME_HEURISTIC_MS};
pub use reconciler::{FiberRoot, Reconciler, RootId};
pub use reflection::{is_fiber_mounted, mount_state, MountState};
pub use runtime::{DefaultScheduler, Runtime, RuntimeHandle};
pub use update_queue::{Callback, PartialState, SharedQueue, StateUpdater, UpdateQueue};
pub use value::{Object, Value};
