use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::fiber::{FiberId, Priority};
use crate::platform::RuntimeScheduler;
use crate::update_queue::{Callback, PartialState};
use crate::value::Object;

pub(crate) enum UpdateKind {
    SetState(PartialState),
    ReplaceState(Object),
    ForceUpdate,
    Callback(Callback),
}

pub(crate) struct UpdateRequest {
    pub(crate) fiber: FiberId,
    pub(crate) priority: Priority,
    pub(crate) kind: UpdateKind,
}

pub(crate) struct RuntimeInner {
    scheduler: Arc<dyn RuntimeScheduler>,
    pending_updates: RefCell<Vec<UpdateRequest>>, // FUTURE(no_std): replace Vec with ring buffer.
    batch_depth: Cell<usize>,
    update_priority: Cell<Priority>,
}

impl RuntimeInner {
    fn new(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self {
            scheduler,
            pending_updates: RefCell::new(Vec::new()),
            batch_depth: Cell::new(0),
            update_priority: Cell::new(Priority::Synchronous),
        }
    }

    fn enqueue_update(&self, fiber: FiberId, kind: UpdateKind) {
        let priority = self.update_priority.get();
        self.pending_updates.borrow_mut().push(UpdateRequest {
            fiber,
            priority,
            kind,
        });
        self.request_callback(priority);
    }

    fn request_callback(&self, priority: Priority) {
        if priority == Priority::NoWork {
            return;
        }
        if priority <= Priority::Animation {
            self.scheduler.schedule_animation_callback();
        } else {
            self.scheduler.schedule_deferred_callback();
        }
    }

    fn take_updates(&self) -> Vec<UpdateRequest> {
        std::mem::take(&mut *self.pending_updates.borrow_mut())
    }

    fn take_updates_for(&self, fibers: &[FiberId]) -> Vec<UpdateRequest> {
        let mut pending = self.pending_updates.borrow_mut();
        let (matching, rest): (Vec<_>, Vec<_>) = pending
            .drain(..)
            .partition(|request| fibers.contains(&request.fiber));
        *pending = rest;
        matching
    }

    fn has_updates(&self) -> bool {
        !self.pending_updates.borrow().is_empty()
    }
}

/// Shared state between the reconciler and the updaters it hands out.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>, // FUTURE(no_std): replace Rc with arena-managed runtime storage.
}

impl Runtime {
    pub fn new(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self {
            inner: Rc::new(RuntimeInner::new(scheduler)),
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle(Rc::downgrade(&self.inner))
    }

    pub fn has_updates(&self) -> bool {
        self.inner.has_updates()
    }

    /// Priority given to updates enqueued from now on.
    pub fn update_priority(&self) -> Priority {
        self.inner.update_priority.get()
    }

    pub(crate) fn set_update_priority(&self, priority: Priority) -> Priority {
        self.inner.update_priority.replace(priority)
    }

    pub(crate) fn request_callback(&self, priority: Priority) {
        self.inner.request_callback(priority);
    }

    pub(crate) fn take_updates(&self) -> Vec<UpdateRequest> {
        self.inner.take_updates()
    }

    pub(crate) fn take_updates_for(&self, fibers: &[FiberId]) -> Vec<UpdateRequest> {
        self.inner.take_updates_for(fibers)
    }

    pub fn is_batching(&self) -> bool {
        self.inner.batch_depth.get() > 0
    }

    pub(crate) fn enter_batch(&self) {
        self.inner.batch_depth.set(self.inner.batch_depth.get() + 1);
    }

    /// Returns `true` when the outermost batch was left.
    pub(crate) fn exit_batch(&self) -> bool {
        let depth = self.inner.batch_depth.get().saturating_sub(1);
        self.inner.batch_depth.set(depth);
        depth == 0
    }
}

#[derive(Default)]
pub struct DefaultScheduler;

impl RuntimeScheduler for DefaultScheduler {
    fn schedule_animation_callback(&self) {}

    fn schedule_deferred_callback(&self) {}
}

#[derive(Clone)]
pub struct RuntimeHandle(pub(crate) Weak<RuntimeInner>);

impl RuntimeHandle {
    pub(crate) fn enqueue_update(&self, fiber: FiberId, kind: UpdateKind) {
        match self.0.upgrade() {
            Some(inner) => inner.enqueue_update(fiber, kind),
            None => log::debug!("dropping update for {fiber:?}: runtime is gone"),
        }
    }

    pub fn has_updates(&self) -> bool {
        self.0
            .upgrade()
            .map(|inner| inner.has_updates())
            .unwrap_or(false)
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}
