//! Public entry point: containers, batching and priority scopes.

use std::rc::Rc;
use std::sync::Arc;

use crate::component::ComponentHandle;
use crate::config::ReconcilerConfig;
use crate::context::ContextStack;
use crate::element::{Node, RefTarget};
use crate::error::{InvariantError, ReconcileError};
use crate::fiber::{FiberId, FiberStore, FiberTag, Priority, StateNode};
use crate::host::HostConfig;
use crate::platform::RuntimeScheduler;
use crate::reflection::{self, MountState};
use crate::runtime::{Runtime, RuntimeHandle};
use crate::update_queue::Callback;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RootId(usize);

impl RootId {
    /// Ids are handed out by [`Reconciler::mount_container`]; one built by
    /// hand only resolves if a root with that index exists.
    pub fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// A mounted tree: its container, the committed root fiber and the work
/// waiting to be rendered into it.
pub struct FiberRoot<H: HostConfig> {
    pub(crate) container: H::Container,
    pub(crate) current: FiberId,
    pub(crate) pending_priority: Priority,
    pub(crate) pending_element: Option<Node>,
    pub(crate) pending_callbacks: Vec<Callback>,
}

impl<H: HostConfig> FiberRoot<H> {
    pub fn container(&self) -> &H::Container {
        &self.container
    }

    pub fn current(&self) -> FiberId {
        self.current
    }

    pub fn pending_priority(&self) -> Priority {
        self.pending_priority
    }
}

/// The render pass currently under way.
pub(crate) struct InProgress {
    pub(crate) root: RootId,
    pub(crate) priority: Priority,
    pub(crate) wip_root: FiberId,
    pub(crate) element: Option<Node>,
    pub(crate) callbacks: Vec<Callback>,
}

pub struct Reconciler<H: HostConfig> {
    pub(crate) host: H,
    pub(crate) fibers: FiberStore<H>,
    pub(crate) roots: Vec<Option<FiberRoot<H>>>,
    pub(crate) runtime: Runtime,
    pub(crate) config: ReconcilerConfig,
    pub(crate) context: ContextStack,
    pub(crate) next_unit_of_work: Option<FiberId>,
    pub(crate) in_progress: Option<InProgress>,
    pub(crate) is_performing_work: bool,
}

impl<H: HostConfig> Reconciler<H> {
    pub fn new(host: H, scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self::with_config(host, Runtime::new(scheduler), ReconcilerConfig::default())
    }

    pub fn with_config(host: H, runtime: Runtime, config: ReconcilerConfig) -> Self {
        runtime.set_update_priority(config.default_priority());
        Self {
            host,
            fibers: FiberStore::new(),
            roots: Vec::new(),
            runtime,
            config,
            context: ContextStack::new(),
            next_unit_of_work: None,
            in_progress: None,
            is_performing_work: false,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn fibers(&self) -> &FiberStore<H> {
        &self.fibers
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn runtime_handle(&self) -> RuntimeHandle {
        self.runtime.handle()
    }

    pub fn root(&self, root: RootId) -> Option<&FiberRoot<H>> {
        self.roots.get(root.0).and_then(Option::as_ref)
    }

    pub fn container(&self, root: RootId) -> Option<&H::Container> {
        self.root(root).map(FiberRoot::container)
    }

    /// The committed root fiber of `root`.
    pub fn root_fiber(&self, root: RootId) -> Option<FiberId> {
        self.root(root).map(FiberRoot::current)
    }

    pub(crate) fn root_mut(&mut self, root: RootId) -> Result<&mut FiberRoot<H>, InvariantError> {
        self.roots
            .get_mut(root.0)
            .and_then(Option::as_mut)
            .ok_or(InvariantError::UnknownRoot(root))
    }

    /// Creates a root for `container` and schedules `element` to be rendered
    /// into it. `callback` runs after the first commit of that render.
    pub fn mount_container(
        &mut self,
        element: impl Into<Node>,
        container: H::Container,
        callback: Option<Callback>,
    ) -> Result<RootId, ReconcileError> {
        let root = RootId(self.roots.len());
        let current = self.fibers.create_root_fiber(root);
        self.roots.push(Some(FiberRoot {
            container,
            current,
            pending_priority: Priority::NoWork,
            pending_element: None,
            pending_callbacks: Vec::new(),
        }));
        log::debug!("mounting container {root:?}");
        self.update_container(element, root, callback)?;
        Ok(root)
    }

    pub fn update_container(
        &mut self,
        element: impl Into<Node>,
        root: RootId,
        callback: Option<Callback>,
    ) -> Result<(), ReconcileError> {
        let priority = self.runtime.update_priority();
        let record = self.root_mut(root)?;
        record.pending_element = Some(element.into());
        if let Some(callback) = callback {
            record.pending_callbacks.push(callback);
        }
        self.schedule_work(root, priority)
    }

    /// Renders an empty tree into `root`, running every unmount hook.
    pub fn unmount_container(&mut self, root: RootId) -> Result<(), ReconcileError> {
        log::debug!("unmounting container {root:?}");
        self.update_container(Node::Empty, root, None)
    }

    /// The public instance of the first child of the committed root.
    pub fn public_root_instance(&self, root: RootId) -> Option<RefTarget> {
        let current = self.root_fiber(root)?;
        let child = self.fibers.get(current)?.child?;
        match &self.fibers.get(child)?.state_node {
            StateNode::Class(class) => Some(RefTarget::Component(ComponentHandle(Rc::clone(class)))),
            StateNode::Host(node) => Some(RefTarget::Host(Rc::new(node.clone()))),
            _ => None,
        }
    }

    pub fn is_mounted(&self, handle: &ComponentHandle) -> bool {
        let fiber = handle.fiber();
        reflection::mount_state(&self.fibers, fiber) == MountState::Mounted
    }

    /// First host node rendered by the component behind `handle`.
    pub fn find_host_instance(&self, handle: &ComponentHandle) -> Result<Option<H::HostNode>, ReconcileError> {
        let fiber = self.current_fiber_of(handle.fiber());
        let host = reflection::find_current_host_fiber(&self.fibers, fiber)?;
        Ok(host.and_then(|host| self.fibers[host].state_node.host().cloned()))
    }

    /// Resolves which buffer of the pair `fiber` belongs to is committed.
    pub(crate) fn current_fiber_of(&self, fiber: FiberId) -> FiberId {
        let Some(alternate) = self.fibers.get(fiber).and_then(|f| f.alternate) else {
            return fiber;
        };
        let mut top = fiber;
        while let Some(parent) = self.fibers.get(top).and_then(|f| f.parent) {
            top = parent;
        }
        let committed = match self.fibers.get(top) {
            Some(root_fiber) if root_fiber.tag == FiberTag::HostContainer => match root_fiber.state_node {
                StateNode::Root(root) => self.root_fiber(root) == Some(top),
                _ => false,
            },
            _ => false,
        };
        if committed {
            fiber
        } else {
            alternate
        }
    }

    /// Runs `f` with synchronous updates deferred until the outermost batch
    /// ends, then performs them in one pass.
    pub fn batched_updates<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> Result<R, ReconcileError> {
        self.runtime.enter_batch();
        let result = f(self);
        if self.runtime.exit_batch() {
            self.flush_sync_work()?;
        }
        Ok(result)
    }

    /// Runs `f` with every update it issues scheduled at `priority`.
    pub fn perform_with_priority<R>(
        &mut self,
        priority: Priority,
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        let previous = self.runtime.set_update_priority(priority);
        let result = f(self);
        self.runtime.set_update_priority(previous);
        result
    }

    pub fn sync_updates<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.perform_with_priority(Priority::Synchronous, f)
    }

    pub fn has_pending_work(&self) -> bool {
        self.runtime.has_updates()
            || self.next_unit_of_work.is_some()
            || self
                .roots
                .iter()
                .flatten()
                .any(|root| root.pending_priority != Priority::NoWork)
    }
}
