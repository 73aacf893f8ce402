//! A reconciler wired to [`MemoryHost`] with helpers to drive and inspect it.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use fiber_core::{
    CapturedError, Callback, Node, Priority, ReconcileError, Reconciler, ReconcilerConfig, RootId, Runtime,
};

use crate::host::{MemContainer, MemoryHost, NodeId};
use crate::scheduler::{TestScheduler, UnitDeadline};

/// Upper bound on deferred callbacks `flush_all` will simulate.
const MAX_FLUSH_ROUNDS: usize = 1_000;

pub struct TestRenderer {
    reconciler: Reconciler<MemoryHost>,
    scheduler: Arc<TestScheduler>,
    errors: Rc<RefCell<Vec<CapturedError>>>,
    root: Option<RootId>,
}

impl TestRenderer {
    /// A renderer that performs updates synchronously.
    pub fn new() -> Self {
        Self::build(true)
    }

    /// A renderer whose updates wait for a deferred callback.
    pub fn deferred() -> Self {
        Self::build(false)
    }

    fn build(use_sync_scheduling: bool) -> Self {
        let scheduler = Arc::new(TestScheduler::new());
        let errors: Rc<RefCell<Vec<CapturedError>>> = Rc::default();
        let sink = Rc::clone(&errors);
        let config = ReconcilerConfig::new()
            .use_sync_scheduling(use_sync_scheduling)
            .error_sink(move |captured| sink.borrow_mut().push(captured));
        let runtime = Runtime::new(scheduler.clone());
        Self {
            reconciler: Reconciler::with_config(MemoryHost::new(), runtime, config),
            scheduler,
            errors,
            root: None,
        }
    }

    pub fn reconciler(&self) -> &Reconciler<MemoryHost> {
        &self.reconciler
    }

    pub fn reconciler_mut(&mut self) -> &mut Reconciler<MemoryHost> {
        &mut self.reconciler
    }

    pub fn host(&self) -> &MemoryHost {
        self.reconciler.host()
    }

    pub fn host_mut(&mut self) -> &mut MemoryHost {
        self.reconciler.host_mut()
    }

    pub fn scheduler(&self) -> &TestScheduler {
        &self.scheduler
    }

    pub fn root(&self) -> Option<RootId> {
        self.root
    }

    /// Mounts `element` on first use and updates the same root afterwards.
    pub fn render(&mut self, element: impl Into<Node>) -> Result<RootId, ReconcileError> {
        self.render_with_callback(element, None)
    }

    pub fn render_with_callback(
        &mut self,
        element: impl Into<Node>,
        callback: Option<Callback>,
    ) -> Result<RootId, ReconcileError> {
        match self.root {
            Some(root) => {
                self.reconciler.update_container(element, root, callback)?;
                Ok(root)
            }
            None => {
                let root = self
                    .reconciler
                    .mount_container(element, MemContainer::new(), callback)?;
                self.root = Some(root);
                Ok(root)
            }
        }
    }

    /// Renders `element` at `priority` regardless of the configured default.
    pub fn render_at(&mut self, priority: Priority, element: impl Into<Node>) -> Result<RootId, ReconcileError> {
        let element = element.into();
        let root = self.root;
        self.reconciler.perform_with_priority(priority, |reconciler| match root {
            Some(root) => reconciler.update_container(element, root, None).map(|_| root),
            None => reconciler.mount_container(element, MemContainer::new(), None),
        })
        .inspect(|root| self.root = Some(*root))
    }

    pub fn unmount(&mut self) -> Result<(), ReconcileError> {
        match self.root {
            Some(root) => self.reconciler.unmount_container(root),
            None => Ok(()),
        }
    }

    pub fn flush_sync(&mut self) -> Result<(), ReconcileError> {
        self.reconciler.flush_sync_work()
    }

    pub fn flush_animation(&mut self) -> Result<(), ReconcileError> {
        self.scheduler.take_animation_request();
        self.reconciler.perform_animation_work()
    }

    /// Simulates one deferred callback that allows `units` fibers of work.
    pub fn flush_units(&mut self, units: usize) -> Result<(), ReconcileError> {
        self.scheduler.take_deferred_request();
        self.reconciler.perform_deferred_work(&UnitDeadline::new(units))
    }

    /// Keeps simulating callbacks until no work is left.
    pub fn flush_all(&mut self) -> Result<(), ReconcileError> {
        for _ in 0..MAX_FLUSH_ROUNDS {
            if !self.reconciler.has_pending_work() {
                return Ok(());
            }
            self.scheduler.take_animation_request();
            self.scheduler.take_deferred_request();
            self.reconciler.perform_deferred_work(&UnitDeadline::unlimited())?;
        }
        log::warn!("work still pending after {MAX_FLUSH_ROUNDS} rounds");
        Ok(())
    }

    pub fn container_children(&self) -> Vec<NodeId> {
        self.root
            .and_then(|root| self.reconciler.container(root))
            .map(|container| container.children().to_vec())
            .unwrap_or_default()
    }

    /// Markup of everything currently in the container.
    pub fn markup(&self) -> String {
        self.host().markup(&self.container_children())
    }

    pub fn dump_tree(&self) -> String {
        self.host().dump_tree(&self.container_children())
    }

    pub fn take_errors(&self) -> Vec<CapturedError> {
        std::mem::take(&mut *self.errors.borrow_mut())
    }
}

impl Default for TestRenderer {
    fn default() -> Self {
        Self::new()
    }
}
