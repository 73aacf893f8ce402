use std::rc::Rc;

use crate::element::Node;
use crate::error::{InvariantError, ReconcileError};
use crate::fiber::{FiberId, FiberProps, FiberTag, FiberType, Priority};
use crate::host::HostConfig;
use crate::reconciler::Reconciler;

impl<H: HostConfig> Reconciler<H> {
    /// Renders `wip` and returns the first child to work on next.
    pub(crate) fn begin_work(
        &mut self,
        current: Option<FiberId>,
        wip: FiberId,
        priority: Priority,
    ) -> Result<Option<FiberId>, ReconcileError> {
        let own = self.fibers[wip].pending_work_priority;
        let has_own_work = own.is_within(priority);
        self.fibers[wip].pending_work_priority = if has_own_work { Priority::NoWork } else { own };

        if let Some(current) = current {
            if self.can_bail_out(wip, has_own_work) {
                log::trace!("bailing out on {wip:?}");
                if self.fibers[wip].is_context_provider() {
                    self.context.push_provider(&self.fibers[wip], false)?;
                }
                return Ok(self.bailout_on_already_finished_work(Some(current), wip));
            }
        }

        match self.fibers[wip].tag {
            FiberTag::IndeterminateComponent | FiberTag::FunctionalComponent => {
                self.update_functional_component(current, wip, priority)
            }
            FiberTag::ClassComponent => self.update_class_component(current, wip, priority),
            FiberTag::HostContainer => self.update_host_container(current, wip, priority),
            FiberTag::HostComponent => self.update_host_component(current, wip, priority),
            FiberTag::HostText => {
                self.memoize_pending_props(wip);
                Ok(None)
            }
            FiberTag::CoroutineComponent | FiberTag::CoroutineHandlerPhase => {
                self.fibers[wip].tag = FiberTag::CoroutineComponent;
                self.update_coroutine_component(current, wip, priority)
            }
            FiberTag::YieldComponent => {
                self.memoize_pending_props(wip);
                Ok(None)
            }
            FiberTag::Fragment => self.update_fragment(current, wip, priority),
        }
    }

    /// Props unchanged, no context change above, and no queued updates
    /// to process at this priority.
    fn can_bail_out(&self, wip: FiberId, has_own_work: bool) -> bool {
        let fiber = &self.fibers[wip];
        let props_unchanged = match (&fiber.pending_props, &fiber.memoized_props) {
            (None, _) => true,
            (Some(pending), Some(memoized)) => pending.same(memoized),
            (Some(_), None) => false,
        };
        if !props_unchanged || self.context.has_context_changed() {
            return false;
        }
        let has_updates = fiber
            .update_queue
            .as_ref()
            .is_some_and(|queue| !queue.borrow().is_empty());
        !(has_own_work && has_updates)
    }

    /// Skips rendering `wip` itself but keeps walking its subtree, which may
    /// still hold deeper pending work.
    pub(crate) fn bailout_on_already_finished_work(
        &mut self,
        current: Option<FiberId>,
        wip: FiberId,
    ) -> Option<FiberId> {
        match current {
            Some(current) => self.clone_child_fibers(current, wip),
            // A resumed mount keeps the children of its earlier attempt.
            None => self.fibers[wip].child,
        }
    }

    fn clone_child_fibers(&mut self, current: FiberId, wip: FiberId) -> Option<FiberId> {
        let mut children = Vec::new();
        let mut next = self.fibers[current].child;
        while let Some(child) = next {
            let priority = self.fibers[child].pending_work_priority;
            let clone = self.fibers.clone_to_work_in_progress(child, priority);
            children.push(clone);
            next = self.fibers[child].sibling;
        }
        let first = self.fibers.link_children(wip, &children);
        self.fibers[wip].child = first;
        first
    }

    pub(crate) fn memoize_pending_props(&mut self, wip: FiberId) {
        let fiber = &mut self.fibers[wip];
        if let Some(pending) = fiber.pending_props.clone() {
            fiber.memoized_props = Some(pending);
        }
    }

    /// Reconciles `children` against the committed children of `current`
    /// (or, for a fresh fiber, against what an aborted attempt left behind).
    pub(crate) fn reconcile_children(
        &mut self,
        current: Option<FiberId>,
        wip: FiberId,
        children: &Node,
        priority: Priority,
    ) -> Result<Option<FiberId>, ReconcileError> {
        let (old_first, progressed) = match current {
            Some(current) => (self.fibers[current].child, self.fibers[wip].progressed_child.take()),
            None => (None, self.fibers[wip].child),
        };
        let first = self.reconcile_child_fibers(
            wip,
            old_first,
            progressed,
            children,
            priority,
            current.is_some(),
        )?;
        let fiber = &mut self.fibers[wip];
        fiber.child = first;
        fiber.progressed_child = None;
        Ok(first)
    }

    fn update_functional_component(
        &mut self,
        current: Option<FiberId>,
        wip: FiberId,
        priority: Priority,
    ) -> Result<Option<FiberId>, ReconcileError> {
        let fiber = &self.fibers[wip];
        let FiberType::Function(function) = fiber.ty.clone() else {
            return Err(InvariantError::TypeMismatch {
                fiber: wip,
                tag: fiber.tag,
            }
            .into());
        };
        let props = fiber
            .effective_props()
            .and_then(FiberProps::as_element)
            .cloned()
            .ok_or(InvariantError::MissingProps)?;
        let context = self.context.masked_context(function.declared_context_types());
        let children = function
            .call(&props, &context)
            .map_err(|source| ReconcileError::Render {
                component: Rc::clone(function.name()),
                source,
            })?;
        self.fibers[wip].tag = FiberTag::FunctionalComponent;
        self.fibers[wip].memoized_props = Some(FiberProps::Element(props));
        self.reconcile_children(current, wip, &children, priority)
    }

    fn update_host_container(
        &mut self,
        current: Option<FiberId>,
        wip: FiberId,
        priority: Priority,
    ) -> Result<Option<FiberId>, ReconcileError> {
        let element = match self.fibers[wip].effective_props() {
            Some(FiberProps::Root(element)) => element.clone(),
            _ => Node::Empty,
        };
        self.memoize_pending_props(wip);
        self.reconcile_children(current, wip, &element, priority)
    }

    fn update_host_component(
        &mut self,
        current: Option<FiberId>,
        wip: FiberId,
        priority: Priority,
    ) -> Result<Option<FiberId>, ReconcileError> {
        let props = self.fibers[wip]
            .effective_props()
            .and_then(FiberProps::as_element)
            .cloned()
            .ok_or(InvariantError::MissingProps)?;
        self.memoize_pending_props(wip);
        self.reconcile_children(current, wip, props.children(), priority)
    }

    fn update_fragment(
        &mut self,
        current: Option<FiberId>,
        wip: FiberId,
        priority: Priority,
    ) -> Result<Option<FiberId>, ReconcileError> {
        let children = match self.fibers[wip].effective_props() {
            Some(FiberProps::Fragment(nodes)) => Node::Fragment(Rc::clone(nodes)),
            _ => return Err(InvariantError::MissingProps.into()),
        };
        self.memoize_pending_props(wip);
        self.reconcile_children(current, wip, &children, priority)
    }

    fn update_coroutine_component(
        &mut self,
        current: Option<FiberId>,
        wip: FiberId,
        priority: Priority,
    ) -> Result<Option<FiberId>, ReconcileError> {
        let coroutine = match self.fibers[wip].effective_props() {
            Some(FiberProps::Coroutine(coroutine)) => Rc::clone(coroutine),
            _ => return Err(InvariantError::MissingProps.into()),
        };
        self.memoize_pending_props(wip);
        self.reconcile_children(current, wip, &coroutine.children, priority)
    }
}
