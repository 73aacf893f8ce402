use std::rc::Rc;

use crate::element::same_ref;
use crate::error::{InvariantError, ReconcileError};
use crate::fiber::{EffectTag, FiberId, FiberProps, FiberTag, FiberType, Priority, StateNode};
use crate::host::HostConfig;
use crate::reconciler::Reconciler;
use crate::value::Value;

impl<H: HostConfig> Reconciler<H> {
    /// Finishes `wip` once all of its children are complete. Returns a fiber
    /// to continue with when completing spawned more work, which only a
    /// coroutine entering its handler phase does.
    pub(crate) fn complete_work(
        &mut self,
        current: Option<FiberId>,
        wip: FiberId,
    ) -> Result<Option<FiberId>, ReconcileError> {
        match self.fibers[wip].tag {
            FiberTag::IndeterminateComponent | FiberTag::FunctionalComponent | FiberTag::Fragment => {
                self.transfer_output(wip);
            }
            FiberTag::ClassComponent => self.complete_class_component(wip),
            FiberTag::HostContainer => {
                self.transfer_output(wip);
                self.fibers[wip].effect_tag |= EffectTag::UPDATE;
            }
            FiberTag::HostComponent => self.complete_host_component(current, wip)?,
            FiberTag::HostText => self.complete_host_text(current, wip)?,
            FiberTag::CoroutineComponent => return self.complete_coroutine(current, wip),
            FiberTag::CoroutineHandlerPhase => {
                let fiber = &mut self.fibers[wip];
                fiber.tag = FiberTag::CoroutineComponent;
                self.transfer_output(wip);
            }
            FiberTag::YieldComponent => {
                self.fibers[wip].output = Rc::from(Vec::new());
            }
        }
        Ok(None)
    }

    /// Host nodes produced by the sibling chain starting at `first`.
    fn gather_output(&self, first: Option<FiberId>) -> Vec<H::HostNode> {
        let mut nodes = Vec::new();
        let mut next = first;
        while let Some(child) = next {
            let fiber = &self.fibers[child];
            nodes.extend(fiber.output.iter().cloned());
            next = fiber.sibling;
        }
        nodes
    }

    fn transfer_output(&mut self, wip: FiberId) {
        let output = self.gather_output(self.fibers[wip].host_child());
        self.fibers[wip].output = Rc::from(output);
    }

    fn complete_class_component(&mut self, wip: FiberId) {
        if self.fibers[wip].is_context_provider() {
            self.context.pop_provider();
        }
        self.transfer_output(wip);
        let fiber = &mut self.fibers[wip];
        if fiber.processed_updates > 0 {
            fiber.effect_tag |= EffectTag::CALLBACK;
            fiber.callback_list = fiber.update_queue.clone();
        }
    }

    fn complete_host_component(&mut self, current: Option<FiberId>, wip: FiberId) -> Result<(), ReconcileError> {
        let fiber = &self.fibers[wip];
        let new_props = fiber
            .memoized_props
            .as_ref()
            .and_then(FiberProps::as_element)
            .cloned()
            .ok_or(InvariantError::MissingProps)?;
        let FiberType::Host(ty) = fiber.ty.clone() else {
            return Err(InvariantError::TypeMismatch {
                fiber: wip,
                tag: fiber.tag,
            }
            .into());
        };
        let existing = fiber.state_node.host().cloned();

        let node = match (current, existing) {
            (Some(current), Some(node)) => {
                let current = &self.fibers[current];
                let mut needs_update = !same_ref(current.ref_.as_ref(), self.fibers[wip].ref_.as_ref());
                if let Some(old_props) = current.memoized_props.as_ref().and_then(FiberProps::as_element) {
                    if !Rc::ptr_eq(old_props, &new_props) && self.host.prepare_update(&node, old_props, &new_props) {
                        needs_update = true;
                    }
                }
                if needs_update {
                    self.fibers[wip].effect_tag |= EffectTag::UPDATE;
                }
                node
            }
            _ => {
                let children = self.gather_output(self.fibers[wip].child);
                let node = self.host.create_instance(&ty, &new_props, &children, wip);
                log::trace!("created <{ty}> for {wip:?}");
                let fiber = &mut self.fibers[wip];
                fiber.state_node = StateNode::Host(node.clone());
                if fiber.ref_.is_some() {
                    fiber.effect_tag |= EffectTag::UPDATE;
                }
                node
            }
        };
        self.fibers[wip].output = Rc::from(vec![node]);
        Ok(())
    }

    fn complete_host_text(&mut self, current: Option<FiberId>, wip: FiberId) -> Result<(), ReconcileError> {
        let fiber = &self.fibers[wip];
        let text = fiber
            .memoized_props
            .as_ref()
            .and_then(FiberProps::as_text)
            .cloned()
            .ok_or(InvariantError::MissingProps)?;
        let existing = fiber.state_node.host().cloned();

        let node = match (current, existing) {
            (Some(current), Some(node)) => {
                let old_text = self.fibers[current].memoized_props.as_ref().and_then(FiberProps::as_text);
                if old_text != Some(&text) {
                    self.fibers[wip].effect_tag |= EffectTag::UPDATE;
                }
                node
            }
            _ => {
                let node = self.host.create_text_instance(&text, wip);
                self.fibers[wip].state_node = StateNode::Host(node.clone());
                node
            }
        };
        self.fibers[wip].output = Rc::from(vec![node]);
        Ok(())
    }

    /// First completion of a coroutine: its children yielded, so the
    /// handler runs on the collected values and its output is reconciled as
    /// the second child list.
    fn complete_coroutine(
        &mut self,
        current: Option<FiberId>,
        wip: FiberId,
    ) -> Result<Option<FiberId>, ReconcileError> {
        let coroutine = match &self.fibers[wip].memoized_props {
            Some(FiberProps::Coroutine(coroutine)) => Rc::clone(coroutine),
            _ => return Err(InvariantError::MissingProps.into()),
        };
        let values = self.collect_yields(wip);
        let children = (coroutine.handler)(&coroutine.props, &values);

        let old_first = current.and_then(|current| match self.fibers[current].state_node {
            StateNode::Coroutine(first) => first,
            _ => None,
        });
        let progressed = match self.fibers[wip].state_node {
            StateNode::Coroutine(first) => first.filter(|first| Some(*first) != old_first),
            _ => None,
        };
        let first = self.reconcile_child_fibers(
            wip,
            old_first,
            progressed,
            &children,
            self.render_priority(),
            current.is_some(),
        )?;
        self.fibers[wip].state_node = StateNode::Coroutine(first);

        match first {
            Some(first) => {
                self.fibers[wip].tag = FiberTag::CoroutineHandlerPhase;
                Ok(Some(first))
            }
            None => {
                self.fibers[wip].output = Rc::from(Vec::new());
                Ok(None)
            }
        }
    }

    /// Yield values below `coroutine` in tree order, not looking into
    /// nested coroutines.
    fn collect_yields(&self, coroutine: FiberId) -> Vec<Value> {
        let mut values = Vec::new();
        let mut stack: Vec<FiberId> = Vec::new();
        let mut next = self.fibers[coroutine].child;
        while let Some(child) = next {
            stack.push(child);
            next = self.fibers[child].sibling;
        }
        stack.reverse();
        while let Some(id) = stack.pop() {
            let fiber = &self.fibers[id];
            match (fiber.tag, &fiber.memoized_props) {
                (FiberTag::YieldComponent, Some(FiberProps::Yield(yielded))) => values.push(yielded.value.clone()),
                (FiberTag::CoroutineComponent | FiberTag::CoroutineHandlerPhase, _) => {}
                _ => {
                    let mut children = Vec::new();
                    let mut next = fiber.child;
                    while let Some(child) = next {
                        children.push(child);
                        next = self.fibers[child].sibling;
                    }
                    stack.extend(children.into_iter().rev());
                }
            }
        }
        values
    }

    pub(crate) fn render_priority(&self) -> Priority {
        self.in_progress
            .as_ref()
            .map(|work| work.priority)
            .unwrap_or(Priority::Synchronous)
    }
}
