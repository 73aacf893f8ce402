//! Applies a finished work-in-progress tree to the host.
//!
//! The effect list is walked three times: insertions first, then
//! deletions, then updates together with lifecycles and callbacks. The
//! finished tree becomes current between the second and third walk, so
//! `did_mount` and `did_update` observe the committed tree. Failures thrown
//! by lifecycles, refs and callbacks are trapped per fiber and reported to
//! the error sink; the commit itself always runs to completion.

use std::rc::Rc;

use crate::collections::map::HashSet;
use crate::component::{ClassInstance, ComponentHandle};
use crate::element::{same_ref, RefTarget};
use crate::error::{CapturedError, HookError, InvariantError, ReconcileError};
use crate::fiber::{EffectTag, FiberId, FiberProps, FiberTag, StateNode};
use crate::host::HostConfig;
use crate::reconciler::{InProgress, Reconciler};
use crate::update_queue::Callback;

impl<H: HostConfig> Reconciler<H> {
    pub(crate) fn commit_root(&mut self) -> Result<(), ReconcileError> {
        let Some(InProgress {
            root,
            wip_root: finished,
            callbacks,
            ..
        }) = self.in_progress.take()
        else {
            return Ok(());
        };
        self.next_unit_of_work = None;

        let mut effects = Vec::new();
        let mut next = self.fibers[finished].first_effect;
        while let Some(effect) = next {
            effects.push(effect);
            next = self.fibers[effect].next_effect;
        }
        if !self.fibers[finished].effect_tag.is_empty() {
            effects.push(finished);
        }
        log::debug!("committing {root:?} with {} effects", effects.len());

        let mut first_invariant: Option<InvariantError> = None;

        for &effect in &effects {
            if self.fibers[effect].effect_tag.contains(EffectTag::PLACEMENT) {
                self.commit_placement(effect);
                self.fibers[effect].effect_tag.remove(EffectTag::PLACEMENT);
            }
        }

        let mut released = Vec::new();
        for &effect in &effects {
            if self.fibers[effect].effect_tag.contains(EffectTag::DELETION) {
                self.commit_deletion(effect, &mut released);
            }
        }

        // From here on the finished tree is the current one.
        self.root_mut(root)?.current = finished;

        let mut root_callbacks = callbacks;
        for &effect in &effects {
            if !self.fibers.contains(effect) {
                continue;
            }
            let tag = self.fibers[effect].effect_tag;
            let current = self.fibers[effect].alternate;
            if tag.contains(EffectTag::UPDATE) {
                if let Err(err) = self.commit_work(current, effect) {
                    log::error!("commit of {effect:?} failed: {err}");
                    first_invariant.get_or_insert(err);
                }
            }
            if tag.intersects(EffectTag::UPDATE | EffectTag::CALLBACK) {
                self.commit_lifecycles(current, effect, &mut root_callbacks);
            }
        }

        for &effect in &effects {
            if let Some(fiber) = self.fibers.get_mut(effect) {
                fiber.next_effect = None;
            }
        }
        let root_fiber = &mut self.fibers[finished];
        root_fiber.first_effect = None;
        root_fiber.last_effect = None;

        self.release_fibers(finished, released);

        let remaining = self.fibers[finished].pending_work_priority;
        let record = self.root_mut(root)?;
        record.pending_priority = record.pending_priority.most_urgent(remaining);

        match first_invariant {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// Frees deleted fibers and every fiber allocated since the previous
    /// commit that did not end up in the finished tree.
    fn release_fibers(&mut self, finished: FiberId, released: Vec<FiberId>) {
        for id in released {
            self.fibers.release(id);
        }
        let mut live: HashSet<FiberId> = HashSet::default();
        for id in self.fibers.subtree(finished) {
            live.insert(id);
            live.extend(self.fibers[id].alternate);
        }
        let mut reclaimed = 0;
        for id in self.fibers.take_uncommitted() {
            if !live.contains(&id) && self.fibers.contains(id) {
                self.fibers.release(id);
                reclaimed += 1;
            }
        }
        if reclaimed > 0 {
            log::trace!("reclaimed {reclaimed} fibers left behind by interrupted renders");
        }
    }

    fn capture(&mut self, fiber: FiberId, error: HookError, during_unmount: bool) {
        let component = self.fibers.get(fiber).and_then(|f| f.ty.name());
        (self.config.error_sink)(CapturedError {
            fiber,
            component,
            error,
            during_unmount,
        });
    }

    /// Nearest host node above `fiber`. `None` when the nearest host parent
    /// is the container, whose content is replaced as a whole.
    fn host_parent(&self, fiber: FiberId) -> Option<H::HostNode> {
        let mut parent = self.fibers.get(fiber)?.parent;
        while let Some(id) = parent {
            let node = self.fibers.get(id)?;
            match node.tag {
                FiberTag::HostComponent => return node.state_node.host().cloned(),
                FiberTag::HostContainer => return None,
                _ => parent = node.parent,
            }
        }
        None
    }

    /// The host node that `fiber`'s nodes have to be inserted before, or
    /// `None` to append. Siblings that are being placed themselves are
    /// skipped since they are not in the host tree yet.
    fn host_sibling(&self, fiber: FiberId) -> Option<H::HostNode> {
        let mut node = fiber;
        'siblings: loop {
            while self.fibers[node].sibling.is_none() {
                let parent = self.fibers[node].parent?;
                if matches!(self.fibers[parent].tag, FiberTag::HostComponent | FiberTag::HostContainer) {
                    return None;
                }
                node = parent;
            }
            node = self.fibers[node].sibling?;
            while !self.fibers[node].tag.is_host() {
                if self.fibers[node].effect_tag.contains(EffectTag::PLACEMENT) {
                    continue 'siblings;
                }
                match self.fibers[node].host_child() {
                    Some(child) => node = child,
                    None => continue 'siblings,
                }
            }
            if !self.fibers[node].effect_tag.contains(EffectTag::PLACEMENT) {
                return self.fibers[node].state_node.host().cloned();
            }
        }
    }

    fn commit_placement(&mut self, fiber: FiberId) {
        let Some(parent) = self.host_parent(fiber) else {
            return;
        };
        let before = self.host_sibling(fiber);
        let nodes = Rc::clone(&self.fibers[fiber].output);
        for node in nodes.iter() {
            match &before {
                Some(before) => self.host.insert_before(&parent, node, before),
                None => self.host.append_child(&parent, node),
            }
        }
    }

    /// Removes the host nodes of a deleted subtree, runs its unmount hooks
    /// and detaches it from the tree. The fibers are queued for release.
    fn commit_deletion(&mut self, fiber: FiberId, released: &mut Vec<FiberId>) {
        let parent = self.host_parent(fiber);
        self.unmount_host_components(fiber, parent.as_ref());

        for id in self.fibers.subtree(fiber) {
            released.push(id);
            released.extend(self.fibers[id].alternate);
        }
        let alternate = self.fibers[fiber].alternate;
        for id in std::iter::once(fiber).chain(alternate) {
            if let Some(node) = self.fibers.get_mut(id) {
                node.parent = None;
                node.child = None;
            }
        }
    }

    fn unmount_host_components(&mut self, root: FiberId, parent: Option<&H::HostNode>) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if self.fibers[id].tag.is_host() {
                self.commit_nested_unmounts(id);
                let node = self.fibers[id].state_node.host().cloned();
                if let (Some(parent), Some(node)) = (parent, node) {
                    self.host.remove_child(parent, &node);
                }
                continue;
            }
            self.commit_unmount(id);
            let children = self.fibers.all_children(id);
            stack.extend(children.into_iter().rev());
        }
    }

    fn commit_nested_unmounts(&mut self, root: FiberId) {
        for id in self.fibers.subtree(root) {
            self.commit_unmount(id);
        }
    }

    fn commit_unmount(&mut self, fiber: FiberId) {
        let node = &self.fibers[fiber];
        match node.tag {
            FiberTag::ClassComponent => {
                if let Some(ref_) = node.ref_.clone() {
                    ref_(None);
                }
                let Some(class_ref) = self.fibers[fiber].state_node.class().cloned() else {
                    return;
                };
                let result = {
                    let mut class_instance = class_ref.borrow_mut();
                    let ClassInstance { instance, component, .. } = &mut *class_instance;
                    component.will_unmount(instance)
                };
                if let Err(err) = result {
                    self.capture(fiber, err, true);
                }
            }
            FiberTag::HostComponent => {
                if let Some(ref_) = node.ref_.clone() {
                    ref_(None);
                }
            }
            _ => {}
        }
    }

    fn commit_work(&mut self, current: Option<FiberId>, fiber: FiberId) -> Result<(), InvariantError> {
        let tag = self.fibers[fiber].tag;
        match tag {
            FiberTag::ClassComponent => {
                self.detach_ref_if_needed(current, fiber);
                Ok(())
            }
            FiberTag::HostContainer => {
                let StateNode::Root(root) = self.fibers[fiber].state_node else {
                    return Err(InvariantError::TypeMismatch { fiber, tag });
                };
                let output = Rc::clone(&self.fibers[fiber].output);
                let record = self
                    .roots
                    .get_mut(root.index())
                    .and_then(Option::as_mut)
                    .ok_or(InvariantError::UnknownRoot(root))?;
                self.host.update_container(&mut record.container, &output);
                Ok(())
            }
            FiberTag::HostComponent => {
                let work = &self.fibers[fiber];
                let node = work.state_node.host().cloned();
                let new_props = work.memoized_props.as_ref().and_then(FiberProps::as_element).cloned();
                let old_props = current
                    .and_then(|current| self.fibers.get(current))
                    .and_then(|current| current.memoized_props.as_ref())
                    .and_then(FiberProps::as_element)
                    .cloned();
                if let (Some(node), Some(old_props), Some(new_props)) = (node, old_props, new_props) {
                    if !Rc::ptr_eq(&old_props, &new_props) {
                        self.host.commit_update(&node, &old_props, &new_props);
                    }
                }
                self.detach_ref_if_needed(current, fiber);
                Ok(())
            }
            FiberTag::HostText => {
                let current = current.ok_or(InvariantError::TextUpdateWithoutCurrent)?;
                let node = self.fibers[fiber].state_node.host().cloned();
                let new_text = self.fibers[fiber].memoized_props.as_ref().and_then(FiberProps::as_text).cloned();
                let old_text = self.fibers[current].memoized_props.as_ref().and_then(FiberProps::as_text).cloned();
                if let (Some(node), Some(old_text), Some(new_text)) = (node, old_text, new_text) {
                    self.host.commit_text_update(&node, &old_text, &new_text);
                }
                Ok(())
            }
            other => Err(InvariantError::UnexpectedEffect(other)),
        }
    }

    fn detach_ref_if_needed(&mut self, current: Option<FiberId>, fiber: FiberId) {
        let Some(current) = current.and_then(|current| self.fibers.get(current)) else {
            return;
        };
        let Some(old_ref) = current.ref_.clone() else {
            return;
        };
        if !same_ref(Some(&old_ref), self.fibers[fiber].ref_.as_ref()) {
            old_ref(None);
        }
    }

    fn attach_ref(&mut self, current: Option<FiberId>, fiber: FiberId, target: impl FnOnce() -> RefTarget) {
        let Some(ref_) = self.fibers[fiber].ref_.clone() else {
            return;
        };
        let old_ref = current
            .and_then(|current| self.fibers.get(current))
            .and_then(|current| current.ref_.as_ref());
        if current.is_none() || !same_ref(old_ref, Some(&ref_)) {
            ref_(Some(target()));
        }
    }

    fn commit_lifecycles(&mut self, current: Option<FiberId>, fiber: FiberId, root_callbacks: &mut Vec<Callback>) {
        let tag = self.fibers[fiber].tag;
        let effect_tag = self.fibers[fiber].effect_tag;
        match tag {
            FiberTag::ClassComponent => {
                let Some(class_ref) = self.fibers[fiber].state_node.class().cloned() else {
                    return;
                };
                if effect_tag.contains(EffectTag::UPDATE) {
                    let previous = current.and_then(|current| self.fibers.get(current)).map(|current| {
                        let props = current.memoized_props.as_ref().and_then(FiberProps::as_element).cloned();
                        (props, current.memoized_state.clone())
                    });
                    let result = {
                        let mut class_instance = class_ref.borrow_mut();
                        let ClassInstance { instance, component, .. } = &mut *class_instance;
                        match previous {
                            None => component.did_mount(instance),
                            Some((prev_props, prev_state)) => {
                                let prev_props = prev_props.unwrap_or_else(|| Rc::clone(&instance.props));
                                component.did_update(instance, &prev_props, prev_state.as_ref())
                            }
                        }
                    };
                    if let Err(err) = result {
                        self.capture(fiber, err, false);
                    }
                    self.attach_ref(current, fiber, || {
                        RefTarget::Component(ComponentHandle(Rc::clone(&class_ref)))
                    });
                }
                if effect_tag.contains(EffectTag::CALLBACK) {
                    self.commit_callbacks(fiber);
                }
            }
            FiberTag::HostContainer => {
                for callback in std::mem::take(root_callbacks) {
                    if let Err(err) = callback() {
                        self.capture(fiber, err, false);
                    }
                }
            }
            FiberTag::HostComponent => {
                let Some(node) = self.fibers[fiber].state_node.host().cloned() else {
                    return;
                };
                self.attach_ref(current, fiber, || RefTarget::Host(Rc::new(node)));
            }
            _ => {}
        }
    }

    /// Runs the callbacks of the records folded by this render and drops
    /// those records from the shared queue.
    fn commit_callbacks(&mut self, fiber: FiberId) {
        let work = &mut self.fibers[fiber];
        let Some(queue) = work.callback_list.take() else {
            return;
        };
        let processed = std::mem::take(&mut work.processed_updates);
        let mut done = queue.borrow_mut().split_processed(processed);
        if queue.borrow().is_empty() {
            let alternate = work.alternate;
            for id in std::iter::once(fiber).chain(alternate) {
                if let Some(node) = self.fibers.get_mut(id) {
                    if node.update_queue.as_ref().is_some_and(|shared| Rc::ptr_eq(shared, &queue)) {
                        node.update_queue = None;
                    }
                }
            }
        }
        for err in done.run_callbacks() {
            self.capture(fiber, err, false);
        }
    }
}
