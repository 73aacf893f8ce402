//! Keyed reconciliation of a fiber's children against a new child list.
//!
//! Children are matched by key (or by position when unkeyed) in a single
//! forward pass; once the lists diverge the remaining old children go into a
//! map and are looked up per new child. Matching fibers of the same type are
//! reused through the alternate pool; everything else is created fresh.

use std::rc::Rc;

use crate::collections::map::HashMap;
use crate::element::{Coroutine, Element, Key, Node, Yield};
use crate::error::ReconcileError;
use crate::fiber::{EffectTag, FiberId, FiberProps, FiberTag, Priority};
use crate::host::HostConfig;
use crate::reconciler::Reconciler;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum ChildKey {
    Key(Key),
    Index(usize),
}

impl ChildKey {
    fn new(key: Option<&Key>, index: usize) -> Self {
        match key {
            Some(key) => ChildKey::Key(Rc::clone(key)),
            None => ChildKey::Index(index),
        }
    }
}

fn node_key(node: &Node) -> Option<&Key> {
    match node {
        Node::Element(element) => element.key.as_ref(),
        Node::Coroutine(coroutine) => coroutine.key.as_ref(),
        Node::Yield(yielded) => yielded.key.as_ref(),
        Node::Text(_) | Node::Fragment(_) | Node::Empty => None,
    }
}

struct ChildPass {
    parent: FiberId,
    priority: Priority,
    /// Only a parent with a committed counterpart records placements and
    /// deletions; a fresh subtree is inserted as a whole.
    track_side_effects: bool,
    /// Uncommitted fibers from an aborted attempt that may be picked up again.
    resumable: HashMap<ChildKey, FiberId>,
}

impl<H: HostConfig> Reconciler<H> {
    pub(crate) fn reconcile_child_fibers(
        &mut self,
        parent: FiberId,
        old_first: Option<FiberId>,
        progressed: Option<FiberId>,
        new_child: &Node,
        priority: Priority,
        track_side_effects: bool,
    ) -> Result<Option<FiberId>, ReconcileError> {
        let children: &[Node] = match new_child {
            Node::Fragment(nodes) => nodes,
            Node::Empty => &[],
            other => std::slice::from_ref(other),
        };
        let mut pass = ChildPass {
            parent,
            priority,
            track_side_effects,
            resumable: self.resumable_children(progressed),
        };
        let result = self.reconcile_children_array(&mut pass, old_first, children)?;
        Ok(self.fibers.link_children(parent, &result))
    }

    fn resumable_children(&self, progressed: Option<FiberId>) -> HashMap<ChildKey, FiberId> {
        let mut resumable = HashMap::default();
        let mut next = progressed;
        while let Some(id) = next {
            let Some(fiber) = self.fibers.get(id) else {
                break;
            };
            if fiber.alternate.is_none() && self.fibers.is_uncommitted(id) {
                resumable.insert(ChildKey::new(fiber.key.as_ref(), fiber.index), id);
            }
            next = fiber.sibling;
        }
        resumable
    }

    fn reconcile_children_array(
        &mut self,
        pass: &mut ChildPass,
        old_first: Option<FiberId>,
        new_children: &[Node],
    ) -> Result<Vec<FiberId>, ReconcileError> {
        let mut result = Vec::with_capacity(new_children.len());
        let mut old_fiber = old_first;
        let mut last_placed_index = 0;
        let mut new_index = 0;

        while let Some(old) = old_fiber {
            if new_index >= new_children.len() {
                break;
            }
            let (slot, next_old) = if self.fibers[old].index > new_index {
                (None, Some(old))
            } else {
                (Some(old), self.fibers[old].sibling)
            };
            let Some(new_fiber) = self.update_slot(pass, slot, &new_children[new_index], new_index)? else {
                if slot.is_none() {
                    old_fiber = next_old;
                }
                break;
            };
            if pass.track_side_effects {
                if let Some(slot) = slot {
                    if self.fibers[new_fiber].alternate.is_none() {
                        self.delete_child(pass, slot);
                    }
                }
            }
            last_placed_index = self.place_child(pass, new_fiber, last_placed_index, new_index);
            result.push(new_fiber);
            old_fiber = next_old;
            new_index += 1;
        }

        if new_index == new_children.len() {
            self.delete_remaining_children(pass, old_fiber);
            return Ok(result);
        }

        if old_fiber.is_none() {
            for (index, child) in new_children.iter().enumerate().skip(new_index) {
                let Some(new_fiber) = self.create_child(pass, child, index)? else {
                    continue;
                };
                last_placed_index = self.place_child(pass, new_fiber, last_placed_index, index);
                result.push(new_fiber);
            }
            return Ok(result);
        }

        let mut existing = self.map_remaining_children(old_fiber);
        for (index, child) in new_children.iter().enumerate().skip(new_index) {
            let key = ChildKey::new(node_key(child), index);
            let matched = existing.get(&key).copied();
            let Some(new_fiber) = self.update_from_map(pass, matched, child, index)? else {
                continue;
            };
            if pass.track_side_effects && self.fibers[new_fiber].alternate.is_some() {
                existing.remove(&key);
            }
            last_placed_index = self.place_child(pass, new_fiber, last_placed_index, index);
            result.push(new_fiber);
        }

        if pass.track_side_effects {
            let mut leftovers: Vec<FiberId> = existing.into_values().collect();
            leftovers.sort_by_key(|id| self.fibers[*id].index);
            for child in leftovers {
                self.delete_child(pass, child);
            }
        }
        Ok(result)
    }

    fn map_remaining_children(&self, first: Option<FiberId>) -> HashMap<ChildKey, FiberId> {
        let mut existing = HashMap::default();
        let mut next = first;
        while let Some(id) = next {
            let fiber = &self.fibers[id];
            existing.insert(ChildKey::new(fiber.key.as_ref(), fiber.index), id);
            next = fiber.sibling;
        }
        existing
    }

    /// Reuses `old` for `child` when their keys agree; `None` ends the
    /// in-order pass.
    fn update_slot(
        &mut self,
        pass: &mut ChildPass,
        old: Option<FiberId>,
        child: &Node,
        index: usize,
    ) -> Result<Option<FiberId>, ReconcileError> {
        let old_key = old.and_then(|old| self.fibers[old].key.clone());
        if matches!(child, Node::Empty) || node_key(child) != old_key.as_ref() {
            return Ok(None);
        }
        self.update_from_map(pass, old, child, index)
    }

    fn update_from_map(
        &mut self,
        pass: &mut ChildPass,
        matched: Option<FiberId>,
        child: &Node,
        index: usize,
    ) -> Result<Option<FiberId>, ReconcileError> {
        let fiber = match child {
            Node::Empty => return Ok(None),
            Node::Text(text) => self.update_text_node(pass, matched, text),
            Node::Element(element) => self.update_element(pass, matched, element, index)?,
            Node::Fragment(nodes) => self.update_fragment_node(pass, matched, nodes),
            Node::Coroutine(coroutine) => self.update_coroutine_node(pass, matched, coroutine),
            Node::Yield(yielded) => self.update_yield_node(pass, matched, yielded),
        };
        Ok(Some(fiber))
    }

    fn create_child(
        &mut self,
        pass: &mut ChildPass,
        child: &Node,
        index: usize,
    ) -> Result<Option<FiberId>, ReconcileError> {
        self.update_from_map(pass, None, child, index)
    }

    fn use_fiber(&mut self, pass: &ChildPass, fiber: FiberId, props: FiberProps) -> FiberId {
        let clone = self.fibers.clone_to_work_in_progress(fiber, pass.priority);
        let fiber = &mut self.fibers[clone];
        fiber.index = 0;
        fiber.sibling = None;
        fiber.pending_props = Some(props);
        clone
    }

    fn reusable(&self, old: Option<FiberId>, tag: FiberTag) -> Option<FiberId> {
        old.filter(|old| self.fibers[*old].tag == tag)
    }

    fn update_text_node(&mut self, pass: &mut ChildPass, old: Option<FiberId>, text: &Rc<str>) -> FiberId {
        match self.reusable(old, FiberTag::HostText) {
            Some(old) => self.use_fiber(pass, old, FiberProps::Text(Rc::clone(text))),
            None => self.fibers.create_fiber_from_text(text, pass.priority),
        }
    }

    fn update_element(
        &mut self,
        pass: &mut ChildPass,
        old: Option<FiberId>,
        element: &Element,
        index: usize,
    ) -> Result<FiberId, ReconcileError> {
        let reused = old.filter(|old| self.fibers[*old].ty.matches(&element.ty));
        let fiber = match reused {
            Some(old) => self.use_fiber(pass, old, FiberProps::Element(Rc::clone(&element.props))),
            None => match self.resume_child(pass, element, index) {
                Some(resumed) => resumed,
                None => self.fibers.create_fiber_from_element(element, pass.priority)?,
            },
        };
        self.fibers[fiber].ref_ = element.ref_.clone();
        Ok(fiber)
    }

    /// Picks up a fiber an aborted pass created for the same slot so its
    /// instance can be resumed rather than constructed again.
    fn resume_child(&mut self, pass: &mut ChildPass, element: &Element, index: usize) -> Option<FiberId> {
        let key = ChildKey::new(element.key.as_ref(), index);
        let candidate = *pass.resumable.get(&key)?;
        if !self.fibers[candidate].ty.matches(&element.ty) {
            return None;
        }
        pass.resumable.remove(&key);
        self.fibers.reset_effects(candidate);
        let fiber = &mut self.fibers[candidate];
        fiber.pending_props = Some(FiberProps::Element(Rc::clone(&element.props)));
        fiber.pending_work_priority = pass.priority;
        fiber.index = 0;
        fiber.sibling = None;
        log::trace!("resuming {candidate:?} from an earlier attempt");
        Some(candidate)
    }

    fn update_fragment_node(&mut self, pass: &mut ChildPass, old: Option<FiberId>, nodes: &Rc<[Node]>) -> FiberId {
        match self.reusable(old, FiberTag::Fragment) {
            Some(old) => self.use_fiber(pass, old, FiberProps::Fragment(Rc::clone(nodes))),
            None => self.fibers.create_fiber_from_fragment(nodes, pass.priority),
        }
    }

    fn update_coroutine_node(
        &mut self,
        pass: &mut ChildPass,
        old: Option<FiberId>,
        coroutine: &Rc<Coroutine>,
    ) -> FiberId {
        let reused = old.filter(|old| {
            matches!(
                self.fibers[*old].tag,
                FiberTag::CoroutineComponent | FiberTag::CoroutineHandlerPhase
            )
        });
        match reused {
            Some(old) => self.use_fiber(pass, old, FiberProps::Coroutine(Rc::clone(coroutine))),
            None => self.fibers.create_fiber_from_coroutine(coroutine, pass.priority),
        }
    }

    fn update_yield_node(&mut self, pass: &mut ChildPass, old: Option<FiberId>, yielded: &Rc<Yield>) -> FiberId {
        match self.reusable(old, FiberTag::YieldComponent) {
            Some(old) => self.use_fiber(pass, old, FiberProps::Yield(Rc::clone(yielded))),
            None => self.fibers.create_fiber_from_yield(yielded, pass.priority),
        }
    }

    fn place_child(&mut self, pass: &ChildPass, fiber: FiberId, last_placed_index: usize, new_index: usize) -> usize {
        self.fibers[fiber].index = new_index;
        if !pass.track_side_effects {
            return last_placed_index;
        }
        let old_index = self.fibers[fiber]
            .alternate
            .and_then(|current| self.fibers.get(current))
            .map(|current| current.index);
        match old_index {
            Some(old_index) if old_index >= last_placed_index => old_index,
            _ => {
                // New, or moved behind a child that stayed in place.
                self.fibers[fiber].effect_tag |= EffectTag::PLACEMENT;
                last_placed_index
            }
        }
    }

    /// Tags `child` for deletion and appends it to the parent's effect list
    /// right away; the deleted fiber is never visited by the render pass.
    fn delete_child(&mut self, pass: &ChildPass, child: FiberId) {
        if !pass.track_side_effects {
            return;
        }
        let parent = pass.parent;
        match self.fibers[parent].last_effect {
            Some(tail) => self.fibers[tail].next_effect = Some(child),
            None => self.fibers[parent].first_effect = Some(child),
        }
        self.fibers[parent].last_effect = Some(child);
        let fiber = &mut self.fibers[child];
        fiber.next_effect = None;
        fiber.effect_tag = EffectTag::DELETION;
    }

    fn delete_remaining_children(&mut self, pass: &ChildPass, first: Option<FiberId>) {
        if !pass.track_side_effects {
            return;
        }
        let mut next = first;
        while let Some(child) = next {
            next = self.fibers[child].sibling;
            self.delete_child(pass, child);
        }
    }
}
