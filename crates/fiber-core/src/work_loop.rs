//! Drives render passes: picks the most urgent root, walks its
//! work-in-progress tree one unit at a time and commits finished trees.

use std::cell::RefCell;
use std::mem;
use std::rc::Rc;

use crate::error::ReconcileError;
use crate::fiber::{FiberId, FiberProps, FiberTag, Priority, StateNode};
use crate::host::HostConfig;
use crate::platform::{Deadline, TIME_HEURISTIC_MS};
use crate::reconciler::{InProgress, Reconciler, RootId};
use crate::runtime::{UpdateKind, UpdateRequest};
use crate::update_queue::UpdateQueue;

impl<H: HostConfig> Reconciler<H> {
    /// Applies queued component updates and performs all synchronous and
    /// task priority work.
    pub fn flush_sync_work(&mut self) -> Result<(), ReconcileError> {
        self.perform_work(Priority::Task, None)
    }

    /// Entry point for the platform's animation callback. Performs work up
    /// to animation priority without a deadline.
    pub fn perform_animation_work(&mut self) -> Result<(), ReconcileError> {
        self.perform_work(Priority::Animation, None)
    }

    /// Entry point for the platform's idle callback. Performs work of any
    /// priority until `deadline` runs out, then asks for another callback.
    pub fn perform_deferred_work(&mut self, deadline: &dyn Deadline) -> Result<(), ReconcileError> {
        self.perform_work(Priority::Offscreen, Some(deadline))
    }

    pub(crate) fn schedule_work(&mut self, root: RootId, priority: Priority) -> Result<(), ReconcileError> {
        if priority == Priority::NoWork {
            return Ok(());
        }
        let record = self.root_mut(root)?;
        record.pending_priority = record.pending_priority.most_urgent(priority);
        log::debug!("scheduled {priority:?} work on {root:?}");
        if priority <= Priority::Task {
            if !self.runtime.is_batching() && !self.is_performing_work {
                return self.flush_sync_work();
            }
            return Ok(());
        }
        self.runtime.request_callback(priority);
        Ok(())
    }

    fn perform_work(&mut self, ceiling: Priority, deadline: Option<&dyn Deadline>) -> Result<(), ReconcileError> {
        if self.is_performing_work {
            return Err(ReconcileError::Reentrant);
        }
        self.is_performing_work = true;
        let result = self.work_loop(ceiling, deadline);
        self.is_performing_work = false;
        if let Err(err) = &result {
            log::debug!("render pass failed: {err}");
            self.abort_render(false);
        }
        self.request_remaining_callbacks();
        result
    }

    fn work_loop(&mut self, ceiling: Priority, deadline: Option<&dyn Deadline>) -> Result<(), ReconcileError> {
        loop {
            self.apply_pending_updates();
            let next = self.next_scheduled_root();

            let in_progress = self.in_progress.as_ref().map(|work| work.priority);
            if let (Some(current), Some((_, candidate))) = (in_progress, next) {
                if candidate.is_more_urgent_than(current) {
                    log::debug!("{candidate:?} work preempts the {current:?} render in progress");
                    self.abort_render(true);
                }
            }

            match self.in_progress.as_ref().map(|work| work.priority) {
                Some(priority) if !priority.is_within(ceiling) => return Ok(()),
                Some(_) => {}
                None => match next {
                    Some((root, priority)) if priority.is_within(ceiling) => {
                        self.start_render(root, priority)?;
                    }
                    _ => return Ok(()),
                },
            }

            while let Some(unit) = self.next_unit_of_work {
                if let Some(deadline) = deadline {
                    if deadline.time_remaining_ms() <= TIME_HEURISTIC_MS {
                        log::trace!("deadline reached, yielding before {unit:?}");
                        return Ok(());
                    }
                }
                self.next_unit_of_work = self.perform_unit_of_work(unit)?;
            }

            self.commit_root()?;
        }
    }

    /// The root with the most urgent pending work; ties go to the oldest.
    fn next_scheduled_root(&self) -> Option<(RootId, Priority)> {
        let mut best: Option<(RootId, Priority)> = None;
        for root in self.roots.iter().flatten() {
            let priority = root.pending_priority;
            let Some(StateNode::Root(id)) = self.fibers.get(root.current).map(|f| &f.state_node) else {
                continue;
            };
            let better = match best {
                Some((_, existing)) => priority.is_more_urgent_than(existing),
                None => priority != Priority::NoWork,
            };
            if better {
                best = Some((*id, priority));
            }
        }
        best
    }

    fn start_render(&mut self, root: RootId, priority: Priority) -> Result<(), ReconcileError> {
        let record = self.root_mut(root)?;
        record.pending_priority = Priority::NoWork;
        let element = record.pending_element.take();
        let callbacks = mem::take(&mut record.pending_callbacks);
        let current = record.current;

        self.context.reset();
        let wip_root = self.fibers.clone_to_work_in_progress(current, priority);
        if let Some(element) = &element {
            self.fibers[wip_root].pending_props = Some(FiberProps::Root(element.clone()));
        }
        log::debug!("starting {priority:?} render of {root:?}");
        self.in_progress = Some(InProgress {
            root,
            priority,
            wip_root,
            element,
            callbacks,
        });
        self.next_unit_of_work = Some(wip_root);
        Ok(())
    }

    /// Drops the render in progress. With `requeue`, its root gets the
    /// abandoned element, callbacks and priority back so it is rendered
    /// again later. Fibers created by the pass stay around so a later pass
    /// can resume them; unclaimed ones are reclaimed at the next commit.
    pub(crate) fn abort_render(&mut self, requeue: bool) {
        self.next_unit_of_work = None;
        self.context.reset();
        let Some(work) = self.in_progress.take() else {
            return;
        };
        if !requeue {
            return;
        }
        if let Ok(record) = self.root_mut(work.root) {
            record.pending_priority = record.pending_priority.most_urgent(work.priority);
            if record.pending_element.is_none() {
                record.pending_element = work.element;
            }
            let mut callbacks = work.callbacks;
            callbacks.append(&mut record.pending_callbacks);
            record.pending_callbacks = callbacks;
        }
    }

    fn request_remaining_callbacks(&self) {
        let remaining = self
            .roots
            .iter()
            .flatten()
            .map(|root| root.pending_priority)
            .chain(self.in_progress.as_ref().map(|work| work.priority))
            .fold(Priority::NoWork, Priority::most_urgent);
        let remaining = if remaining <= Priority::Task && remaining != Priority::NoWork {
            // Synchronous work left behind by a deadline or a ceiling runs on
            // the next animation callback.
            Priority::Animation
        } else {
            remaining
        };
        self.runtime.request_callback(remaining);
    }

    fn perform_unit_of_work(&mut self, unit: FiberId) -> Result<Option<FiberId>, ReconcileError> {
        let current = self.fibers[unit].alternate;
        let priority = self.render_priority();
        log::trace!("begin work on {:?} {unit:?}", self.fibers[unit].tag);
        if let Some(next) = self.begin_work(current, unit, priority)? {
            return Ok(Some(next));
        }
        self.complete_unit_of_work(unit)
    }

    /// Completes `unit` and its ancestors until one of them has a sibling
    /// left to work on. Effects of each completed fiber are appended to its
    /// parent's list, children first.
    fn complete_unit_of_work(&mut self, unit: FiberId) -> Result<Option<FiberId>, ReconcileError> {
        let mut work = unit;
        loop {
            let current = self.fibers[work].alternate;
            log::trace!("complete work on {:?} {work:?}", self.fibers[work].tag);
            if let Some(next) = self.complete_work(current, work)? {
                return Ok(Some(next));
            }
            self.reset_work_priority(work);
            self.fibers[work].pending_props = None;

            let parent = self.fibers[work].parent;
            let sibling = self.fibers[work].sibling;
            let is_root = self
                .in_progress
                .as_ref()
                .is_some_and(|progress| progress.wip_root == work);
            if is_root {
                return Ok(None);
            }
            if let Some(parent) = parent {
                self.append_effects_to_parent(work, parent);
            }
            if sibling.is_some() {
                return Ok(sibling);
            }
            match parent {
                Some(parent) => work = parent,
                None => return Ok(None),
            }
        }
    }

    fn append_effects_to_parent(&mut self, work: FiberId, parent: FiberId) {
        let (first, last, tagged) = {
            let fiber = &self.fibers[work];
            (fiber.first_effect, fiber.last_effect, !fiber.effect_tag.is_empty())
        };
        if let (Some(first), Some(last)) = (first, last) {
            self.link_effect(parent, first, last);
        }
        if tagged {
            self.link_effect(parent, work, work);
        }
    }

    fn link_effect(&mut self, parent: FiberId, first: FiberId, last: FiberId) {
        match self.fibers[parent].last_effect {
            Some(tail) => self.fibers[tail].next_effect = Some(first),
            None => self.fibers[parent].first_effect = Some(first),
        }
        self.fibers[parent].last_effect = Some(last);
        if first == last {
            self.fibers[last].next_effect = None;
        }
    }

    /// Leaves on `work` only the priority of work deferred within its
    /// subtree, so the root learns what is still pending after commit.
    fn reset_work_priority(&mut self, work: FiberId) {
        let mut remaining = self.fibers[work].pending_work_priority;
        for child in self.fibers.all_children(work) {
            remaining = remaining.most_urgent(self.fibers[child].pending_work_priority);
        }
        self.fibers[work].pending_work_priority = remaining;
    }

    fn apply_pending_updates(&mut self) {
        for request in self.runtime.take_updates() {
            let UpdateRequest { fiber, priority, kind } = request;
            if !self.fibers.contains(fiber) {
                log::warn!("ignoring update for an unmounted component ({fiber:?})");
                continue;
            }
            self.enqueue_update_on_fiber(fiber, kind);
            self.schedule_update(fiber, priority);
        }
    }

    /// Applies updates issued for `fiber` while one of its own hooks ran.
    /// They are folded by the caller right away instead of scheduling work.
    pub(crate) fn drain_updates_for(&mut self, fiber: FiberId) {
        let mut targets = vec![fiber];
        targets.extend(self.fibers[fiber].alternate);
        for request in self.runtime.take_updates_for(&targets) {
            self.enqueue_update_on_fiber(fiber, request.kind);
        }
    }

    /// Records `kind` on the queue shared by `fiber` and its alternate.
    pub(crate) fn enqueue_update_on_fiber(&mut self, fiber: FiberId, kind: UpdateKind) {
        let alternate = self.fibers[fiber].alternate;
        let existing = self.fibers[fiber].update_queue.clone().or_else(|| {
            alternate
                .and_then(|alternate| self.fibers.get(alternate))
                .and_then(|fiber| fiber.update_queue.clone())
        });
        let queue = existing.unwrap_or_else(|| Rc::new(RefCell::new(UpdateQueue::default())));
        {
            let mut queue = queue.borrow_mut();
            match kind {
                UpdateKind::SetState(partial) => queue.append(Some(partial)),
                UpdateKind::ReplaceState(state) => queue.append_replace(state),
                UpdateKind::ForceUpdate => queue.force(),
                UpdateKind::Callback(callback) => queue.append_callback(callback),
            }
        }
        self.fibers[fiber].update_queue = Some(Rc::clone(&queue));
        if let Some(alternate) = alternate.and_then(|alternate| self.fibers.get_mut(alternate)) {
            alternate.update_queue = Some(queue);
        }
    }

    /// Marks `fiber` and every ancestor, in both buffers, as having work at
    /// `priority` and records it on the owning root.
    fn schedule_update(&mut self, fiber: FiberId, priority: Priority) {
        let mut node = Some(fiber);
        let mut root = None;
        while let Some(id) = node {
            let Some(current) = self.fibers.get_mut(id) else {
                break;
            };
            current.pending_work_priority = current.pending_work_priority.most_urgent(priority);
            if let (FiberTag::HostContainer, StateNode::Root(id)) = (current.tag, &current.state_node) {
                root = Some(*id);
            }
            node = current.parent;
            let alternate = current.alternate;
            if let Some(alternate) = alternate.and_then(|alternate| self.fibers.get_mut(alternate)) {
                alternate.pending_work_priority = alternate.pending_work_priority.most_urgent(priority);
            }
        }
        match root.and_then(|root| self.root_mut(root).ok()) {
            Some(record) => {
                record.pending_priority = record.pending_priority.most_urgent(priority);
            }
            None => log::warn!("update scheduled on a component that is not mounted ({fiber:?})"),
        }
    }
}
