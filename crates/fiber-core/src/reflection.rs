//! Queries about where a component instance sits in the committed tree.

use crate::error::InvariantError;
use crate::fiber::{EffectTag, FiberId, FiberStore, FiberTag};
use crate::host::HostConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MountState {
    /// Part of a tree that has not been inserted yet.
    Mounting,
    Mounted,
    Unmounted,
}

pub fn mount_state<H: HostConfig>(fibers: &FiberStore<H>, fiber: FiberId) -> MountState {
    let Some(mut node) = fibers.get(fiber) else {
        return MountState::Unmounted;
    };
    let fresh = node.alternate.is_none();
    if fresh && node.effect_tag.contains(EffectTag::PLACEMENT) {
        return MountState::Mounting;
    }
    while let Some(parent) = node.parent.and_then(|parent| fibers.get(parent)) {
        node = parent;
        if fresh && node.effect_tag.contains(EffectTag::PLACEMENT) {
            return MountState::Mounting;
        }
    }
    if node.tag == FiberTag::HostContainer {
        MountState::Mounted
    } else {
        MountState::Unmounted
    }
}

pub fn is_fiber_mounted<H: HostConfig>(fibers: &FiberStore<H>, fiber: FiberId) -> bool {
    mount_state(fibers, fiber) == MountState::Mounted
}

/// First host fiber rendered by `fiber`, searching depth first along the
/// host-visible path. Callers resolve `fiber` to the committed buffer first
/// (see `Reconciler::find_host_instance`).
pub(crate) fn find_current_host_fiber<H: HostConfig>(
    fibers: &FiberStore<H>,
    fiber: FiberId,
) -> Result<Option<FiberId>, InvariantError> {
    match mount_state(fibers, fiber) {
        MountState::Unmounted => return Err(InvariantError::UnmountedComponent),
        MountState::Mounting => return Ok(None),
        MountState::Mounted => {}
    }

    // Each fiber is entered once; anything beyond that means the links
    // form a cycle.
    let mut budget = fibers.len() + 1;
    let mut node = fiber;
    loop {
        budget = budget.checked_sub(1).ok_or(InvariantError::ReflectionLoop)?;
        let current = &fibers[node];
        if current.tag.is_host() {
            return Ok(Some(node));
        }
        if let Some(child) = current.host_child() {
            node = child;
            continue;
        }
        if node == fiber {
            return Ok(None);
        }
        while fibers[node].sibling.is_none() {
            match fibers[node].parent {
                Some(parent) if parent != fiber => node = parent,
                _ => return Ok(None),
            }
        }
        match fibers[node].sibling {
            Some(sibling) => node = sibling,
            None => return Ok(None),
        }
    }
}
