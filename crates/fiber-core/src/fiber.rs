//! Fibers and the arena that owns them.
//!
//! Each fiber is a unit of work with `parent`/`child`/`sibling` links. A
//! committed fiber may be paired with an `alternate` that serves as its
//! work-in-progress copy; the pair swaps roles on every commit, so at most
//! two versions of any fiber exist at once.

use std::fmt;
use std::ops::{Index, IndexMut};
use std::rc::Rc;

use bitflags::bitflags;

use crate::collections::map::HashSet;
use crate::component::{ClassRef, ComponentClass, FunctionComponent, State};
use crate::element::{Coroutine, CoroutineHandler, Element, ElementType, Key, Node, Props, Ref, Yield};
use crate::error::ConfigError;
use crate::host::HostConfig;
use crate::reconciler::RootId;
use crate::update_queue::SharedQueue;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FiberTag {
    /// A function component that has not rendered yet.
    IndeterminateComponent,
    FunctionalComponent,
    ClassComponent,
    HostContainer,
    HostComponent,
    HostText,
    CoroutineComponent,
    CoroutineHandlerPhase,
    YieldComponent,
    Fragment,
}

impl FiberTag {
    pub fn is_host(self) -> bool {
        matches!(self, FiberTag::HostComponent | FiberTag::HostText)
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct EffectTag: u8 {
        const PLACEMENT = 1 << 0;
        const UPDATE = 1 << 1;
        const DELETION = 1 << 2;
        const CALLBACK = 1 << 3;
    }
}

/// Urgency of pending work. `NoWork` means nothing is pending; among the
/// others, a smaller variant is more urgent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    #[default]
    NoWork,
    Synchronous,
    Task,
    Animation,
    High,
    Low,
    Offscreen,
}

impl Priority {
    pub fn is_more_urgent_than(self, other: Priority) -> bool {
        self != Priority::NoWork && (other == Priority::NoWork || self < other)
    }

    /// The more urgent of the two, treating `NoWork` as absent.
    pub fn most_urgent(self, other: Priority) -> Priority {
        if other.is_more_urgent_than(self) {
            other
        } else {
            self
        }
    }

    /// Whether work at this priority may run in a pass limited to `ceiling`.
    pub fn is_within(self, ceiling: Priority) -> bool {
        self != Priority::NoWork && self <= ceiling
    }
}

/// Generational index into a [`FiberStore`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FiberId {
    index: u32,
    generation: u32,
}

impl FiberId {
    pub fn index(self) -> usize {
        self.index as usize
    }
}

impl fmt::Debug for FiberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FiberId({}v{})", self.index, self.generation)
    }
}

#[derive(Clone, Default)]
pub enum FiberType {
    #[default]
    None,
    Host(Rc<str>),
    Class(Rc<ComponentClass>),
    Function(Rc<FunctionComponent>),
    Coroutine(CoroutineHandler),
}

impl FiberType {
    pub(crate) fn matches(&self, ty: &ElementType) -> bool {
        match (self, ty) {
            (FiberType::Host(a), ElementType::Host(b)) => a == b,
            (FiberType::Class(a), ElementType::Class(b)) => Rc::ptr_eq(a, b),
            (FiberType::Function(a), ElementType::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn name(&self) -> Option<Rc<str>> {
        match self {
            FiberType::Host(tag) => Some(Rc::clone(tag)),
            FiberType::Class(class) => Some(Rc::clone(class.name())),
            FiberType::Function(function) => Some(Rc::clone(function.name())),
            FiberType::None | FiberType::Coroutine(_) => None,
        }
    }
}

impl fmt::Debug for FiberType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FiberType::None => f.write_str("None"),
            FiberType::Coroutine(_) => f.write_str("Coroutine"),
            other => f.write_str(&other.name().unwrap_or_default()),
        }
    }
}

/// Inputs of a fiber. Compared by identity to decide whether work can be
/// skipped, except text which compares by value.
#[derive(Clone)]
pub enum FiberProps {
    Root(Node),
    Element(Rc<Props>),
    Text(Rc<str>),
    Fragment(Rc<[Node]>),
    Coroutine(Rc<Coroutine>),
    Yield(Rc<Yield>),
}

impl FiberProps {
    pub fn same(&self, other: &FiberProps) -> bool {
        match (self, other) {
            (FiberProps::Root(a), FiberProps::Root(b)) => a.shallow_eq(b),
            (FiberProps::Element(a), FiberProps::Element(b)) => Rc::ptr_eq(a, b),
            (FiberProps::Text(a), FiberProps::Text(b)) => a == b,
            (FiberProps::Fragment(a), FiberProps::Fragment(b)) => Rc::ptr_eq(a, b),
            (FiberProps::Coroutine(a), FiberProps::Coroutine(b)) => Rc::ptr_eq(a, b),
            (FiberProps::Yield(a), FiberProps::Yield(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn as_element(&self) -> Option<&Rc<Props>> {
        match self {
            FiberProps::Element(props) => Some(props),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&Rc<str>> {
        match self {
            FiberProps::Text(text) => Some(text),
            _ => None,
        }
    }
}

pub enum StateNode<H: HostConfig> {
    None,
    Class(ClassRef),
    Host(H::HostNode),
    Root(RootId),
    /// First fiber of the handler phase output.
    Coroutine(Option<FiberId>),
}

impl<H: HostConfig> Clone for StateNode<H> {
    fn clone(&self) -> Self {
        match self {
            StateNode::None => StateNode::None,
            StateNode::Class(class) => StateNode::Class(Rc::clone(class)),
            StateNode::Host(node) => StateNode::Host(node.clone()),
            StateNode::Root(root) => StateNode::Root(*root),
            StateNode::Coroutine(child) => StateNode::Coroutine(*child),
        }
    }
}

impl<H: HostConfig> StateNode<H> {
    pub(crate) fn class(&self) -> Option<&ClassRef> {
        match self {
            StateNode::Class(class) => Some(class),
            _ => None,
        }
    }

    pub(crate) fn host(&self) -> Option<&H::HostNode> {
        match self {
            StateNode::Host(node) => Some(node),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, StateNode::None)
    }
}

pub struct Fiber<H: HostConfig> {
    pub(crate) tag: FiberTag,
    pub(crate) key: Option<Key>,
    pub(crate) ty: FiberType,
    pub(crate) state_node: StateNode<H>,

    pub(crate) parent: Option<FiberId>,
    pub(crate) child: Option<FiberId>,
    pub(crate) sibling: Option<FiberId>,
    pub(crate) index: usize,
    /// Children left behind by an earlier, uncommitted attempt at this fiber.
    pub(crate) progressed_child: Option<FiberId>,

    pub(crate) ref_: Option<Ref>,

    pub(crate) pending_props: Option<FiberProps>,
    pub(crate) memoized_props: Option<FiberProps>,
    pub(crate) update_queue: Option<SharedQueue>,
    pub(crate) memoized_state: Option<State>,
    pub(crate) callback_list: Option<SharedQueue>,
    /// Records of `update_queue` folded by the current render.
    pub(crate) processed_updates: usize,
    /// Host nodes this fiber contributes to its nearest host parent.
    pub(crate) output: Rc<[H::HostNode]>,

    pub(crate) effect_tag: EffectTag,
    pub(crate) next_effect: Option<FiberId>,
    pub(crate) first_effect: Option<FiberId>,
    pub(crate) last_effect: Option<FiberId>,

    pub(crate) pending_work_priority: Priority,
    pub(crate) alternate: Option<FiberId>,
}

impl<H: HostConfig> Fiber<H> {
    fn new(tag: FiberTag, key: Option<Key>) -> Self {
        Self {
            tag,
            key,
            ty: FiberType::None,
            state_node: StateNode::None,
            parent: None,
            child: None,
            sibling: None,
            index: 0,
            progressed_child: None,
            ref_: None,
            pending_props: None,
            memoized_props: None,
            update_queue: None,
            memoized_state: None,
            callback_list: None,
            processed_updates: 0,
            output: Rc::from(Vec::new()),
            effect_tag: EffectTag::empty(),
            next_effect: None,
            first_effect: None,
            last_effect: None,
            pending_work_priority: Priority::NoWork,
            alternate: None,
        }
    }

    pub fn tag(&self) -> FiberTag {
        self.tag
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub fn ty(&self) -> &FiberType {
        &self.ty
    }

    pub fn state_node(&self) -> &StateNode<H> {
        &self.state_node
    }

    pub fn parent(&self) -> Option<FiberId> {
        self.parent
    }

    pub fn child(&self) -> Option<FiberId> {
        self.child
    }

    pub fn sibling(&self) -> Option<FiberId> {
        self.sibling
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn alternate(&self) -> Option<FiberId> {
        self.alternate
    }

    pub fn effect_tag(&self) -> EffectTag {
        self.effect_tag
    }

    pub fn pending_work_priority(&self) -> Priority {
        self.pending_work_priority
    }

    pub fn memoized_props(&self) -> Option<&FiberProps> {
        self.memoized_props.as_ref()
    }

    pub fn memoized_state(&self) -> Option<&State> {
        self.memoized_state.as_ref()
    }

    pub fn has_update_queue(&self) -> bool {
        self.update_queue.is_some()
    }

    /// Pending props when present, otherwise the last rendered ones.
    pub(crate) fn effective_props(&self) -> Option<&FiberProps> {
        self.pending_props.as_ref().or(self.memoized_props.as_ref())
    }

    /// First child on the host-visible path: the handler output of a
    /// coroutine, the regular child for everything else.
    pub(crate) fn host_child(&self) -> Option<FiberId> {
        match (&self.tag, &self.state_node) {
            (FiberTag::CoroutineComponent | FiberTag::CoroutineHandlerPhase, StateNode::Coroutine(child)) => {
                *child
            }
            (FiberTag::CoroutineComponent | FiberTag::CoroutineHandlerPhase, _) => None,
            _ => self.child,
        }
    }

    pub(crate) fn is_context_provider(&self) -> bool {
        self.tag == FiberTag::ClassComponent
            && self
                .state_node
                .class()
                .is_some_and(|class| class.borrow().component.is_context_provider())
    }

    fn reset_effects(&mut self) {
        self.effect_tag = EffectTag::empty();
        self.next_effect = None;
        self.first_effect = None;
        self.last_effect = None;
    }
}

impl<H: HostConfig> fmt::Debug for Fiber<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fiber")
            .field("tag", &self.tag)
            .field("key", &self.key)
            .field("ty", &self.ty)
            .field("parent", &self.parent)
            .field("child", &self.child)
            .field("sibling", &self.sibling)
            .field("index", &self.index)
            .field("effect_tag", &self.effect_tag)
            .field("pending_work_priority", &self.pending_work_priority)
            .field("alternate", &self.alternate)
            .finish()
    }
}

struct Slot<H: HostConfig> {
    generation: u32,
    fiber: Option<Fiber<H>>,
}

/// Arena owning every fiber. Released slots are recycled; ids from before a
/// release stop resolving.
pub struct FiberStore<H: HostConfig> {
    slots: Vec<Slot<H>>,
    free_list: Vec<u32>, // FUTURE(no_std): replace Vec with intrusive free list.
    live: usize,
    /// Allocations since the last commit.
    uncommitted: HashSet<FiberId>,
}

impl<H: HostConfig> Default for FiberStore<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: HostConfig> FiberStore<H> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            live: 0,
            uncommitted: HashSet::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn contains(&self, id: FiberId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: FiberId) -> Option<&Fiber<H>> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.fiber.as_ref())
    }

    pub fn get_mut(&mut self, id: FiberId) -> Option<&mut Fiber<H>> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.fiber.as_mut())
    }

    fn allocate(&mut self, fiber: Fiber<H>) -> FiberId {
        self.live += 1;
        let id = if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.fiber = Some(fiber);
            FiberId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                fiber: Some(fiber),
            });
            FiberId {
                index,
                generation: 0,
            }
        };
        self.uncommitted.insert(id);
        id
    }

    /// Frees a fiber slot and unlinks it from its alternate.
    pub(crate) fn release(&mut self, id: FiberId) {
        let Some(slot) = self.slots.get_mut(id.index()) else {
            return;
        };
        if slot.generation != id.generation {
            return;
        }
        let Some(fiber) = slot.fiber.take() else {
            return;
        };
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(id.index);
        self.live -= 1;
        if let Some(partner) = fiber.alternate.and_then(|alt| self.get_mut(alt)) {
            if partner.alternate == Some(id) {
                partner.alternate = None;
            }
        }
    }

    pub(crate) fn is_uncommitted(&self, id: FiberId) -> bool {
        self.uncommitted.contains(&id)
    }

    pub(crate) fn take_uncommitted(&mut self) -> Vec<FiberId> {
        self.uncommitted.drain().collect()
    }

    pub fn create_root_fiber(&mut self, root: RootId) -> FiberId {
        let mut fiber = Fiber::new(FiberTag::HostContainer, None);
        fiber.state_node = StateNode::Root(root);
        self.allocate(fiber)
    }

    pub fn create_fiber_from_element(
        &mut self,
        element: &Element,
        priority: Priority,
    ) -> Result<FiberId, ConfigError> {
        let (tag, ty) = match &element.ty {
            ElementType::Host(tag) => (FiberTag::HostComponent, FiberType::Host(Rc::clone(tag))),
            ElementType::Class(class) => (FiberTag::ClassComponent, FiberType::Class(Rc::clone(class))),
            ElementType::Function(function) => (
                FiberTag::IndeterminateComponent,
                FiberType::Function(Rc::clone(function)),
            ),
            ElementType::Continuation(fiber) => {
                return if self.contains(*fiber) {
                    Ok(*fiber)
                } else {
                    Err(ConfigError::UnknownElementType(format!(
                        "continuation {fiber:?} no longer exists"
                    )))
                };
            }
        };
        let mut fiber = Fiber::new(tag, element.key.clone());
        fiber.ty = ty;
        fiber.pending_props = Some(FiberProps::Element(Rc::clone(&element.props)));
        fiber.pending_work_priority = priority;
        Ok(self.allocate(fiber))
    }

    pub fn create_fiber_from_fragment(&mut self, nodes: &Rc<[Node]>, priority: Priority) -> FiberId {
        let mut fiber = Fiber::new(FiberTag::Fragment, None);
        fiber.pending_props = Some(FiberProps::Fragment(Rc::clone(nodes)));
        fiber.pending_work_priority = priority;
        self.allocate(fiber)
    }

    pub fn create_fiber_from_text(&mut self, text: &Rc<str>, priority: Priority) -> FiberId {
        let mut fiber = Fiber::new(FiberTag::HostText, None);
        fiber.pending_props = Some(FiberProps::Text(Rc::clone(text)));
        fiber.pending_work_priority = priority;
        self.allocate(fiber)
    }

    pub fn create_fiber_from_coroutine(&mut self, coroutine: &Rc<Coroutine>, priority: Priority) -> FiberId {
        let mut fiber = Fiber::new(FiberTag::CoroutineComponent, coroutine.key.clone());
        fiber.ty = FiberType::Coroutine(Rc::clone(&coroutine.handler));
        fiber.state_node = StateNode::Coroutine(None);
        fiber.pending_props = Some(FiberProps::Coroutine(Rc::clone(coroutine)));
        fiber.pending_work_priority = priority;
        self.allocate(fiber)
    }

    pub fn create_fiber_from_yield(&mut self, yielded: &Rc<Yield>, priority: Priority) -> FiberId {
        let mut fiber = Fiber::new(FiberTag::YieldComponent, yielded.key.clone());
        fiber.pending_props = Some(FiberProps::Yield(Rc::clone(yielded)));
        fiber.pending_work_priority = priority;
        self.allocate(fiber)
    }

    /// Returns the work-in-progress partner of `current`, allocating it on
    /// first use and recycling it afterwards. Calling it twice without a
    /// commit in between returns the same fiber.
    pub fn clone_to_work_in_progress(&mut self, current: FiberId, priority: Priority) -> FiberId {
        let source = &self[current];
        let tag = source.tag;
        let ty = source.ty.clone();
        let state_node = source.state_node.clone();
        let child = source.child;
        let sibling = source.sibling;
        let index = source.index;
        let ref_ = source.ref_.clone();
        let pending_props = source.pending_props.clone();
        let memoized_props = source.memoized_props.clone();
        let update_queue = source.update_queue.clone();
        let memoized_state = source.memoized_state.clone();
        let callback_list = source.callback_list.clone();
        let output = Rc::clone(&source.output);
        let existing = source.alternate;
        let key = source.key.clone();

        let work = match existing {
            Some(alternate) => {
                let stale_child = self[alternate]
                    .child
                    .filter(|stale| Some(*stale) != child && self.uncommitted.contains(stale));
                let fiber = &mut self[alternate];
                fiber.reset_effects();
                if stale_child.is_some() {
                    fiber.progressed_child = stale_child;
                }
                alternate
            }
            None => {
                let mut fiber = Fiber::new(tag, key);
                fiber.alternate = Some(current);
                let alternate = self.allocate(fiber);
                self[current].alternate = Some(alternate);
                alternate
            }
        };

        let fiber = &mut self[work];
        fiber.tag = tag;
        fiber.ty = ty;
        fiber.state_node = state_node;
        fiber.child = child;
        fiber.sibling = sibling;
        fiber.index = index;
        fiber.ref_ = ref_;
        fiber.pending_props = pending_props;
        fiber.memoized_props = memoized_props;
        fiber.update_queue = update_queue;
        fiber.memoized_state = memoized_state;
        fiber.callback_list = callback_list;
        fiber.processed_updates = 0;
        fiber.output = output;
        fiber.pending_work_priority = priority;
        work
    }

    /// Clears effect bookkeeping on a fiber reused from an aborted attempt.
    pub(crate) fn reset_effects(&mut self, id: FiberId) {
        self[id].reset_effects();
    }

    /// Every child of `id`, the coroutine handler output included.
    pub(crate) fn all_children(&self, id: FiberId) -> Vec<FiberId> {
        let fiber = &self[id];
        let mut children = Vec::new();
        let mut next = fiber.child;
        while let Some(child) = next.filter(|child| self.contains(*child)) {
            children.push(child);
            next = self[child].sibling;
        }
        if fiber.tag != FiberTag::CoroutineComponent && fiber.tag != FiberTag::CoroutineHandlerPhase {
            return children;
        }
        let mut next = match fiber.state_node {
            StateNode::Coroutine(handler_child) => handler_child,
            _ => None,
        };
        while let Some(child) = next.filter(|child| self.contains(*child)) {
            children.push(child);
            next = self[child].sibling;
        }
        children
    }

    /// Pre-order walk over `root` and all of its descendants.
    pub(crate) fn subtree(&self, root: FiberId) -> Vec<FiberId> {
        let mut visited = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !self.contains(id) {
                continue;
            }
            visited.push(id);
            let children = self.all_children(id);
            stack.extend(children.into_iter().rev());
        }
        visited
    }

    /// Links `children` as siblings under `parent` and returns the first one.
    pub(crate) fn link_children(&mut self, parent: FiberId, children: &[FiberId]) -> Option<FiberId> {
        for (position, &child) in children.iter().enumerate() {
            let sibling = children.get(position + 1).copied();
            let fiber = &mut self[child];
            fiber.parent = Some(parent);
            fiber.sibling = sibling;
        }
        children.first().copied()
    }
}

impl<H: HostConfig> Index<FiberId> for FiberStore<H> {
    type Output = Fiber<H>;

    fn index(&self, id: FiberId) -> &Fiber<H> {
        match self.get(id) {
            Some(fiber) => fiber,
            None => panic!("{id:?} was released"),
        }
    }
}

impl<H: HostConfig> IndexMut<FiberId> for FiberStore<H> {
    fn index_mut(&mut self, id: FiberId) -> &mut Fiber<H> {
        match self.get_mut(id) {
            Some(fiber) => fiber,
            None => panic!("{id:?} was released"),
        }
    }
}

#[cfg(test)]
#[path = "tests/fiber_tests.rs"]
mod tests;
