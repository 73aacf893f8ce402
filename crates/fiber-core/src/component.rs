//! User facing component definitions: class components with lifecycle
//! hooks, plain function components, and the instance view handed to hooks.

use std::any::Any;
use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::element::{Node, Props};
use crate::error::{HookError, HookResult};
use crate::fiber::FiberId;
use crate::runtime::{RuntimeHandle, UpdateKind};
use crate::update_queue::{Callback, PartialState};
use crate::value::{Object, Value};

/// Committed component state. Always a record once any update was merged.
pub type State = Rc<Object>;

/// Context visible to a component: the keys it declared, projected from the
/// nearest providers.
pub type Context = Rc<Object>;

type Factory = Box<dyn Fn(&Rc<Props>, &Context) -> Box<dyn Component>>;
type RenderFn = Box<dyn Fn(&Rc<Props>, &Context) -> Result<Node, HookError>>;

/// Lifecycle contract of a class component.
///
/// Hooks receive the instance view (`this`) rather than `&mut self` access to
/// props and state so the reconciler stays in charge of what is committed.
/// Calling back into a [`ComponentHandle`] of the same instance from inside a
/// hook is not supported; use `this` instead.
pub trait Component: Any {
    fn render(&self, this: &Instance) -> Result<Node, HookError>;

    /// Initial state, read right after construction. Must be a map or null.
    fn initial_state(&self) -> Option<Value> {
        None
    }

    fn is_context_provider(&self) -> bool {
        false
    }

    fn child_context(&self, _this: &Instance) -> Object {
        Object::new()
    }

    /// `None` means the component has no opinion and the default gate applies.
    fn should_update(
        &self,
        _this: &Instance,
        _next_props: &Rc<Props>,
        _next_state: Option<&State>,
        _next_context: &Context,
    ) -> Option<bool> {
        None
    }

    fn will_mount(&mut self, _this: &Instance) -> HookResult {
        Ok(())
    }

    fn did_mount(&mut self, _this: &Instance) -> HookResult {
        Ok(())
    }

    fn will_receive_props(
        &mut self,
        _this: &Instance,
        _next_props: &Rc<Props>,
        _next_context: &Context,
    ) -> HookResult {
        Ok(())
    }

    fn will_update(
        &mut self,
        _this: &Instance,
        _next_props: &Rc<Props>,
        _next_state: Option<&State>,
        _next_context: &Context,
    ) -> HookResult {
        Ok(())
    }

    fn did_update(
        &mut self,
        _this: &Instance,
        _prev_props: &Rc<Props>,
        _prev_state: Option<&State>,
    ) -> HookResult {
        Ok(())
    }

    fn will_unmount(&mut self, _this: &Instance) -> HookResult {
        Ok(())
    }
}

impl dyn Component {
    pub fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Static description of a class component: how to construct it and which
/// context keys it reads and provides.
pub struct ComponentClass {
    name: Rc<str>,
    factory: Factory,
    context_types: Option<Rc<[Rc<str>]>>,
    child_context_types: Option<Rc<[Rc<str>]>>,
    pure: bool,
}

impl ComponentClass {
    pub fn new<C, F>(name: impl Into<Rc<str>>, factory: F) -> Self
    where
        C: Component,
        F: Fn(&Rc<Props>, &Context) -> C + 'static,
    {
        Self {
            name: name.into(),
            factory: Box::new(move |props, context| Box::new(factory(props, context))),
            context_types: None,
            child_context_types: None,
            pure: false,
        }
    }

    pub fn context_types<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Rc<str>>,
    {
        self.context_types = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn child_context_types<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Rc<str>>,
    {
        self.child_context_types = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    /// Pure components skip rendering when props and state are shallowly equal.
    pub fn pure(mut self) -> Self {
        self.pure = true;
        self
    }

    pub fn name(&self) -> &Rc<str> {
        &self.name
    }

    pub fn declared_context_types(&self) -> Option<&[Rc<str>]> {
        self.context_types.as_deref()
    }

    pub fn declared_child_context_types(&self) -> Option<&[Rc<str>]> {
        self.child_context_types.as_deref()
    }

    pub fn is_pure(&self) -> bool {
        self.pure
    }

    pub(crate) fn construct(&self, props: &Rc<Props>, context: &Context) -> Box<dyn Component> {
        (self.factory)(props, context)
    }
}

impl fmt::Debug for ComponentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentClass")
            .field("name", &self.name)
            .field("context_types", &self.context_types)
            .field("child_context_types", &self.child_context_types)
            .field("pure", &self.pure)
            .finish()
    }
}

pub struct FunctionComponent {
    name: Rc<str>,
    render: RenderFn,
    context_types: Option<Rc<[Rc<str>]>>,
}

impl FunctionComponent {
    pub fn new(
        name: impl Into<Rc<str>>,
        render: impl Fn(&Rc<Props>, &Context) -> Result<Node, HookError> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            render: Box::new(render),
            context_types: None,
        }
    }

    pub fn context_types<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Rc<str>>,
    {
        self.context_types = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn name(&self) -> &Rc<str> {
        &self.name
    }

    pub fn declared_context_types(&self) -> Option<&[Rc<str>]> {
        self.context_types.as_deref()
    }

    pub(crate) fn call(&self, props: &Rc<Props>, context: &Context) -> Result<Node, HookError> {
        (self.render)(props, context)
    }
}

impl fmt::Debug for FunctionComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionComponent")
            .field("name", &self.name)
            .finish()
    }
}

/// Enqueues state changes for one class instance.
///
/// Requests are buffered on the runtime and applied the next time the
/// reconciler processes work, so they are safe to issue from any hook.
#[derive(Clone)]
pub struct Updater {
    fiber: FiberId,
    runtime: RuntimeHandle,
}

impl Updater {
    pub(crate) fn new(fiber: FiberId, runtime: RuntimeHandle) -> Self {
        Self { fiber, runtime }
    }

    pub fn fiber(&self) -> FiberId {
        self.fiber
    }

    pub fn enqueue_set_state(&self, partial: PartialState) {
        self.runtime
            .enqueue_update(self.fiber, UpdateKind::SetState(partial));
    }

    pub fn enqueue_replace_state(&self, state: Object) {
        self.runtime
            .enqueue_update(self.fiber, UpdateKind::ReplaceState(state));
    }

    pub fn enqueue_force_update(&self) {
        self.runtime.enqueue_update(self.fiber, UpdateKind::ForceUpdate);
    }

    pub fn enqueue_callback(&self, callback: Callback) {
        self.runtime
            .enqueue_update(self.fiber, UpdateKind::Callback(callback));
    }
}

impl fmt::Debug for Updater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Updater").field("fiber", &self.fiber).finish()
    }
}

/// The instance view passed to every hook of a class component.
pub struct Instance {
    pub(crate) props: Rc<Props>,
    pub(crate) state: Option<State>,
    pub(crate) context: Context,
    pub(crate) updater: Updater,
}

impl Instance {
    pub fn props(&self) -> &Rc<Props> {
        &self.props
    }

    pub fn state(&self) -> Option<&State> {
        self.state.as_ref()
    }

    /// Convenience lookup of a single state entry.
    pub fn state_value(&self, key: &str) -> Option<&Value> {
        self.state.as_ref().and_then(|state| state.get(key))
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn updater(&self) -> &Updater {
        &self.updater
    }

    pub fn set_state(&self, partial: Object) {
        self.updater
            .enqueue_set_state(PartialState::Object(partial));
    }

    pub fn set_state_with(&self, update: impl Fn(&Object, &Props) -> Object + 'static) {
        self.updater
            .enqueue_set_state(PartialState::Updater(Rc::new(update)));
    }

    /// Merges `partial` and runs `callback` once the resulting commit finished.
    pub fn set_state_then(&self, partial: Object, callback: impl FnOnce() -> HookResult + 'static) {
        self.set_state(partial);
        self.updater.enqueue_callback(Box::new(callback));
    }

    pub fn replace_state(&self, state: Object) {
        self.updater.enqueue_replace_state(state);
    }

    pub fn force_update(&self) {
        self.updater.enqueue_force_update();
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("props", &self.props)
            .field("state", &self.state)
            .field("context", &self.context)
            .finish()
    }
}

/// Reconciler-owned storage of a class component, shared by both buffers.
pub struct ClassInstance {
    pub(crate) instance: Instance,
    pub(crate) component: Box<dyn Component>,
    pub(crate) memoized_child_context: Option<Context>,
}

pub type ClassRef = Rc<RefCell<ClassInstance>>;

/// Public handle to a mounted class instance, handed to refs.
#[derive(Clone)]
pub struct ComponentHandle(pub(crate) ClassRef);

impl ComponentHandle {
    pub fn fiber(&self) -> FiberId {
        self.0.borrow().instance.updater.fiber()
    }

    pub fn props(&self) -> Rc<Props> {
        Rc::clone(&self.0.borrow().instance.props)
    }

    pub fn state(&self) -> Option<State> {
        self.0.borrow().instance.state.clone()
    }

    pub fn updater(&self) -> Updater {
        self.0.borrow().instance.updater.clone()
    }

    pub fn instance(&self) -> std::cell::Ref<'_, Instance> {
        Ref::map(self.0.borrow(), |class| &class.instance)
    }

    pub fn set_state(&self, partial: Object) {
        self.updater()
            .enqueue_set_state(PartialState::Object(partial));
    }

    pub fn force_update(&self) {
        self.updater().enqueue_force_update();
    }

    /// Runs `f` against the concrete component if it is a `T`.
    pub fn with_component<T: Component, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let class = self.0.borrow();
        class.component.as_any().downcast_ref::<T>().map(f)
    }

    pub fn ptr_eq(&self, other: &ComponentHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ComponentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(class) => f
                .debug_struct("ComponentHandle")
                .field("fiber", &class.instance.updater.fiber())
                .finish(),
            Err(_) => f.write_str("ComponentHandle(<in use>)"),
        }
    }
}
