//! Construction, mounting and updating of class component instances.

use std::cell::RefCell;
use std::rc::Rc;

use crate::component::{ClassInstance, ClassRef, ComponentClass, Context, Instance, State, Updater};
use crate::element::Props;
use crate::error::{ConfigError, HookError, InvariantError, ReconcileError};
use crate::fiber::{EffectTag, FiberId, FiberProps, FiberType, Priority, StateNode};
use crate::host::HostConfig;
use crate::reconciler::Reconciler;
use crate::value::Value;

fn render_error(component: &ComponentClass) -> impl FnOnce(HookError) -> ReconcileError + '_ {
    move |source| ReconcileError::Render {
        component: Rc::clone(component.name()),
        source,
    }
}

fn same_state(a: Option<&State>, b: Option<&State>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
        _ => false,
    }
}

fn shallow_equal_state(a: Option<&State>, b: Option<&State>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Rc::ptr_eq(a, b) || a.shallow_eq(b),
        _ => false,
    }
}

impl<H: HostConfig> Reconciler<H> {
    pub(crate) fn update_class_component(
        &mut self,
        current: Option<FiberId>,
        wip: FiberId,
        priority: Priority,
    ) -> Result<Option<FiberId>, ReconcileError> {
        let should_update = match current {
            None if self.fibers[wip].state_node.class().is_some() => self.resume_mount_class_instance(wip)?,
            None => {
                self.construct_class_instance(wip)?;
                self.mount_class_instance(wip)?;
                true
            }
            Some(current) => self.update_class_instance(current, wip)?,
        };
        self.finish_class_component(current, wip, should_update, priority)
    }

    fn finish_class_component(
        &mut self,
        current: Option<FiberId>,
        wip: FiberId,
        should_update: bool,
        priority: Priority,
    ) -> Result<Option<FiberId>, ReconcileError> {
        let is_provider = self.fibers[wip].is_context_provider();
        if !should_update {
            if is_provider {
                self.context.push_provider(&self.fibers[wip], false)?;
            }
            return Ok(self.bailout_on_already_finished_work(current, wip));
        }

        let (class, class_ref) = self.class_parts(wip)?;
        let children = {
            let instance = class_ref.borrow();
            instance.component.render(&instance.instance)
        }
        .map_err(render_error(&class))?;
        self.fibers[wip].effect_tag |= EffectTag::UPDATE;

        // The provider's context must be on the stack before its children
        // are reconciled and worked on.
        if is_provider {
            self.context.push_provider(&self.fibers[wip], true)?;
        }
        self.reconcile_children(current, wip, &children, priority)
    }

    fn class_parts(&self, wip: FiberId) -> Result<(Rc<ComponentClass>, ClassRef), InvariantError> {
        let fiber = &self.fibers[wip];
        match (&fiber.ty, &fiber.state_node) {
            (FiberType::Class(class), StateNode::Class(instance)) => Ok((Rc::clone(class), Rc::clone(instance))),
            _ => Err(InvariantError::TypeMismatch {
                fiber: wip,
                tag: fiber.tag,
            }),
        }
    }

    fn pending_mount_props(&self, wip: FiberId, class: &ComponentClass) -> Result<Rc<Props>, ConfigError> {
        self.fibers[wip]
            .effective_props()
            .and_then(FiberProps::as_element)
            .cloned()
            .ok_or_else(|| ConfigError::MissingMountProps {
                component: Rc::clone(class.name()),
            })
    }

    /// Runs the factory and attaches the new instance to `wip`.
    fn construct_class_instance(&mut self, wip: FiberId) -> Result<(), ReconcileError> {
        let fiber = &self.fibers[wip];
        let FiberType::Class(class) = fiber.ty.clone() else {
            return Err(InvariantError::TypeMismatch {
                fiber: wip,
                tag: fiber.tag,
            }
            .into());
        };
        let props = self.pending_mount_props(wip, &class)?;
        let context = self.context.masked_context(class.declared_context_types());
        let component = class.construct(&props, &context);

        let state = match component.initial_state() {
            None | Some(Value::Null) => None,
            Some(Value::Map(state)) => Some(state),
            Some(_) => {
                return Err(ConfigError::InvalidState {
                    component: Rc::clone(class.name()),
                }
                .into())
            }
        };
        if component.is_context_provider() && class.declared_child_context_types().is_none() {
            return Err(ConfigError::MissingChildContextTypes {
                component: Rc::clone(class.name()),
            }
            .into());
        }

        log::trace!("constructed {} for {wip:?}", class.name());
        let instance = ClassInstance {
            instance: Instance {
                props,
                state: state.clone(),
                context,
                updater: Updater::new(wip, self.runtime.handle()),
            },
            component,
            memoized_child_context: None,
        };
        let fiber = &mut self.fibers[wip];
        fiber.state_node = StateNode::Class(Rc::new(RefCell::new(instance)));
        fiber.memoized_state = state;
        Ok(())
    }

    fn mount_class_instance(&mut self, wip: FiberId) -> Result<(), ReconcileError> {
        let (class, class_ref) = self.class_parts(wip)?;
        let props = self.pending_mount_props(wip, &class)?;
        {
            let mut class_instance = class_ref.borrow_mut();
            class_instance.instance.props = Rc::clone(&props);
            let ClassInstance { instance, component, .. } = &mut *class_instance;
            component.will_mount(instance).map_err(render_error(&class))?;
        }
        // State set from will_mount is visible to the first render.
        self.drain_updates_for(wip);
        let (state, _) = self.process_update_queue(wip, &props);
        self.memoize_class(wip, &class_ref, props, state, None);
        Ok(())
    }

    /// Revisits a mount whose earlier attempt never committed. When the gate
    /// declines, the earlier attempt is kept as is. Otherwise the half-built
    /// instance is dropped and the mount starts over with a fresh one.
    fn resume_mount_class_instance(&mut self, wip: FiberId) -> Result<bool, ReconcileError> {
        let (class, class_ref) = self.class_parts(wip)?;
        let new_props = self.pending_mount_props(wip, &class)?;
        let old_props = self.fibers[wip]
            .memoized_props
            .as_ref()
            .and_then(FiberProps::as_element)
            .cloned();
        let state = self.fibers[wip].memoized_state.clone();
        let context = self.context.masked_context(class.declared_context_types());
        let forced = self.fibers[wip]
            .update_queue
            .as_ref()
            .is_some_and(|queue| queue.borrow().is_forced());

        let should_update = forced
            || self.check_should_update(
                &class,
                &class_ref,
                old_props.as_ref(),
                &new_props,
                state.as_ref(),
                state.as_ref(),
                &context,
            );
        if !should_update {
            log::trace!("keeping the earlier mount of {} on {wip:?}", class.name());
            // The kept instance has never committed and still owes its did_mount.
            self.fibers[wip].effect_tag |= EffectTag::UPDATE;
            return Ok(false);
        }

        log::trace!("remounting {} on {wip:?}", class.name());
        self.construct_class_instance(wip)?;
        self.mount_class_instance(wip)?;
        Ok(true)
    }

    /// Returns whether the instance has to re-render.
    fn update_class_instance(&mut self, current: FiberId, wip: FiberId) -> Result<bool, ReconcileError> {
        let (class, class_ref) = self.class_parts(wip)?;
        let new_props = self.fibers[wip]
            .effective_props()
            .and_then(FiberProps::as_element)
            .cloned()
            .ok_or(InvariantError::MissingProps)?;
        let old_props = self.fibers[current]
            .memoized_props
            .as_ref()
            .and_then(FiberProps::as_element)
            .cloned();
        let new_context = self.context.masked_context(class.declared_context_types());
        let old_context = Rc::clone(&class_ref.borrow().instance.context);

        let props_changed = !old_props.as_ref().is_some_and(|old| Rc::ptr_eq(old, &new_props));
        if props_changed || !Rc::ptr_eq(&old_context, &new_context) {
            {
                let mut class_instance = class_ref.borrow_mut();
                let ClassInstance { instance, component, .. } = &mut *class_instance;
                component
                    .will_receive_props(instance, &new_props, &new_context)
                    .map_err(render_error(&class))?;
            }
            self.drain_updates_for(wip);
        }

        let old_state = self.fibers[current].memoized_state.clone();
        let (new_state, forced) = self.process_update_queue(wip, &new_props);

        let unchanged = !props_changed
            && same_state(old_state.as_ref(), new_state.as_ref())
            && Rc::ptr_eq(&old_context, &new_context)
            && !self.context.has_context_changed();
        if unchanged && !forced {
            return Ok(false);
        }

        let should_update = forced
            || self.check_should_update(
                &class,
                &class_ref,
                old_props.as_ref(),
                &new_props,
                old_state.as_ref(),
                new_state.as_ref(),
                &new_context,
            );
        if should_update {
            let mut class_instance = class_ref.borrow_mut();
            let ClassInstance { instance, component, .. } = &mut *class_instance;
            component
                .will_update(instance, &new_props, new_state.as_ref(), &new_context)
                .map_err(render_error(&class))?;
        }
        // A skipped render still adopts the new inputs so they are not lost.
        self.memoize_class(wip, &class_ref, new_props, new_state, Some(new_context));
        Ok(should_update)
    }

    #[allow(clippy::too_many_arguments)]
    fn check_should_update(
        &self,
        class: &ComponentClass,
        class_ref: &ClassRef,
        old_props: Option<&Rc<Props>>,
        new_props: &Rc<Props>,
        old_state: Option<&State>,
        new_state: Option<&State>,
        new_context: &Context,
    ) -> bool {
        let Some(old_props) = old_props else {
            return true;
        };
        let class_instance = class_ref.borrow();
        let decision =
            class_instance
                .component
                .should_update(&class_instance.instance, new_props, new_state, new_context);
        if let Some(decision) = decision {
            return decision;
        }
        if class.is_pure() {
            return !(old_props.shallow_eq(new_props) && shallow_equal_state(old_state, new_state));
        }
        true
    }

    /// Folds the shared queue over the committed state of `wip`. Returns the
    /// new state and whether an update was forced.
    fn process_update_queue(&mut self, wip: FiberId, props: &Props) -> (Option<State>, bool) {
        let fiber = &self.fibers[wip];
        let base = fiber.memoized_state.clone();
        let Some(queue) = fiber.update_queue.clone() else {
            return (base, false);
        };
        let queue = queue.borrow();
        let forced = queue.is_forced();
        let state = if queue.has_update() {
            Some(Rc::new(queue.merge(base.as_deref(), props)))
        } else {
            base
        };
        self.fibers[wip].processed_updates = queue.len();
        (state, forced)
    }

    fn memoize_class(
        &mut self,
        wip: FiberId,
        class_ref: &ClassRef,
        props: Rc<Props>,
        state: Option<State>,
        context: Option<Context>,
    ) {
        {
            let mut class_instance = class_ref.borrow_mut();
            class_instance.instance.props = Rc::clone(&props);
            class_instance.instance.state = state.clone();
            if let Some(context) = context {
                class_instance.instance.context = context;
            }
        }
        let fiber = &mut self.fibers[wip];
        fiber.memoized_props = Some(FiberProps::Element(props));
        fiber.memoized_state = state;
    }
}
