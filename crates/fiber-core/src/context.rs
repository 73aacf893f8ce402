//! Legacy-style context propagation.
//!
//! Providers push the merge of their parent's context and their own child
//! context while their subtree is being worked on, and pop it when the
//! subtree completes. Consumers only ever see the keys they declared.

use std::rc::Rc;

use crate::component::{ClassInstance, Context};
use crate::error::ConfigError;
use crate::fiber::{Fiber, FiberType};
use crate::host::HostConfig;
use crate::value::Object;

struct ContextFrame {
    context: Context,
    did_perform_work: bool,
}

/// Stack of merged contexts for the provider chain above the fiber being
/// worked on. It is owned by a reconciler and reset whenever a render pass
/// starts over.
#[derive(Default)]
pub struct ContextStack {
    frames: Vec<ContextFrame>,
}

impl ContextStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.frames.clear();
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// The full merged context from the nearest provider.
    pub fn unmasked(&self) -> Context {
        self.frames
            .last()
            .map(|frame| Rc::clone(&frame.context))
            .unwrap_or_else(Object::empty)
    }

    /// Projects the merged context onto `declared`. Components without
    /// declared keys all receive the same shared empty context.
    pub fn masked_context(&self, declared: Option<&[Rc<str>]>) -> Context {
        let Some(keys) = declared else {
            return Object::empty();
        };
        let unmasked = self.unmasked();
        let mut masked = Object::new();
        for key in keys {
            if let Some(value) = unmasked.get(key) {
                masked.insert(Rc::clone(key), value.clone());
            }
        }
        Rc::new(masked)
    }

    /// Whether the provider on top of the stack recomputed its context
    /// during this pass, invalidating bailouts below it.
    pub fn has_context_changed(&self) -> bool {
        self.frames
            .last()
            .is_some_and(|frame| frame.did_perform_work)
    }

    /// Pushes the provider's merged context. When the provider did not
    /// re-render, the merge memoized on its instance is reused.
    pub fn push_provider<H: HostConfig>(
        &mut self,
        fiber: &Fiber<H>,
        did_perform_work: bool,
    ) -> Result<(), ConfigError> {
        let FiberType::Class(class) = &fiber.ty else {
            return Ok(());
        };
        let Some(instance) = fiber.state_node.class() else {
            return Ok(());
        };
        let mut instance = instance.borrow_mut();
        let memoized = if did_perform_work {
            None
        } else {
            instance.memoized_child_context.clone()
        };
        let context = match memoized {
            Some(context) => context,
            None => {
                let context = self.merge_child_context(
                    &instance,
                    class.name(),
                    class.declared_child_context_types(),
                )?;
                instance.memoized_child_context = Some(Rc::clone(&context));
                context
            }
        };
        self.frames.push(ContextFrame {
            context,
            did_perform_work,
        });
        Ok(())
    }

    pub fn pop_provider(&mut self) {
        if self.frames.pop().is_none() {
            log::warn!("context stack underflow");
        }
    }

    fn merge_child_context(
        &self,
        instance: &ClassInstance,
        component: &Rc<str>,
        declared: Option<&[Rc<str>]>,
    ) -> Result<Context, ConfigError> {
        let Some(declared) = declared else {
            return Err(ConfigError::MissingChildContextTypes {
                component: Rc::clone(component),
            });
        };
        let child_context = instance.component.child_context(&instance.instance);
        if let Some(key) = child_context
            .keys()
            .find(|key| !declared.iter().any(|declared| declared == *key))
        {
            return Err(ConfigError::UndeclaredChildContextKey {
                component: Rc::clone(component),
                key: Rc::clone(key),
            });
        }
        let mut merged = (*self.unmasked()).clone();
        merged.assign(&child_context);
        Ok(Rc::new(merged))
    }
}

pub fn is_context_provider<H: HostConfig>(fiber: &Fiber<H>) -> bool {
    fiber.is_context_provider()
}

#[cfg(test)]
#[path = "tests/context_tests.rs"]
mod tests;
