//! Ordered pending state changes and post-commit callbacks of a class fiber.
//!
//! A queue is shared between a fiber and its alternate so updates enqueued
//! against either buffer are seen by whichever one renders next.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::element::Props;
use crate::error::{HookError, HookResult};
use crate::value::Object;

pub type StateUpdater = Rc<dyn Fn(&Object, &Props) -> Object>;

pub type Callback = Box<dyn FnOnce() -> HookResult>;

pub type SharedQueue = Rc<RefCell<UpdateQueue>>;

#[derive(Clone)]
pub enum PartialState {
    Object(Object),
    /// Computed from the running state and the props being rendered.
    Updater(StateUpdater),
}

impl From<Object> for PartialState {
    fn from(object: Object) -> Self {
        PartialState::Object(object)
    }
}

struct Update {
    partial_state: Option<PartialState>,
    callback: Option<Callback>,
    is_replace: bool,
    is_forced: bool,
}

impl Update {
    fn new(partial_state: Option<PartialState>) -> Self {
        Self {
            partial_state,
            callback: None,
            is_replace: false,
            is_forced: false,
        }
    }
}

#[derive(Default)]
pub struct UpdateQueue {
    updates: Vec<Update>,
    has_update: bool,
    has_callback: bool,
    is_forced: bool,
}

impl UpdateQueue {
    /// A queue holding a single record.
    pub fn new(partial_state: Option<PartialState>) -> Self {
        let mut queue = Self::default();
        queue.append(partial_state);
        queue
    }

    pub fn shared(self) -> SharedQueue {
        Rc::new(RefCell::new(self))
    }

    pub fn append(&mut self, partial_state: Option<PartialState>) {
        self.has_update |= partial_state.is_some();
        self.updates.push(Update::new(partial_state));
    }

    /// Appends a record that discards everything merged before it.
    pub fn append_replace(&mut self, state: Object) {
        let mut update = Update::new(Some(PartialState::Object(state)));
        update.is_replace = true;
        self.has_update = true;
        self.updates.push(update);
    }

    /// Attaches `callback` to the tail record. When the tail already carries
    /// a callback, a fresh empty record is appended to hold the new one.
    pub fn append_callback(&mut self, callback: Callback) {
        let needs_record = self
            .updates
            .last()
            .is_none_or(|tail| tail.callback.is_some());
        if needs_record {
            self.updates.push(Update::new(None));
        }
        if let Some(tail) = self.updates.last_mut() {
            tail.callback = Some(callback);
        }
        self.has_callback = true;
    }

    pub fn force(&mut self) {
        if self.updates.is_empty() {
            self.updates.push(Update::new(None));
        }
        if let Some(tail) = self.updates.last_mut() {
            tail.is_forced = true;
        }
        self.is_forced = true;
    }

    /// Folds every record, in order, over `prev_state`.
    pub fn merge(&self, prev_state: Option<&Object>, props: &Props) -> Object {
        self.merge_from(0, prev_state, props)
    }

    /// Like [`UpdateQueue::merge`], skipping the first `start` records.
    pub fn merge_from(&self, start: usize, prev_state: Option<&Object>, props: &Props) -> Object {
        let mut state = prev_state.cloned().unwrap_or_default();
        for update in self.updates.iter().skip(start) {
            if update.is_replace {
                state = Object::new();
            }
            match &update.partial_state {
                Some(PartialState::Object(partial)) => state.assign(partial),
                Some(PartialState::Updater(compute)) => {
                    let partial = compute(&state, props);
                    state.assign(&partial);
                }
                None => {}
            }
        }
        state
    }

    /// Invokes every callback in record order. A failing callback does not
    /// prevent the remaining ones from running; all failures are returned.
    pub fn run_callbacks(&mut self) -> Vec<HookError> {
        let mut errors = Vec::new();
        for update in &mut self.updates {
            if let Some(callback) = update.callback.take() {
                if let Err(err) = callback() {
                    errors.push(err);
                }
            }
        }
        self.has_callback = false;
        errors
    }

    /// Detaches the first `count` records, the ones a render already folded,
    /// leaving anything enqueued afterwards in place.
    pub fn split_processed(&mut self, count: usize) -> UpdateQueue {
        let count = count.min(self.updates.len());
        let rest = self.updates.split_off(count);
        let processed = std::mem::replace(&mut self.updates, rest);
        self.refresh_flags();
        let mut done = UpdateQueue {
            updates: processed,
            ..UpdateQueue::default()
        };
        done.refresh_flags();
        done
    }

    fn refresh_flags(&mut self) {
        self.has_update = self.updates.iter().any(|update| update.partial_state.is_some());
        self.has_callback = self.updates.iter().any(|update| update.callback.is_some());
        self.is_forced = self.updates.iter().any(|update| update.is_forced);
    }

    pub fn has_update(&self) -> bool {
        self.has_update
    }

    pub fn has_callback(&self) -> bool {
        self.has_callback
    }

    pub fn is_forced(&self) -> bool {
        self.is_forced
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

impl fmt::Debug for UpdateQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateQueue")
            .field("len", &self.updates.len())
            .field("has_update", &self.has_update)
            .field("has_callback", &self.has_callback)
            .field("is_forced", &self.is_forced)
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/update_queue_tests.rs"]
mod tests;
