//! Deterministic scheduling doubles.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use fiber_core::{Deadline, RuntimeScheduler};

/// Scheduler that only records what was requested.
#[derive(Debug, Default)]
pub struct TestScheduler {
    animation_requested: AtomicBool,
    deferred_requested: AtomicBool,
    requests: AtomicUsize,
}

impl TestScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_animation_request(&self) -> bool {
        self.animation_requested.swap(false, Ordering::SeqCst)
    }

    pub fn take_deferred_request(&self) -> bool {
        self.deferred_requested.swap(false, Ordering::SeqCst)
    }

    pub fn has_pending_request(&self) -> bool {
        self.animation_requested.load(Ordering::SeqCst) || self.deferred_requested.load(Ordering::SeqCst)
    }

    /// Total number of callback requests, of either kind.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl RuntimeScheduler for TestScheduler {
    fn schedule_animation_callback(&self) {
        self.animation_requested.store(true, Ordering::SeqCst);
        self.requests.fetch_add(1, Ordering::SeqCst);
    }

    fn schedule_deferred_callback(&self) {
        self.deferred_requested.store(true, Ordering::SeqCst);
        self.requests.fetch_add(1, Ordering::SeqCst);
    }
}

/// Deadline measured in units of work rather than milliseconds: it allows
/// exactly `units` fibers to be worked on before it expires.
#[derive(Debug)]
pub struct UnitDeadline {
    remaining: Cell<usize>,
}

impl UnitDeadline {
    pub fn new(units: usize) -> Self {
        Self {
            remaining: Cell::new(units),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(usize::MAX)
    }

    pub fn remaining(&self) -> usize {
        self.remaining.get()
    }
}

impl Deadline for UnitDeadline {
    fn time_remaining_ms(&self) -> u64 {
        match self.remaining.get() {
            0 => 0,
            usize::MAX => u64::MAX,
            units => {
                self.remaining.set(units - 1);
                u64::MAX
            }
        }
    }
}
