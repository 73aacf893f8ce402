//! Platform abstraction traits for scheduling reconciliation work.
//!
//! The reconciler never drives itself: it asks the host platform for a
//! callback and the platform calls back into
//! [`Reconciler::perform_animation_work`](crate::Reconciler::perform_animation_work)
//! or [`Reconciler::perform_deferred_work`](crate::Reconciler::perform_deferred_work).

/// Units of work are only started while more than this many milliseconds
/// remain in the current deadline.
pub const TIME_HEURISTIC_MS: u64 = 1;

/// Requests callbacks from the host platform.
///
/// Implementations must be safe to use from multiple threads.
pub trait RuntimeScheduler: Send + Sync {
    /// Request a callback before the next frame for animation priority
    /// (and more urgent) work.
    fn schedule_animation_callback(&self);

    /// Request an idle-time callback for deferrable work.
    fn schedule_deferred_callback(&self);
}

/// Time budget handed to deferred work.
pub trait Deadline {
    fn time_remaining_ms(&self) -> u64;
}

impl<F: Fn() -> u64> Deadline for F {
    fn time_remaining_ms(&self) -> u64 {
        self()
    }
}

/// Provides timing information for deadlines.
pub trait Clock: Send + Sync {
    /// Instant type produced by this clock implementation.
    type Instant: Copy + Send + Sync;

    /// Returns the current instant.
    fn now(&self) -> Self::Instant;

    /// Returns the number of milliseconds elapsed since `since`.
    fn elapsed_millis(&self, since: Self::Instant) -> u64;
}

/// A [`Deadline`] that expires `budget_ms` after it was started, as measured
/// by `clock`.
#[derive(Clone)]
pub struct ClockDeadline<C: Clock> {
    clock: C,
    started: C::Instant,
    budget_ms: u64,
}

impl<C: Clock> ClockDeadline<C> {
    pub fn start(clock: C, budget_ms: u64) -> Self {
        let started = clock.now();
        Self {
            clock,
            started,
            budget_ms,
        }
    }

    pub fn budget_ms(&self) -> u64 {
        self.budget_ms
    }
}

impl<C: Clock> Deadline for ClockDeadline<C> {
    fn time_remaining_ms(&self) -> u64 {
        self.budget_ms
            .saturating_sub(self.clock.elapsed_millis(self.started))
    }
}

#[cfg(test)]
#[path = "tests/platform_tests.rs"]
mod tests;
