//! Standard runtime services backed by Rust's `std` library.
//!
//! This crate provides concrete implementations of the platform
//! abstraction traits defined in `fiber-core`. An event loop constructs a
//! [`StdRuntime`], hands its [`Runtime`] to a reconciler and polls the
//! scheduler for requested callbacks.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use fiber_core::{Clock, ClockDeadline, Deadline, Runtime, RuntimeHandle, RuntimeScheduler};

type Waker = Arc<dyn Fn() + Send + Sync + 'static>;

/// Scheduler that records callback requests in atomics and optionally
/// wakes an event loop.
pub struct StdScheduler {
    animation_requested: AtomicBool,
    deferred_requested: AtomicBool,
    waker: RwLock<Option<Waker>>,
}

impl StdScheduler {
    pub fn new() -> Self {
        Self {
            animation_requested: AtomicBool::new(false),
            deferred_requested: AtomicBool::new(false),
            waker: RwLock::new(None),
        }
    }

    /// Returns whether an animation callback has been requested since the
    /// last call.
    pub fn take_animation_request(&self) -> bool {
        self.animation_requested.swap(false, Ordering::SeqCst)
    }

    /// Returns whether a deferred callback has been requested since the
    /// last call.
    pub fn take_deferred_request(&self) -> bool {
        self.deferred_requested.swap(false, Ordering::SeqCst)
    }

    /// Registers a waker invoked whenever a callback is requested.
    pub fn set_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        *self.waker.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(waker));
    }

    pub fn clear_waker(&self) {
        *self.waker.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn wake(&self) {
        let waker = self
            .waker
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

impl Default for StdScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdScheduler")
            .field(
                "animation_requested",
                &self.animation_requested.load(Ordering::SeqCst),
            )
            .field(
                "deferred_requested",
                &self.deferred_requested.load(Ordering::SeqCst),
            )
            .finish()
    }
}

impl RuntimeScheduler for StdScheduler {
    fn schedule_animation_callback(&self) {
        self.animation_requested.store(true, Ordering::SeqCst);
        self.wake();
    }

    fn schedule_deferred_callback(&self) {
        self.deferred_requested.store(true, Ordering::SeqCst);
        self.wake();
    }
}

/// Clock implementation backed by [`std::time`].
#[derive(Debug, Default, Clone)]
pub struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Self::Instant {
        Instant::now()
    }

    fn elapsed_millis(&self, since: Self::Instant) -> u64 {
        since.elapsed().as_millis() as u64
    }
}

impl StdClock {
    /// A deadline expiring `budget` from now.
    pub fn deadline(&self, budget: Duration) -> StdDeadline {
        StdDeadline::new(budget)
    }
}

/// Wall clock deadline for a single deferred callback.
#[derive(Clone)]
pub struct StdDeadline(ClockDeadline<StdClock>);

impl StdDeadline {
    pub fn new(budget: Duration) -> Self {
        let budget_ms = u64::try_from(budget.as_millis()).unwrap_or(u64::MAX);
        Self(ClockDeadline::start(StdClock, budget_ms))
    }

    /// The usual budget of an idle period within a 60Hz frame.
    pub fn idle_frame() -> Self {
        Self::new(Duration::from_millis(16))
    }
}

impl Deadline for StdDeadline {
    fn time_remaining_ms(&self) -> u64 {
        self.0.time_remaining_ms()
    }
}

impl fmt::Debug for StdDeadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdDeadline")
            .field("remaining_ms", &self.time_remaining_ms())
            .finish()
    }
}

/// Convenience container bundling the standard scheduler and clock.
#[derive(Clone)]
pub struct StdRuntime {
    scheduler: Arc<StdScheduler>,
    clock: Arc<StdClock>,
    runtime: Runtime,
}

impl StdRuntime {
    pub fn new() -> Self {
        let scheduler = Arc::new(StdScheduler::default());
        let runtime = Runtime::new(scheduler.clone());
        Self {
            scheduler,
            clock: Arc::new(StdClock),
            runtime,
        }
    }

    /// Returns a [`fiber_core::Runtime`] configured with the standard scheduler.
    pub fn runtime(&self) -> Runtime {
        self.runtime.clone()
    }

    pub fn runtime_handle(&self) -> RuntimeHandle {
        self.runtime.handle()
    }

    pub fn scheduler(&self) -> Arc<StdScheduler> {
        Arc::clone(&self.scheduler)
    }

    pub fn clock(&self) -> Arc<StdClock> {
        Arc::clone(&self.clock)
    }

    pub fn take_animation_request(&self) -> bool {
        self.scheduler.take_animation_request()
    }

    pub fn take_deferred_request(&self) -> bool {
        self.scheduler.take_deferred_request()
    }

    /// Registers a waker to be called when the runtime requests a callback.
    pub fn set_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        self.scheduler.set_waker(waker);
    }

    pub fn clear_waker(&self) {
        self.scheduler.clear_waker();
    }
}

impl fmt::Debug for StdRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdRuntime")
            .field("scheduler", &self.scheduler)
            .field("clock", &self.clock)
            .finish()
    }
}

impl Default for StdRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use fiber_core::{Deadline, Priority, RuntimeScheduler};

    use super::{StdDeadline, StdRuntime, StdScheduler};

    #[test]
    fn scheduler_records_requests_until_taken() {
        let scheduler = StdScheduler::new();
        scheduler.schedule_deferred_callback();
        assert!(!scheduler.take_animation_request());
        assert!(scheduler.take_deferred_request());
        assert!(!scheduler.take_deferred_request(), "request is consumed");
    }

    #[test]
    fn waker_runs_on_every_request() {
        let runtime = StdRuntime::new();
        let wakes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&wakes);
        runtime.set_waker(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        runtime.scheduler().schedule_animation_callback();
        runtime.scheduler().schedule_deferred_callback();
        assert_eq!(wakes.load(Ordering::SeqCst), 2);

        runtime.clear_waker();
        runtime.scheduler().schedule_animation_callback();
        assert_eq!(wakes.load(Ordering::SeqCst), 2);
        assert!(runtime.take_animation_request());
    }

    #[test]
    fn expired_deadline_reports_no_time() {
        let deadline = StdDeadline::new(Duration::ZERO);
        assert_eq!(deadline.time_remaining_ms(), 0);

        let generous = StdDeadline::new(Duration::from_secs(60));
        assert!(generous.time_remaining_ms() > 1_000);
    }

    #[test]
    fn runtime_clock_hands_out_deadlines() {
        let runtime = StdRuntime::new();
        let deadline = runtime.clock().deadline(Duration::from_secs(60));
        assert!(deadline.time_remaining_ms() > 1_000);
        assert!(StdDeadline::idle_frame().time_remaining_ms() <= 16);
    }

    #[test]
    fn runtime_starts_with_synchronous_updates() {
        let runtime = StdRuntime::new();
        assert_eq!(runtime.runtime().update_priority(), Priority::Synchronous);
        assert!(!runtime.runtime_handle().has_updates());
    }
}
