use super::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Clock whose time only moves when told to.
#[derive(Clone, Default)]
struct ManualClock(Arc<AtomicU64>);

impl ManualClock {
    fn advance(&self, ms: u64) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    type Instant = u64;

    fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    fn elapsed_millis(&self, since: u64) -> u64 {
        self.now().saturating_sub(since)
    }
}

#[test]
fn clock_deadline_counts_down_from_its_start() {
    let clock = ManualClock::default();
    clock.advance(100);
    let deadline = ClockDeadline::start(clock.clone(), 10);
    assert_eq!(deadline.time_remaining_ms(), 10);

    clock.advance(4);
    assert_eq!(deadline.time_remaining_ms(), 6);

    clock.advance(20);
    assert_eq!(deadline.time_remaining_ms(), 0);
}

#[test]
fn closures_act_as_deadlines() {
    let remaining = || TIME_HEURISTIC_MS + 1;
    assert!(remaining.time_remaining_ms() > TIME_HEURISTIC_MS);
}
