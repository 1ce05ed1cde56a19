//! Adaptive retry pacing for object fetches.
//!
//! The wait budget follows additive-increase/multiplicative-decrease: every
//! transient failure adds a fixed step, every success divides the budget,
//! never dropping below the starting value.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use indicatif::ProgressBar;

use crate::error::ObjectError;

/// Tunables for the wait budget and the per-object retry loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Starting budget, also the floor (milliseconds)
    pub initial_ms: u64,
    /// Added on every transient failure (milliseconds)
    pub increase_ms: u64,
    /// Budget is divided by this on every success
    pub decrease_divisor: u64,
    /// Attempts per object before giving up
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_ms: 1000,
            increase_ms: 100,
            decrease_divisor: 2,
            max_attempts: 4,
        }
    }
}

impl RetryPolicy {
    /// Fresh budget for one run
    pub fn budget(&self) -> WaitBudget {
        WaitBudget::new(self.initial_ms, self.increase_ms, self.decrease_divisor)
    }
}

/// Feedback signals consumed by the retry loop
pub trait Backoff {
    /// How long to wait before the next attempt
    fn current(&self) -> Duration;
    fn on_success(&mut self);
    fn on_failure(&mut self);
}

/// AIMD wait budget. Invariant: `value >= minimum`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitBudget {
    value: u64,
    minimum: u64,
    increase: u64,
    divisor: u64,
}

impl WaitBudget {
    pub fn new(initial_ms: u64, increase_ms: u64, decrease_divisor: u64) -> Self {
        Self {
            value: initial_ms,
            minimum: initial_ms,
            increase: increase_ms,
            divisor: decrease_divisor.max(1),
        }
    }

    /// Current budget in milliseconds
    pub const fn value(&self) -> u64 {
        self.value
    }

    pub const fn minimum(&self) -> u64 {
        self.minimum
    }
}

impl Backoff for WaitBudget {
    fn current(&self) -> Duration {
        Duration::from_millis(self.value)
    }

    fn on_success(&mut self) {
        self.value = (self.value / self.divisor).max(self.minimum);
    }

    fn on_failure(&mut self) {
        self.value = self.value.saturating_add(self.increase);
    }
}

impl std::fmt::Display for WaitBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "AIMD({}ms, +{}ms, /{})",
            self.value, self.increase, self.divisor
        )
    }
}

/// Result of the per-object retry loop
#[derive(Debug)]
pub enum ObjectOutcome<T> {
    Completed(T),
    PermanentFailure(ObjectError),
}

impl<T> ObjectOutcome<T> {
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(v) => Some(v),
            Self::PermanentFailure(_) => None,
        }
    }
}

fn lock<B>(budget: &Mutex<B>) -> MutexGuard<'_, B> {
    // A panicked worker cannot leave the budget half-updated
    budget.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run `attempt_fn` until it succeeds, pacing retries with a shared budget.
///
/// Transient failures signal `on_failure`, log the object label, error class
/// and new budget, then sleep for the budget. After `max_attempts` transient
/// failures the object is given up. Non-transient errors give up at once
/// without touching the budget. A success signals `on_success`.
pub fn retry_with_budget<T, B: Backoff>(
    label: &str,
    budget: &Mutex<B>,
    max_attempts: u32,
    pb: &ProgressBar,
    sleep: impl Fn(Duration),
    mut attempt_fn: impl FnMut() -> Result<T, ObjectError>,
) -> ObjectOutcome<T> {
    let max_attempts = max_attempts.max(1);
    let mut failures = 0u32;
    loop {
        match attempt_fn() {
            Ok(v) => {
                lock(budget).on_success();
                return ObjectOutcome::Completed(v);
            }
            Err(e) if e.is_transient() => {
                failures += 1;
                let wait = {
                    let mut b = lock(budget);
                    b.on_failure();
                    b.current()
                };
                log::warn!(
                    "{label}: {} error (probably rate limited), wait budget {}ms, attempt {failures}/{max_attempts}: {e}",
                    e.class(),
                    wait.as_millis()
                );
                pb.set_message(format!(
                    "retry {failures}/{max_attempts} in {}ms...",
                    wait.as_millis()
                ));
                sleep(wait);
                if failures >= max_attempts {
                    log::error!("{label}: failed permanently after {failures} attempts: {e}");
                    return ObjectOutcome::PermanentFailure(e);
                }
            }
            Err(e) => {
                log::error!("{label}: failed permanently: {e}");
                return ObjectOutcome::PermanentFailure(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::FetchError;
    use std::cell::RefCell;

    fn throttled() -> ObjectError {
        ObjectError::Fetch(FetchError::Http {
            status: Some(503),
            message: "slow down".to_string(),
        })
    }

    #[derive(Default)]
    struct CountingBackoff {
        successes: u32,
        failures: u32,
    }

    impl Backoff for CountingBackoff {
        fn current(&self) -> Duration {
            Duration::from_millis(u64::from(self.failures))
        }
        fn on_success(&mut self) {
            self.successes += 1;
        }
        fn on_failure(&mut self) {
            self.failures += 1;
        }
    }

    #[test]
    fn failure_adds_step() {
        let mut b = WaitBudget::new(1000, 100, 2);
        b.on_failure();
        b.on_failure();
        assert_eq!(b.value(), 1200);
        assert_eq!(b.current(), Duration::from_millis(1200));
    }

    #[test]
    fn success_divides_but_floors_at_minimum() {
        let mut b = WaitBudget::new(1000, 100, 2);
        for _ in 0..20 {
            b.on_failure();
        }
        assert_eq!(b.value(), 3000);
        b.on_success();
        assert_eq!(b.value(), 1500);
        b.on_success();
        assert_eq!(b.value(), 1000);
        b.on_success();
        assert_eq!(b.value(), 1000);
    }

    #[test]
    fn zero_divisor_is_clamped() {
        let mut b = WaitBudget::new(10, 5, 0);
        b.on_failure();
        b.on_success();
        assert_eq!(b.value(), 15);
    }

    #[test]
    fn invariants_hold_over_mixed_sequence() {
        let mut b = WaitBudget::new(1000, 100, 2);
        // Deterministic LCG drives a long success/failure mix
        let mut seed = 0x2545_f491_u64;
        for _ in 0..10_000 {
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            let before = b.value();
            if seed >> 62 == 0 {
                b.on_success();
                assert!(b.value() <= before);
            } else {
                b.on_failure();
                assert!(b.value() >= before);
            }
            assert!(b.value() >= b.minimum());
        }
    }

    #[test]
    fn fails_twice_then_succeeds() {
        let budget = Mutex::new(CountingBackoff::default());
        let sleeps = RefCell::new(Vec::new());
        let mut calls = 0;
        let outcome = retry_with_budget(
            "obj",
            &budget,
            4,
            &ProgressBar::hidden(),
            |d| sleeps.borrow_mut().push(d),
            || {
                calls += 1;
                if calls <= 2 { Err(throttled()) } else { Ok(calls) }
            },
        );
        assert_eq!(outcome.completed(), Some(3));
        let b = budget.into_inner().unwrap();
        assert_eq!(b.failures, 2);
        assert_eq!(b.successes, 1);
        assert_eq!(
            sleeps.into_inner(),
            vec![Duration::from_millis(1), Duration::from_millis(2)]
        );
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let budget = Mutex::new(CountingBackoff::default());
        let mut calls = 0;
        let outcome: ObjectOutcome<()> = retry_with_budget(
            "obj",
            &budget,
            4,
            &ProgressBar::hidden(),
            |_| {},
            || {
                calls += 1;
                Err(throttled())
            },
        );
        assert!(matches!(outcome, ObjectOutcome::PermanentFailure(_)));
        assert_eq!(calls, 4);
        let b = budget.into_inner().unwrap();
        assert_eq!(b.failures, 4);
        assert_eq!(b.successes, 0);
    }

    #[test]
    fn permanent_error_skips_retry_and_budget() {
        let budget = Mutex::new(CountingBackoff::default());
        let mut calls = 0;
        let outcome: ObjectOutcome<()> = retry_with_budget(
            "obj",
            &budget,
            4,
            &ProgressBar::hidden(),
            |_| panic!("must not sleep"),
            || {
                calls += 1;
                Err(ObjectError::Output(std::io::Error::other("disk")))
            },
        );
        assert!(!outcome.is_completed());
        assert_eq!(calls, 1);
        let b = budget.into_inner().unwrap();
        assert_eq!((b.failures, b.successes), (0, 0));
    }

    #[test]
    fn budget_shared_across_objects() {
        let policy = RetryPolicy {
            initial_ms: 0,
            increase_ms: 10,
            decrease_divisor: 2,
            max_attempts: 2,
        };
        let budget = Mutex::new(policy.budget());
        let pb = ProgressBar::hidden();

        let first: ObjectOutcome<()> =
            retry_with_budget("a", &budget, 2, &pb, |_| {}, || Err(throttled()));
        assert!(!first.is_completed());
        assert_eq!(budget.lock().unwrap().value(), 20);

        let second = retry_with_budget("b", &budget, 2, &pb, |_| {}, || Ok(()));
        assert!(second.is_completed());
        assert_eq!(budget.lock().unwrap().value(), 10);
    }
}
