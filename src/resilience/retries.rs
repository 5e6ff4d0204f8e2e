//! Retry state machine.
//!
//! # Responsibilities
//! - Track the attempt index against a fixed attempt budget
//! - Turn each classified failure into a retry-or-give-up decision
//! - Remember the last failure for diagnostics
//!
//! # Design Decisions
//! - Only transient failures consume budget and are retried
//! - The budget bounds total attempts, including the first one

use std::time::Duration;

use crate::resilience::backoff::BackoffScheduler;
use crate::resilience::classifier::ClassifiedFailure;

/// Default number of attempts for one logical upstream call.
pub const DEFAULT_ATTEMPT_BUDGET: u32 = 3;

/// What to do after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for the delay, then run the next attempt.
    RetryAfter(Duration),
    /// Surface the failure to the caller.
    GiveUp(ClassifiedFailure),
}

/// Attempt bookkeeping for one logical call.
#[derive(Debug, Clone)]
pub struct RetryState {
    attempt: u32,
    budget: u32,
    last_failure: Option<ClassifiedFailure>,
}

impl RetryState {
    pub fn new(budget: u32) -> Self {
        Self {
            attempt: 0,
            budget: budget.max(1),
            last_failure: None,
        }
    }

    /// 0-based index of the attempt currently in flight.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn budget(&self) -> u32 {
        self.budget
    }

    /// Attempts left after the current one.
    pub fn remaining(&self) -> u32 {
        self.budget.saturating_sub(self.attempt + 1)
    }

    pub fn last_failure(&self) -> Option<&ClassifiedFailure> {
        self.last_failure.as_ref()
    }

    /// Record the failure of the current attempt and decide what happens next.
    pub fn record_failure(
        &mut self,
        failure: ClassifiedFailure,
        backoff: &BackoffScheduler,
    ) -> RetryDecision {
        self.last_failure = Some(failure.clone());

        if !failure.transient {
            return RetryDecision::GiveUp(failure);
        }
        if self.remaining() == 0 {
            return RetryDecision::GiveUp(failure.exhausted(self.attempt + 1));
        }

        let delay = backoff.compute_delay(self.attempt, failure.retry_after_seconds);
        self.attempt += 1;
        RetryDecision::RetryAfter(delay)
    }
}

impl Default for RetryState {
    fn default() -> Self {
        Self::new(DEFAULT_ATTEMPT_BUDGET)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::classifier::FailureCategory;

    #[test]
    fn transient_failures_retry_until_budget() {
        let backoff = BackoffScheduler::default();
        let mut state = RetryState::default();

        let first = state.record_failure(ClassifiedFailure::from_status(503, None), &backoff);
        assert_eq!(first, RetryDecision::RetryAfter(Duration::from_secs(1)));
        let second = state.record_failure(ClassifiedFailure::from_status(503, None), &backoff);
        assert_eq!(second, RetryDecision::RetryAfter(Duration::from_secs(2)));

        match state.record_failure(ClassifiedFailure::from_status(503, None), &backoff) {
            RetryDecision::GiveUp(failure) => {
                assert_eq!(failure.category, FailureCategory::ServerError);
                assert!(failure.message.contains("3 attempts"));
            }
            other => panic!("expected give up, got {other:?}"),
        }
        assert_eq!(state.attempt(), 2);
    }

    #[test]
    fn permanent_failure_gives_up_immediately() {
        let backoff = BackoffScheduler::default();
        let mut state = RetryState::default();
        let decision = state.record_failure(ClassifiedFailure::from_status(401, None), &backoff);
        assert!(matches!(decision, RetryDecision::GiveUp(f) if f.category == FailureCategory::AuthError));
        assert_eq!(state.attempt(), 0);
        assert!(state.last_failure().is_some());
    }

    #[test]
    fn retry_after_overrides_curve() {
        let backoff = BackoffScheduler::default();
        let mut state = RetryState::new(5);
        state.record_failure(ClassifiedFailure::from_status(503, None), &backoff);
        let decision = state.record_failure(ClassifiedFailure::from_status(429, Some(7)), &backoff);
        assert_eq!(decision, RetryDecision::RetryAfter(Duration::from_secs(7)));
    }

    #[test]
    fn zero_budget_still_allows_one_attempt() {
        let state = RetryState::new(0);
        assert_eq!(state.budget(), 1);
        assert_eq!(state.remaining(), 0);
    }
}
