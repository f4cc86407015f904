//! Bounded retry for scheduler calls that time out.
//!
//! Each attempt's result is classified into an `AttemptOutcome`; the
//! `RetryPolicy` then decides, without side effects, whether to stop or to
//! go again. Only timeouts are retried, immediately and without backoff.

use tracing::{debug, warn};

use crate::rpc::{RpcError, RpcResult};

/// What a single attempt produced.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome<T> {
    Success(T),
    /// The call got no reply in time; eligible for retry.
    TimedOut(RpcError),
    /// Any other failure; never retried.
    Failed(RpcError),
}

impl<T> AttemptOutcome<T> {
    pub fn classify(result: RpcResult<T>) -> Self {
        match result {
            Ok(value) => AttemptOutcome::Success(value),
            Err(e) if e.is_timeout() => AttemptOutcome::TimedOut(e),
            Err(e) => AttemptOutcome::Failed(e),
        }
    }
}

/// The policy's verdict after an attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Step<T> {
    /// Hand this result to the caller.
    Finish(RpcResult<T>),
    /// Discard this timeout and attempt again.
    Retry(RpcError),
}

/// Per-call attempt counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    attempts: u32,
}

impl RetryState {
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Total calls allowed for one request: the first try plus one retry.
pub const MAX_ATTEMPTS: u32 = 2;

/// Retry a timed-out call exactly once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryPolicy;

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        MAX_ATTEMPTS
    }

    /// Decide what follows attempt number `attempt` (1-based).
    pub fn step<T>(&self, attempt: u32, outcome: AttemptOutcome<T>) -> Step<T> {
        match outcome {
            AttemptOutcome::Success(value) => Step::Finish(Ok(value)),
            AttemptOutcome::Failed(e) => Step::Finish(Err(e)),
            AttemptOutcome::TimedOut(e) if attempt < MAX_ATTEMPTS => Step::Retry(e),
            AttemptOutcome::TimedOut(e) => Step::Finish(Err(e)),
        }
    }

    /// Run `call` until the policy finishes, one attempt at a time.
    pub fn run<T>(&self, method: &str, mut call: impl FnMut() -> RpcResult<T>) -> RpcResult<T> {
        let mut state = RetryState::default();
        loop {
            state.attempts += 1;
            let outcome = AttemptOutcome::classify(call());
            match self.step(state.attempts, outcome) {
                Step::Finish(result) => {
                    if let Err(e) = &result {
                        if e.is_timeout() {
                            warn!(
                                method,
                                attempts = state.attempts,
                                "scheduler call timed out, giving up"
                            );
                        } else {
                            debug!(
                                method,
                                attempts = state.attempts,
                                error = %e,
                                "scheduler call failed"
                            );
                        }
                    }
                    return result;
                }
                Step::Retry(e) => {
                    warn!(
                        method,
                        attempt = state.attempts,
                        max_attempts = MAX_ATTEMPTS,
                        error = %e,
                        "scheduler call timed out, retrying"
                    );
                }
            }
        }
    }
}
