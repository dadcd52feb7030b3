//! Bounded retry on rate-limited responses, as an explicit state machine
//!
//! ```text
//! Requesting(n) --ok/other status--> Succeeded
//! Requesting(n) --429, n < max-----> Backoff(n) --elapsed--> Requesting(n + 1)
//! Requesting(n) --429, n = max-----> Failed
//! ```
//!
//! Transitions are pure; the fetcher performs the request and the wait between them.

use std::time::Duration;

/// Attempts per URL before giving up on a rate-limited endpoint
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Wait between rate-limited attempts
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total requests allowed for one URL, including the first
    pub max_attempts: u32,
    /// Fixed delay after each rate-limited attempt
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }
}

/// Where a single URL's fetch currently stands; `R` is the accepted reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryState<R> {
    Requesting { attempt: u32 },
    Backoff { attempt: u32, delay: Duration },
    Succeeded { attempts: u32, reply: R },
    Failed { attempts: u32 },
}

impl<R> RetryState<R> {
    pub fn start() -> Self {
        RetryState::Requesting { attempt: 1 }
    }

    /// Feed the reply to the current request
    ///
    /// Anything that is not rate limited ends the loop, including error statuses; the caller
    /// decides what a non-success reply means. Outside `Requesting` the state is unchanged.
    pub fn on_reply(self, reply: R, rate_limited: bool, policy: &RetryPolicy) -> Self {
        match self {
            RetryState::Requesting { attempt } if !rate_limited => RetryState::Succeeded {
                attempts: attempt,
                reply,
            },
            RetryState::Requesting { attempt } if attempt >= policy.max_attempts => {
                RetryState::Failed { attempts: attempt }
            },
            RetryState::Requesting { attempt } => RetryState::Backoff {
                attempt,
                delay: policy.backoff,
            },
            other => other,
        }
    }

    /// The backoff delay has passed; outside `Backoff` the state is unchanged
    pub fn on_backoff_elapsed(self) -> Self {
        match self {
            RetryState::Backoff { attempt, .. } => RetryState::Requesting {
                attempt: attempt + 1,
            },
            other => other,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RetryState::Succeeded { .. } | RetryState::Failed { .. })
    }
}
