//! Per-request retry state machine.
//!
//! ```text
//! PENDING -> IN_FLIGHT -> SUCCEEDED
//!                      -> RETRYING -> IN_FLIGHT ...
//!                      -> FAILED
//! ```
//!
//! The machine owns no I/O: the engine reports each attempt's outcome and
//! the machine answers with the next state, so every transition can be
//! tested without a network.

use std::time::Duration;

use rand::Rng;

use crate::config::GenerationConfig;
use crate::types::ErrorCategory;

#[derive(Debug, Clone, PartialEq)]
pub enum RequestState {
    Pending,
    InFlight { attempt: u32 },
    /// Waiting `delay` before the next attempt
    Retrying { attempt: u32, delay: Duration },
    Succeeded { attempts: u32 },
    /// `exhausted` is true when the attempt budget ran out on transient failures
    Failed { attempts: u32, exhausted: bool },
}

impl RequestState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestState::Succeeded { .. } | RequestState::Failed { .. })
    }
}

/// Result of one attempt as seen by the machine
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Accepted,
    Transient {
        category: ErrorCategory,
        detail: String,
        retry_after: Option<Duration>,
    },
    Fatal {
        category: ErrorCategory,
        detail: String,
    },
}

impl AttemptOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            AttemptOutcome::Accepted => "accepted",
            AttemptOutcome::Transient { .. } => "transient",
            AttemptOutcome::Fatal { .. } => "fatal",
        }
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            AttemptOutcome::Accepted => None,
            AttemptOutcome::Transient { detail, .. } | AttemptOutcome::Fatal { detail, .. } => {
                Some(detail)
            }
        }
    }
}

// =============================================================================
// Retry Policy
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f32,
}

impl RetryPolicy {
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            backoff_factor: config.backoff_factor,
        }
    }

    /// Delay before retry number `retry` (1-based).
    ///
    /// Exponential with up to 25% jitter, never above `max_delay`. A service
    /// hint raises the delay to at least the hinted value.
    pub fn delay_for(&self, retry: u32, hint: Option<Duration>) -> Duration {
        let exponent = retry.saturating_sub(1).min(30) as i32;
        let scaled = self.base_delay.as_millis() as f64 * f64::from(self.backoff_factor).powi(exponent);
        let backoff = Duration::from_millis(scaled.round() as u64).min(self.max_delay);
        let delay = backoff + random_jitter(backoff);
        let delay = match hint {
            Some(hint) => delay.max(hint),
            None => delay,
        };
        delay.min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&GenerationConfig::default())
    }
}

/// Random jitter of up to a quarter of the base delay
fn random_jitter(base_delay: Duration) -> Duration {
    let max_jitter_ms = (base_delay.as_millis() as u64) / 4;
    if max_jitter_ms == 0 {
        return Duration::ZERO;
    }
    let jitter_ms = rand::rng().random_range(0..max_jitter_ms);
    Duration::from_millis(jitter_ms)
}

// =============================================================================
// Machine
// =============================================================================

#[derive(Debug, Clone)]
pub struct RequestMachine {
    policy: RetryPolicy,
    state: RequestState,
    attempts: u32,
}

impl RequestMachine {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            state: RequestState::Pending,
            attempts: 0,
        }
    }

    pub fn state(&self) -> &RequestState {
        &self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Enter IN_FLIGHT from PENDING or RETRYING; `None` from any other state
    pub fn start(&mut self) -> Option<u32> {
        match self.state {
            RequestState::Pending | RequestState::Retrying { .. } => {
                self.attempts += 1;
                self.state = RequestState::InFlight {
                    attempt: self.attempts,
                };
                Some(self.attempts)
            }
            _ => None,
        }
    }

    /// Apply the outcome of the in-flight attempt
    pub fn record(&mut self, outcome: &AttemptOutcome) -> &RequestState {
        if !matches!(self.state, RequestState::InFlight { .. }) {
            return &self.state;
        }
        self.state = match outcome {
            AttemptOutcome::Accepted => RequestState::Succeeded {
                attempts: self.attempts,
            },
            AttemptOutcome::Fatal { .. } => RequestState::Failed {
                attempts: self.attempts,
                exhausted: false,
            },
            AttemptOutcome::Transient { retry_after, .. } => {
                if self.attempts >= self.policy.max_attempts {
                    RequestState::Failed {
                        attempts: self.attempts,
                        exhausted: true,
                    }
                } else {
                    RequestState::Retrying {
                        attempt: self.attempts,
                        delay: self.policy.delay_for(self.attempts, *retry_after),
                    }
                }
            }
        };
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1_000),
            backoff_factor: 2.0,
        }
    }

    fn transient() -> AttemptOutcome {
        AttemptOutcome::Transient {
            category: ErrorCategory::Timeout,
            detail: "timed out".to_string(),
            retry_after: None,
        }
    }

    #[test]
    fn test_transient_exhausts_exactly_max_attempts() {
        let mut machine = RequestMachine::new(policy(3));
        let mut attempts = 0;
        while let Some(n) = machine.start() {
            attempts = n;
            machine.record(&transient());
        }
        assert_eq!(attempts, 3);
        assert_eq!(
            machine.state(),
            &RequestState::Failed {
                attempts: 3,
                exhausted: true
            }
        );
    }

    #[test]
    fn test_fatal_never_retries() {
        let mut machine = RequestMachine::new(policy(5));
        machine.start();
        let state = machine.record(&AttemptOutcome::Fatal {
            category: ErrorCategory::Auth,
            detail: "bad key".to_string(),
        });
        assert_eq!(
            state,
            &RequestState::Failed {
                attempts: 1,
                exhausted: false
            }
        );
        assert!(machine.start().is_none());
    }

    #[test]
    fn test_success_after_retry() {
        let mut machine = RequestMachine::new(policy(3));
        machine.start();
        assert!(matches!(
            machine.record(&transient()),
            RequestState::Retrying { attempt: 1, .. }
        ));
        assert_eq!(machine.start(), Some(2));
        assert_eq!(
            machine.record(&AttemptOutcome::Accepted),
            &RequestState::Succeeded { attempts: 2 }
        );
        assert!(machine.state().is_terminal());
    }

    #[test]
    fn test_record_outside_flight_is_ignored() {
        let mut machine = RequestMachine::new(policy(3));
        assert_eq!(machine.record(&AttemptOutcome::Accepted), &RequestState::Pending);
    }

    #[test]
    fn test_single_attempt_budget() {
        let mut machine = RequestMachine::new(policy(1));
        machine.start();
        assert!(matches!(
            machine.record(&transient()),
            RequestState::Failed { attempts: 1, exhausted: true }
        ));
    }

    #[test]
    fn test_backoff_grows_and_is_capped() {
        let policy = policy(10);
        for retry in 1..=8u32 {
            let delay = policy.delay_for(retry, None);
            let base = (100u64 << (retry - 1)).min(1_000);
            assert!(delay >= Duration::from_millis(base.min(1_000)), "retry {}", retry);
            assert!(delay <= Duration::from_millis(1_000));
            assert!(delay < Duration::from_millis(base + base / 4 + 1));
        }
    }

    #[test]
    fn test_retry_after_hint_honored_within_cap() {
        let policy = policy(3);
        let delay = policy.delay_for(1, Some(Duration::from_millis(700)));
        assert_eq!(delay, Duration::from_millis(700));
        let capped = policy.delay_for(1, Some(Duration::from_secs(60)));
        assert_eq!(capped, Duration::from_millis(1_000));
    }
}
