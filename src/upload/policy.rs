//! Retry policy and synthetic progress, independent of any transport.
//!
//! [`RetryState`] is the explicit finite-state form of "try primary, then
//! fallback, then back off and start over":
//!
//! ```text
//! Attempt{1, Primary} ─fail→ Attempt{1, Fallback} ─fail→ Wait{800ms}
//!     → Attempt{2, Primary} → … → GiveUp{attempts}
//! ```
//!
//! The coordinator drives it by reporting failures; success simply stops
//! the machine.

use std::time::Duration;

/// Which transport an attempt uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Direct `put_object`.
    Primary,
    /// Signed upload ticket, then `put_via_ticket`.
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Attempt { attempt: u32, transport: Transport },
    Wait { delay: Duration, next_attempt: u32 },
    GiveUp { attempts: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts before giving up; at least one is always made.
    pub max_attempts: u32,
    /// Linear backoff unit: the wait after attempt `n` is `n × step`.
    pub backoff_step: Duration,
    /// Bound on every individual storage call.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_millis(800),
            timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Wait after failed attempt `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }

    pub fn start(&self) -> RetryState {
        RetryState {
            policy: *self,
            attempt: 1,
            transport: Transport::Primary,
        }
    }
}

/// Position of one upload inside its [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryState {
    policy: RetryPolicy,
    attempt: u32,
    transport: Transport,
}

impl RetryState {
    /// The step to run now.
    pub fn current(&self) -> Step {
        Step::Attempt {
            attempt: self.attempt,
            transport: self.transport,
        }
    }

    /// Record that the current step failed and return the next one.
    pub fn failed(&mut self) -> Step {
        match self.transport {
            Transport::Primary => {
                self.transport = Transport::Fallback;
                self.current()
            }
            Transport::Fallback if self.attempt < self.policy.max_attempts.max(1) => {
                let delay = self.policy.backoff(self.attempt);
                self.attempt += 1;
                self.transport = Transport::Primary;
                Step::Wait {
                    delay,
                    next_attempt: self.attempt,
                }
            }
            Transport::Fallback => Step::GiveUp {
                attempts: self.attempt,
            },
        }
    }
}

/// Synthetic progress for transports that report none.
///
/// Each tick adds `step` but the value never reaches `ceiling`; only a
/// confirmed success moves an item to 100.
#[derive(Debug, Clone)]
pub struct ProgressTicker {
    current: u8,
    step: u8,
    ceiling: u8,
}

/// Highest synthetic value is one below this.
pub const SYNTHETIC_CEILING: u8 = 90;

impl ProgressTicker {
    pub fn new(start: u8, step: u8) -> Self {
        Self {
            current: start.min(SYNTHETIC_CEILING - 1),
            step: step.max(1),
            ceiling: SYNTHETIC_CEILING,
        }
    }

    /// Advance one tick. Returns the new value, or `None` once capped.
    pub fn tick(&mut self) -> Option<u8> {
        let cap = self.ceiling - 1;
        if self.current >= cap {
            return None;
        }
        self.current = self.current.saturating_add(self.step).min(cap);
        Some(self.current)
    }

    pub fn current(&self) -> u8 {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            ..RetryPolicy::default()
        }
    }

    #[test]
    fn backoff_is_linear() {
        let p = RetryPolicy::default();
        assert_eq!(p.backoff(1), Duration::from_millis(800));
        assert_eq!(p.backoff(2), Duration::from_millis(1600));
        assert_eq!(p.backoff(3), Duration::from_millis(2400));
    }

    #[test]
    fn primary_failure_falls_back_within_same_attempt() {
        let mut state = policy(3).start();
        assert_eq!(
            state.current(),
            Step::Attempt {
                attempt: 1,
                transport: Transport::Primary
            }
        );
        assert_eq!(
            state.failed(),
            Step::Attempt {
                attempt: 1,
                transport: Transport::Fallback
            }
        );
    }

    #[test]
    fn full_sequence_until_exhausted() {
        let mut state = policy(3).start();
        let mut steps = vec![state.current()];
        loop {
            let step = state.failed();
            steps.push(step);
            if let Step::Wait { .. } = step {
                steps.push(state.current());
            }
            if let Step::GiveUp { .. } = step {
                break;
            }
        }

        use Transport::*;
        let attempt = |attempt, transport| Step::Attempt { attempt, transport };
        assert_eq!(
            steps,
            vec![
                attempt(1, Primary),
                attempt(1, Fallback),
                Step::Wait {
                    delay: Duration::from_millis(800),
                    next_attempt: 2
                },
                attempt(2, Primary),
                attempt(2, Fallback),
                Step::Wait {
                    delay: Duration::from_millis(1600),
                    next_attempt: 3
                },
                attempt(3, Primary),
                attempt(3, Fallback),
                Step::GiveUp { attempts: 3 },
            ]
        );
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let mut state = policy(0).start();
        state.failed();
        assert_eq!(state.failed(), Step::GiveUp { attempts: 1 });
    }

    #[test]
    fn ticker_approaches_but_never_reaches_ceiling() {
        let mut ticker = ProgressTicker::new(40, 6);
        let values: Vec<u8> = std::iter::from_fn(|| ticker.tick()).collect();
        assert_eq!(values.first(), Some(&46));
        assert_eq!(values.last(), Some(&89));
        assert!(values.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(ticker.tick(), None);
    }

    #[test]
    fn ticker_start_is_clamped() {
        let mut ticker = ProgressTicker::new(100, 5);
        assert_eq!(ticker.current(), 89);
        assert_eq!(ticker.tick(), None);
    }
}
