//! Bounded retry around a remote call plus output validation.
//!
//! Every attempt is one call followed by one validation. Transport errors,
//! malformed output, and invariant violations all count against the same
//! budget and all trigger the same exponential backoff.

use std::future::Future;
use std::time::Duration;

use scopesignal_core::config::{DEFAULT_BACKOFF_UNIT, DEFAULT_MAX_RETRIES};
use scopesignal_core::{FailureKind, ValidationError};
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::{AttemptError, ClassificationFailure, TransportError};

/// How an individual attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Accepted,
    Failed(FailureKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    /// 1-based.
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    pub elapsed: Duration,
}

/// An accepted value and the attempts it took.
#[derive(Debug)]
pub struct Accepted<T> {
    pub value: T,
    pub attempts: u32,
    /// Wall time of the accepting attempt only.
    pub latency: Duration,
    pub history: Vec<AttemptRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRIES,
            backoff_unit: DEFAULT_BACKOFF_UNIT,
        }
    }
}

enum State<T> {
    Attempting,
    BackingOff(Duration),
    Succeeded(T, Duration),
    Exhausted(AttemptError),
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_unit: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_unit,
        }
    }

    /// Delay after failed attempt `attempt` (1-based): `unit * 2^(attempt - 1)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.backoff_unit.saturating_mul(1u32 << exponent)
    }

    /// Drive `call` then `validate` until one attempt is accepted or the
    /// budget runs out. At least one attempt is always made.
    pub async fn run<T, C, Fut, V>(
        &self,
        mut call: C,
        mut validate: V,
    ) -> Result<Accepted<T>, ClassificationFailure>
    where
        C: FnMut() -> Fut,
        Fut: Future<Output = Result<String, TransportError>>,
        V: FnMut(&str) -> Result<T, ValidationError>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0u32;
        let mut history = Vec::new();
        let mut state = State::Attempting;

        loop {
            state = match state {
                State::Attempting => {
                    attempt += 1;
                    let started = Instant::now();
                    let result = match call().await {
                        Ok(raw) => validate(&raw).map_err(AttemptError::from),
                        Err(e) => Err(AttemptError::from(e)),
                    };
                    let elapsed = started.elapsed();

                    match result {
                        Ok(value) => {
                            history.push(AttemptRecord {
                                attempt,
                                outcome: AttemptOutcome::Accepted,
                                elapsed,
                            });
                            State::Succeeded(value, elapsed)
                        }
                        Err(err) => {
                            history.push(AttemptRecord {
                                attempt,
                                outcome: AttemptOutcome::Failed(err.kind()),
                                elapsed,
                            });
                            if attempt >= max_attempts {
                                State::Exhausted(err)
                            } else {
                                let delay = self.backoff(attempt);
                                warn!(
                                    attempt,
                                    max_attempts,
                                    kind = err.kind().as_str(),
                                    error = %err,
                                    delay_ms = delay.as_millis() as u64,
                                    "attempt failed, backing off"
                                );
                                State::BackingOff(delay)
                            }
                        }
                    }
                }
                State::BackingOff(delay) => {
                    tokio::time::sleep(delay).await;
                    State::Attempting
                }
                State::Succeeded(value, latency) => {
                    debug!(attempt, latency_ms = latency.as_millis() as u64, "attempt accepted");
                    return Ok(Accepted {
                        value,
                        attempts: attempt,
                        latency,
                        history,
                    });
                }
                State::Exhausted(last) => {
                    error!(
                        attempts = attempt,
                        kind = last.kind().as_str(),
                        error = %last,
                        "retry budget exhausted"
                    );
                    return Err(ClassificationFailure {
                        attempts: attempt,
                        last,
                    });
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use parking_lot::Mutex;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_secs(1))
    }

    fn parse_number(raw: &str) -> Result<u32, ValidationError> {
        raw.trim().parse().map_err(|_| ValidationError::Malformed {
            reason: format!("not a number: {raw}"),
        })
    }

    struct Script(Mutex<VecDeque<Result<String, TransportError>>>);

    impl Script {
        fn new(steps: Vec<Result<&str, TransportError>>) -> Self {
            Self(Mutex::new(
                steps.into_iter().map(|s| s.map(str::to_string)).collect(),
            ))
        }

        async fn next(&self) -> Result<String, TransportError> {
            self.0
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Other("script exhausted".into())))
        }
    }

    #[test]
    fn backoff_doubles() {
        let p = policy(5);
        assert_eq!(p.backoff(1), Duration::from_secs(1));
        assert_eq!(p.backoff(2), Duration::from_secs(2));
        assert_eq!(p.backoff(3), Duration::from_secs(4));
        assert_eq!(p.backoff(4), Duration::from_secs(8));
    }

    #[test]
    fn backoff_saturates() {
        let p = policy(100);
        assert_eq!(p.backoff(80), Duration::from_secs(1u64 << 31));
    }

    #[test]
    fn zero_budget_still_makes_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn first_attempt_accepted_without_sleeping() {
        let script = Script::new(vec![Ok("7")]);
        let start = Instant::now();
        let accepted = policy(3).run(|| script.next(), parse_number).await.unwrap();
        assert_eq!(accepted.value, 7);
        assert_eq!(accepted.attempts, 1);
        assert_eq!(accepted.history.len(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn two_failures_then_success() {
        let script = Script::new(vec![
            Err(TransportError::EmptyResponse),
            Ok("not json"),
            Ok("42"),
        ]);
        let start = Instant::now();
        let accepted = policy(3).run(|| script.next(), parse_number).await.unwrap();

        assert_eq!(accepted.value, 42);
        assert_eq!(accepted.attempts, 3);
        let outcomes: Vec<_> = accepted.history.iter().map(|r| r.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                AttemptOutcome::Failed(FailureKind::Transport),
                AttemptOutcome::Failed(FailureKind::MalformedOutput),
                AttemptOutcome::Accepted,
            ]
        );
        // 1s after the first failure, 2s after the second.
        assert!(start.elapsed() >= Duration::from_secs(3));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_reports_last_error() {
        let script = Script::new(vec![
            Err(TransportError::EmptyResponse),
            Err(TransportError::EmptyResponse),
            Err(TransportError::Server {
                status: 500,
                body: "boom".into(),
            }),
            Ok("1"),
        ]);
        let failure = policy(3)
            .run(|| script.next(), parse_number)
            .await
            .unwrap_err();

        assert_eq!(failure.attempts, 3);
        assert!(matches!(
            failure.last,
            AttemptError::Transport(TransportError::Server { status: 500, .. })
        ));
        // The fourth scripted step was never consumed.
        assert_eq!(script.0.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_budget_never_sleeps() {
        let script = Script::new(vec![Ok("nope")]);
        let start = Instant::now();
        let failure = policy(1)
            .run(|| script.next(), parse_number)
            .await
            .unwrap_err();
        assert_eq!(failure.attempts, 1);
        assert_eq!(failure.kind(), FailureKind::MalformedOutput);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
