//! Bounded retry and cooperative interruption
//!
//! The readiness wait re-executes a provider predicate until it succeeds, a
//! bounded try-count is exhausted, or the caller's interrupt flag fires. Only
//! `Timeout`-kind provider errors are retried; anything else is fatal on the
//! first raise.
//!
//! Interruption is advisory: the flag is checked at the top of each attempt
//! and short-circuits the wait as [`WaitOutcome::Skipped`] rather than raising
//! an error. A skipped wait never verified its condition — downstream steps
//! run against possibly-unready state and must tolerate that.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::provider::ProviderError;

/// Default pause between poll attempts
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Process-wide interruption flag
///
/// Set by the caller (typically on user cancellation) and polled by the
/// pipeline's wait loops. The pipeline never clears it.
#[derive(Debug, Clone, Default)]
pub struct InterruptSignal {
    flag: Arc<AtomicBool>,
}

impl InterruptSignal {
    /// Create an unset signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the operation as interrupted
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether the signal has fired
    pub fn is_interrupted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// How a wait loop ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The predicate verified the condition
    Ready,
    /// The wait was short-circuited by an interrupt; the condition was
    /// never verified
    Skipped,
}

impl WaitOutcome {
    /// Whether the condition was actually verified
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Whether the wait was short-circuited without verification
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }
}

/// Errors from a retried wait
#[derive(Debug, Error)]
pub enum RetryError {
    /// Every attempt in the budget failed
    #[error("retry budget exhausted after {tries} tries")]
    Exhausted {
        /// Number of attempts made
        tries: u32,
    },

    /// The predicate raised a non-retryable provider error
    #[error(transparent)]
    Fatal(#[from] ProviderError),
}

/// Re-executes an async predicate until it succeeds or a bounded try-count
/// is exhausted
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_tries: u32,
    interval: Duration,
}

impl RetryPolicy {
    /// Create a policy with the given try budget and the default interval
    pub fn new(max_tries: u32) -> Self {
        Self {
            max_tries,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the pause between attempts
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// The configured try budget
    pub fn max_tries(&self) -> u32 {
        self.max_tries
    }

    /// Poll `predicate` until it reports the condition satisfied
    ///
    /// An interrupt observed at the top of an attempt returns
    /// [`WaitOutcome::Skipped`] immediately, without invoking the predicate.
    /// `Ok(false)` and `Timeout`-kind errors consume a try; any other provider
    /// error is fatal and not retried. Exhausting the budget yields
    /// [`RetryError::Exhausted`].
    pub async fn retry_until<F, Fut>(
        &self,
        interrupt: &InterruptSignal,
        mut predicate: F,
    ) -> std::result::Result<WaitOutcome, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<bool, ProviderError>>,
    {
        for attempt in 1..=self.max_tries {
            if interrupt.is_interrupted() {
                debug!(attempt, "interrupt observed, skipping wait");
                return Ok(WaitOutcome::Skipped);
            }

            match predicate().await {
                Ok(true) => {
                    debug!(attempt, "condition satisfied");
                    return Ok(WaitOutcome::Ready);
                }
                Ok(false) => {
                    debug!(attempt, max_tries = self.max_tries, "condition not satisfied yet");
                }
                Err(err) if err.is_retryable() => {
                    debug!(attempt, error = %err, "retryable provider timeout");
                }
                Err(err) => return Err(RetryError::Fatal(err)),
            }

            if attempt < self.max_tries {
                tokio::time::sleep(self.interval).await;
            }
        }

        Err(RetryError::Exhausted {
            tries: self.max_tries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderErrorKind;
    use std::sync::atomic::AtomicU32;
    use tokio_test::assert_ok;

    fn fast_policy(max_tries: u32) -> RetryPolicy {
        RetryPolicy::new(max_tries).with_interval(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_succeeds_exactly_at_final_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = fast_policy(5);
        let interrupt = InterruptSignal::new();

        let counter = Arc::clone(&calls);
        let outcome = assert_ok!(
            policy
                .retry_until(&interrupt, || {
                    let counter = Arc::clone(&counter);
                    async move {
                        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                        Ok(n == 5)
                    }
                })
                .await
        );

        assert_eq!(outcome, WaitOutcome::Ready);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_exhausts_budget_when_predicate_never_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = fast_policy(5);
        let interrupt = InterruptSignal::new();

        let counter = Arc::clone(&calls);
        let result = policy
            .retry_until(&interrupt, || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(false)
                }
            })
            .await;

        assert!(matches!(result, Err(RetryError::Exhausted { tries: 5 })));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_timeout_errors_are_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = fast_policy(3);
        let interrupt = InterruptSignal::new();

        let counter = Arc::clone(&calls);
        let outcome = assert_ok!(
            policy
                .retry_until(&interrupt, || {
                    let counter = Arc::clone(&counter);
                    async move {
                        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                        if n < 3 {
                            Err(ProviderError::timeout("still waiting"))
                        } else {
                            Ok(true)
                        }
                    }
                })
                .await
        );

        assert_eq!(outcome, WaitOutcome::Ready);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_timeout_error_is_fatal_on_first_raise() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = fast_policy(10);
        let interrupt = InterruptSignal::new();

        let counter = Arc::clone(&calls);
        let result = policy
            .retry_until(&interrupt, || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<bool, _>(ProviderError::new(
                        ProviderErrorKind::Unauthorized,
                        "not allowed",
                    ))
                }
            })
            .await;

        match result {
            Err(RetryError::Fatal(err)) => {
                assert_eq!(err.kind, ProviderErrorKind::Unauthorized)
            }
            other => panic!("expected fatal error, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_interrupt_skips_without_invoking_predicate() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = fast_policy(5);
        let interrupt = InterruptSignal::new();
        interrupt.trigger();

        let counter = Arc::clone(&calls);
        let outcome = assert_ok!(
            policy
                .retry_until(&interrupt, || {
                    let counter = Arc::clone(&counter);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(true)
                    }
                })
                .await
        );

        assert_eq!(outcome, WaitOutcome::Skipped);
        assert!(outcome.is_skipped());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_interrupt_signal_is_shared_across_clones() {
        let signal = InterruptSignal::new();
        let observer = signal.clone();

        assert!(!observer.is_interrupted());
        signal.trigger();
        assert!(observer.is_interrupted());
    }
}
