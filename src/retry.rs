//! Retry policy, predicates, and the retry engine.
//!
//! The engine re-sends a request until a predicate declines to retry or the attempt
//! budget runs out. Between attempts it releases the previous response and sleeps for
//! a [jittered](crate::backoff::jittered) backoff that races the caller's cancellation
//! token.

use crate::{backoff, transport, Envelope, Error, Result, Transport};
use http::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default number of attempts, including the first.
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;
/// Default base wait for the first retry.
pub const DEFAULT_BASE_WAIT: Duration = Duration::from_millis(200);
/// Default upper bound on any single wait.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(10);

/// Governs how a request is re-dispatched after transient failures.
///
/// Zero values are replaced by defaults (3 attempts, 200ms base, 10s cap) when the
/// client is built.
///
/// # Examples
///
/// ```
/// use callpipe::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_secs(30));
/// assert_eq!(policy.max_attempts, 5);
///
/// let defaults = RetryPolicy::default().with_defaults();
/// assert_eq!(defaults.max_attempts, 3);
/// assert_eq!(defaults.base_wait, Duration::from_millis(200));
/// assert_eq!(defaults.max_wait, Duration::from_secs(10));
/// ```
#[derive(Clone, Default)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: usize,
    /// Base wait, doubled per attempt.
    pub base_wait: Duration,
    /// Upper bound on any single wait.
    pub max_wait: Duration,
    /// Overrides [`DefaultRetryPredicate`] when set.
    pub predicate: Option<Arc<dyn RetryPredicate>>,
}

impl RetryPolicy {
    /// Creates a policy with the default predicate.
    pub fn new(max_attempts: usize, base_wait: Duration, max_wait: Duration) -> Self {
        Self {
            max_attempts,
            base_wait,
            max_wait,
            predicate: None,
        }
    }

    /// Replaces the default retry predicate.
    pub fn with_predicate(mut self, predicate: impl RetryPredicate + 'static) -> Self {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Returns a copy with zero values replaced by the defaults.
    pub fn with_defaults(&self) -> Self {
        let mut policy = self.clone();
        if policy.max_attempts == 0 {
            policy.max_attempts = DEFAULT_MAX_ATTEMPTS;
        }
        if policy.base_wait.is_zero() {
            policy.base_wait = DEFAULT_BASE_WAIT;
        }
        if policy.max_wait.is_zero() {
            policy.max_wait = DEFAULT_MAX_WAIT;
        }
        policy
    }

    fn should_retry(&self, outcome: &Result<Envelope>, attempt: usize) -> bool {
        match &self.predicate {
            Some(predicate) => predicate.should_retry(outcome, attempt),
            None => DefaultRetryPredicate.should_retry(outcome, attempt),
        }
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_wait", &self.base_wait)
            .field("max_wait", &self.max_wait)
            .field("custom_predicate", &self.predicate.is_some())
            .finish()
    }
}

/// Decides whether an attempt's outcome should be retried.
///
/// Closures with the matching signature implement this trait.
///
/// # Examples
///
/// ```
/// use callpipe::{Envelope, Result, RetryPredicate};
///
/// struct RetryOnRateLimit;
///
/// impl RetryPredicate for RetryOnRateLimit {
///     fn should_retry(&self, outcome: &Result<Envelope>, _attempt: usize) -> bool {
///         matches!(outcome, Ok(response) if response.status().as_u16() == 429)
///     }
/// }
/// ```
pub trait RetryPredicate: Send + Sync {
    /// Returns `true` to send the request again.
    ///
    /// `attempt` is 1-indexed: the first call sees `1`.
    fn should_retry(&self, outcome: &Result<Envelope>, attempt: usize) -> bool;
}

impl<F> RetryPredicate for F
where
    F: Fn(&Result<Envelope>, usize) -> bool + Send + Sync,
{
    fn should_retry(&self, outcome: &Result<Envelope>, attempt: usize) -> bool {
        self(outcome, attempt)
    }
}

/// Retries transport faults, 5xx responses and `429 Too Many Requests`.
///
/// Successful and other 4xx responses are returned as-is.
#[derive(Debug, Clone, Copy)]
pub struct DefaultRetryPredicate;

impl RetryPredicate for DefaultRetryPredicate {
    fn should_retry(&self, outcome: &Result<Envelope>, _attempt: usize) -> bool {
        match outcome {
            Err(Error::Cancelled) => false,
            Err(_) => true,
            Ok(response) => {
                response.status().is_server_error()
                    || response.status() == StatusCode::TOO_MANY_REQUESTS
            }
        }
    }
}

/// Retry only on 5xx server errors.
#[derive(Debug, Clone, Copy)]
pub struct RetryOn5xx;

impl RetryPredicate for RetryOn5xx {
    fn should_retry(&self, outcome: &Result<Envelope>, _attempt: usize) -> bool {
        matches!(outcome, Ok(response) if response.status().is_server_error())
    }
}

/// Retry only on timeout errors.
#[derive(Debug, Clone, Copy)]
pub struct RetryOnTimeout;

impl RetryPredicate for RetryOnTimeout {
    fn should_retry(&self, outcome: &Result<Envelope>, _attempt: usize) -> bool {
        matches!(outcome, Err(Error::Timeout))
    }
}

/// Retry only on network/connection errors.
#[derive(Debug, Clone, Copy)]
pub struct RetryOnConnectionError;

impl RetryPredicate for RetryOnConnectionError {
    fn should_retry(&self, outcome: &Result<Envelope>, _attempt: usize) -> bool {
        matches!(outcome, Err(Error::Network(_)))
    }
}

/// Combine multiple retry predicates with OR logic.
///
/// Retries if ANY of the predicates return `true`.
///
/// # Examples
///
/// ```
/// use callpipe::retry::{OrPredicate, RetryOn5xx, RetryOnTimeout};
///
/// let predicate = OrPredicate::new(vec![
///     Box::new(RetryOn5xx),
///     Box::new(RetryOnTimeout),
/// ]);
/// ```
pub struct OrPredicate {
    predicates: Vec<Box<dyn RetryPredicate>>,
}

impl OrPredicate {
    /// Creates a new `OrPredicate` from a list of predicates.
    pub fn new(predicates: Vec<Box<dyn RetryPredicate>>) -> Self {
        Self { predicates }
    }
}

impl RetryPredicate for OrPredicate {
    fn should_retry(&self, outcome: &Result<Envelope>, attempt: usize) -> bool {
        self.predicates
            .iter()
            .any(|p| p.should_retry(outcome, attempt))
    }
}

/// Combine multiple retry predicates with AND logic.
///
/// Retries only if ALL of the predicates return `true`.
///
/// # Examples
///
/// ```
/// use callpipe::retry::{AndPredicate, RetryOn5xx};
/// use callpipe::{Envelope, Result};
///
/// let first_two = |_: &Result<Envelope>, attempt: usize| attempt <= 2;
///
/// let predicate = AndPredicate::new(vec![Box::new(RetryOn5xx), Box::new(first_two)]);
/// ```
pub struct AndPredicate {
    predicates: Vec<Box<dyn RetryPredicate>>,
}

impl AndPredicate {
    /// Creates a new `AndPredicate` from a list of predicates.
    pub fn new(predicates: Vec<Box<dyn RetryPredicate>>) -> Self {
        Self { predicates }
    }
}

impl RetryPredicate for AndPredicate {
    fn should_retry(&self, outcome: &Result<Envelope>, attempt: usize) -> bool {
        self.predicates
            .iter()
            .all(|p| p.should_retry(outcome, attempt))
    }
}

/// Sends `request` until the policy stops retrying.
///
/// Returns the final envelope together with the number of attempts made. A retryable
/// status on the last attempt is returned as an envelope with its body intact; a
/// transport fault on the last attempt is wrapped in [`Error::MaxRetriesExceeded`].
/// `policy` must already have its defaults applied.
pub(crate) async fn send_with_retry(
    transport: &dyn Transport,
    request: reqwest::Request,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<(Envelope, usize)> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let replay = request.try_clone().ok_or_else(|| {
            Error::ConfigurationError("Request body cannot be replayed".to_string())
        })?;

        tracing::debug!(
            method = %request.method(),
            url = %request.url(),
            attempt = attempt,
            max_attempts = max_attempts,
            "Executing HTTP request"
        );

        let outcome = transport::send_cancellable(transport, replay, cancel).await;
        if matches!(outcome, Err(Error::Cancelled)) {
            return Err(Error::Cancelled);
        }

        if !policy.should_retry(&outcome, attempt) {
            return outcome.map(|envelope| (envelope, attempt));
        }

        if attempt >= max_attempts {
            return match outcome {
                Ok(envelope) => {
                    tracing::warn!(
                        status = envelope.status().as_u16(),
                        attempts = attempt,
                        "Retries exhausted, returning last response"
                    );
                    Ok((envelope, attempt))
                }
                Err(e) => Err(Error::MaxRetriesExceeded {
                    attempts: attempt,
                    last_error: Box::new(e),
                }),
            };
        }

        match outcome {
            Ok(envelope) => {
                tracing::warn!(
                    status = envelope.status().as_u16(),
                    attempt = attempt,
                    "Retryable response, releasing body"
                );
                drop(envelope);
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt = attempt, "Request failed");
            }
        }

        wait_with_backoff(attempt - 1, policy, cancel).await?;
    }
}

/// Sleeps for the jittered backoff of a zero-indexed attempt, or until `cancel` fires.
pub(crate) async fn wait_with_backoff(
    attempt: usize,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<()> {
    let attempt = u32::try_from(attempt).unwrap_or(u32::MAX);
    let delay = backoff::jittered(attempt, policy.base_wait, policy.max_wait);

    tracing::info!(
        delay_ms = delay.as_millis(),
        attempt = attempt + 1,
        "Retrying request after delay"
    );

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderMap;
    use std::time::Instant;

    fn status(code: u16) -> Result<Envelope> {
        Ok(Envelope::new(
            StatusCode::from_u16(code).unwrap(),
            HeaderMap::new(),
            "",
        ))
    }

    #[test]
    fn test_default_predicate() {
        let p = DefaultRetryPredicate;
        assert!(p.should_retry(&Err(Error::Timeout), 1));
        assert!(p.should_retry(&status(500), 1));
        assert!(p.should_retry(&status(503), 1));
        assert!(p.should_retry(&status(429), 1));
        assert!(!p.should_retry(&status(200), 1));
        assert!(!p.should_retry(&status(404), 1));
        assert!(!p.should_retry(&Err(Error::Cancelled), 1));
    }

    #[test]
    fn test_narrow_predicates() {
        assert!(RetryOn5xx.should_retry(&status(502), 1));
        assert!(!RetryOn5xx.should_retry(&status(429), 1));
        assert!(!RetryOn5xx.should_retry(&Err(Error::Timeout), 1));

        assert!(RetryOnTimeout.should_retry(&Err(Error::Timeout), 1));
        assert!(!RetryOnTimeout.should_retry(&status(500), 1));

        assert!(!RetryOnConnectionError.should_retry(&Err(Error::Timeout), 1));
    }

    #[test]
    fn test_combinators() {
        let either = OrPredicate::new(vec![Box::new(RetryOn5xx), Box::new(RetryOnTimeout)]);
        assert!(either.should_retry(&status(500), 1));
        assert!(either.should_retry(&Err(Error::Timeout), 1));
        assert!(!either.should_retry(&status(429), 1));

        let first_only = |_: &Result<Envelope>, attempt: usize| attempt == 1;
        let both = AndPredicate::new(vec![Box::new(RetryOn5xx), Box::new(first_only)]);
        assert!(both.should_retry(&status(500), 1));
        assert!(!both.should_retry(&status(500), 2));
    }

    #[test]
    fn test_policy_defaults() {
        let policy = RetryPolicy::new(0, Duration::ZERO, Duration::ZERO).with_defaults();
        assert_eq!(policy.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(policy.base_wait, DEFAULT_BASE_WAIT);
        assert_eq!(policy.max_wait, DEFAULT_MAX_WAIT);

        let policy = RetryPolicy::new(7, Duration::from_millis(1), Duration::from_secs(1))
            .with_defaults();
        assert_eq!(policy.max_attempts, 7);
        assert_eq!(policy.base_wait, Duration::from_millis(1));
    }

    #[tokio::test]
    async fn test_pre_cancelled_wait_aborts_immediately() {
        let policy = RetryPolicy::new(3, Duration::from_secs(60), Duration::from_secs(60));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let start = Instant::now();
        let result = wait_with_backoff(0, &policy, &cancel).await;

        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_wait_completes_without_cancellation() {
        let policy = RetryPolicy::new(3, Duration::from_millis(2), Duration::from_millis(4));
        let cancel = CancellationToken::new();
        assert!(wait_with_backoff(0, &policy, &cancel).await.is_ok());
    }
}
