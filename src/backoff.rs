//! Exponential backoff with jitter on the upper half.
//!
//! The capped exponential value for attempt `n` is `min(cap, base * 2^n)`. The wait
//! actually slept is drawn uniformly from `[backoff / 2, backoff)`, so it never exceeds
//! the cap and never collapses to zero unless the backoff itself is zero.

use rand::Rng;
use std::time::Duration;

/// Returns the capped, unjittered backoff for a zero-indexed attempt.
///
/// # Examples
///
/// ```
/// use callpipe::backoff::backoff;
/// use std::time::Duration;
///
/// let base = Duration::from_millis(200);
/// let cap = Duration::from_secs(10);
///
/// assert_eq!(backoff(0, base, cap), Duration::from_millis(200));
/// assert_eq!(backoff(5, base, cap), Duration::from_millis(6400));
/// assert_eq!(backoff(10, base, cap), cap);
/// ```
pub fn backoff(attempt: u32, base: Duration, cap: Duration) -> Duration {
    let multiplier = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    base.saturating_mul(multiplier).min(cap)
}

/// Returns the wait before retrying after a zero-indexed attempt.
///
/// The result lies in `[backoff / 2, backoff)`. A zero backoff yields a zero wait.
pub fn jittered(attempt: u32, base: Duration, cap: Duration) -> Duration {
    let backoff = backoff(attempt, base, cap);
    let half = backoff / 2;
    let range = u64::try_from(half.as_nanos()).unwrap_or(u64::MAX);
    if range == 0 {
        return half;
    }
    half + Duration::from_nanos(rand::thread_rng().gen_range(0..range))
}
