/// Retry policy and the blocking retry loop shared by every endpoint client.
use std::collections::BTreeSet;
use std::thread;
use std::time::Duration;

use tracing::warn;

use super::client::ExecutorError;

/// Upper bound applied to any single backoff or `Retry-After` delay.
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(120);

/// How many times a request is attempted, how long to wait between attempts,
/// and which HTTP statuses count as transient.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Seconds; the delay before retry `n` is `backoff_factor * 2^(n-1)`.
    pub backoff_factor: f64,
    pub retry_statuses: BTreeSet<u16>,
    /// Use an integer-seconds `Retry-After` header in place of the computed backoff.
    pub respect_retry_after: bool,
    pub backoff_max: Duration,
    /// Draw each computed backoff uniformly from `[0, delay]` ("full jitter").
    pub jitter: bool,
}

impl RetryPolicy {
    /// Creates a policy retrying on `retry_statuses`.
    pub fn new(max_attempts: u32, backoff_factor: f64, retry_statuses: &[u16]) -> Self {
        Self {
            max_attempts,
            backoff_factor,
            retry_statuses: retry_statuses.iter().copied().collect(),
            respect_retry_after: true,
            backoff_max: DEFAULT_BACKOFF_MAX,
            jitter: true,
        }
    }

    /// Policy for the model inference endpoint: 4 attempts, factor 0.5, {429, 503}.
    pub fn hf() -> Self {
        Self::new(4, 0.5, &[429, 503])
    }

    /// Policy for the chat/generate endpoint: 4 attempts, factor 0.5, {429, 502, 503}.
    pub fn myster() -> Self {
        Self::new(4, 0.5, &[429, 502, 503])
    }

    pub fn with_backoff_factor(mut self, backoff_factor: f64) -> Self {
        self.backoff_factor = backoff_factor;
        self
    }

    pub fn with_respect_retry_after(mut self, respect: bool) -> Self {
        self.respect_retry_after = respect;
        self
    }

    pub fn with_backoff_max(mut self, backoff_max: Duration) -> Self {
        self.backoff_max = backoff_max;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Returns `true` if a response with `status` should be retried.
    pub fn should_retry_status(&self, status: u16) -> bool {
        self.retry_statuses.contains(&status)
    }

    /// Un-jittered delay before retry number `retry` (1-based): 0.5s, 1s, 2s, ... for
    /// factor 0.5, never above `backoff_max`.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(retry - 1).unwrap_or(i32::MAX);
        let secs = self.backoff_factor * 2f64.powi(exponent);
        if secs.is_nan() || secs <= 0.0 {
            return Duration::ZERO;
        }

        Duration::try_from_secs_f64(secs).map_or(self.backoff_max, |d| d.min(self.backoff_max))
    }

    /// Delay actually slept before retry number `retry`.
    ///
    /// A server-supplied hint is used as-is (capped); otherwise the backoff curve
    /// is jittered when `jitter` is set.
    pub fn delay_for(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(hint) if self.respect_retry_after => hint.min(self.backoff_max),
            _ if self.jitter => full_jitter(self.backoff_delay(retry)),
            _ => self.backoff_delay(retry),
        }
    }
}

/// Uniform draw from `[0, delay]`.
fn full_jitter(delay: Duration) -> Duration {
    let secs = delay.as_secs_f64() * rand::random::<f64>();
    Duration::try_from_secs_f64(secs).map_or(delay, |d| d.min(delay))
}

/// What to do with a value an attempt produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Hand the value back to the caller.
    Accept,
    /// Transient; try again if attempts remain.
    Retry { retry_after: Option<Duration> },
}

/// Runs `attempt` until `classify` accepts its value or the policy's attempt budget runs out.
///
/// A value classified as [`Verdict::Retry`] on the final attempt is returned as-is,
/// so exhausting retries on a transient status is not an error. Connection-level
/// errors are retried within the same budget and the last one is returned.
///
/// # Arguments
///
/// * `policy` - Attempt budget and backoff curve
/// * `attempt` - Performs one attempt; receives the 1-based attempt number
/// * `classify` - Decides whether a successful attempt's value is final
pub fn retry_with_backoff<T, F, C>(
    policy: &RetryPolicy,
    mut attempt: F,
    classify: C,
) -> Result<T, ExecutorError>
where
    F: FnMut(u32) -> Result<T, ExecutorError>,
    C: Fn(&T) -> Verdict,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut number = 1;

    loop {
        let is_last = number >= max_attempts;

        let delay = match attempt(number) {
            Ok(value) => match classify(&value) {
                Verdict::Accept => return Ok(value),
                Verdict::Retry { .. } if is_last => return Ok(value),
                Verdict::Retry { retry_after } => {
                    let delay = policy.delay_for(number, retry_after);
                    warn!(attempt = number, ?delay, "transient response, retrying");
                    delay
                }
            },
            Err(e) if is_last || !should_retry(&e) => return Err(e),
            Err(e) => {
                let delay = policy.delay_for(number, None);
                warn!(attempt = number, ?delay, error = %e, "request failed, retrying");
                delay
            }
        };

        thread::sleep(delay);
        number += 1;
    }
}

/// Connection failures and timeouts are transient; configuration errors are not.
fn should_retry(error: &ExecutorError) -> bool {
    match error {
        ExecutorError::Network(_) => true,
        ExecutorError::Timeout(_) => true,
        ExecutorError::Serialization(_) => false,
        ExecutorError::InvalidUrl(_) => false,
        ExecutorError::InvalidToken => false,
    }
}
