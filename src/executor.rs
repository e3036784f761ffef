/// Resilient request executor.
///
/// This module provides a blocking JSON POST executor that retries transient
/// HTTP statuses and connection failures with exponential backoff.
mod client;
mod retry;

pub use client::{CONNECT_TIMEOUT, ExecutorError, READ_TIMEOUT, RawResponse, ResilientExecutor};
pub use retry::{DEFAULT_BACKOFF_MAX, RetryPolicy, Verdict, retry_with_backoff};
