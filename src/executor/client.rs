/// Resilient request executor implementation.
///
/// This module provides `ResilientExecutor` for making synchronous JSON POST requests
/// with retry on transient failures, along with its error type and the raw response
/// it hands back.
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use super::retry::{RetryPolicy, Verdict, retry_with_backoff};
use crate::config::EndpointConfig;

/// Upper bound for establishing a connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound for a single attempt once connected.
pub const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Statuses whose `Retry-After` header overrides the computed backoff.
const RETRY_AFTER_STATUSES: [u16; 2] = [429, 503];

/// Errors that can occur when executing a request.
///
/// HTTP error statuses are not represented here: any response the server
/// sends back is returned as a [`RawResponse`].
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Network-related errors (connection failures, DNS resolution, etc.)
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Connect or read timeout
    #[error("Request timed out")]
    Timeout(#[source] reqwest::Error),

    /// Payload could not be encoded as JSON
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Invalid URL configuration error
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Token contains characters not allowed in an HTTP header
    #[error("Invalid bearer token")]
    InvalidToken,
}

impl ExecutorError {
    fn from_transport(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            ExecutorError::Timeout(error)
        } else {
            ExecutorError::Network(error)
        }
    }
}

/// Status, headers and body exactly as the server returned them.
///
/// Header names are lower-case. Repeated headers are joined with `", "`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl RawResponse {
    /// Looks up a header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn into_tuple(self) -> (u16, BTreeMap<String, String>, String) {
        (self.status, self.headers, self.body)
    }

    fn read(response: Response) -> Result<Self, ExecutorError> {
        let status = response.status().as_u16();

        let mut headers: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in response.headers() {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            headers
                .entry(name.as_str().to_string())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(&value);
                })
                .or_insert(value);
        }

        let body = response.text().map_err(ExecutorError::from_transport)?;

        Ok(Self {
            status,
            headers,
            body,
        })
    }

    /// Integer-seconds `Retry-After`; HTTP-date values are ignored.
    fn retry_after(&self) -> Option<Duration> {
        self.header(RETRY_AFTER.as_str())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }
}

impl fmt::Display for RawResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {:?}, {:?})", self.status, self.headers, self.body)
    }
}

/// Blocking HTTP session bound to one endpoint and one retry policy.
///
/// Endpoint clients create an executor inside each call and drop it when the
/// call returns, so no connection or state outlives a single request.
#[derive(Debug)]
pub struct ResilientExecutor {
    client: Client,
    url: reqwest::Url,
    policy: RetryPolicy,
}

impl ResilientExecutor {
    /// Opens a session for `config`.
    ///
    /// # Returns
    ///
    /// Returns `Err(ExecutorError::InvalidUrl)` if the base URL does not parse and
    /// `Err(ExecutorError::InvalidToken)` if the token cannot be sent as a header.
    ///
    /// # Headers
    ///
    /// Every request carries `Content-Type: application/json`. `Authorization: Bearer <token>`
    /// is added only when the config has a token.
    pub fn new(config: &EndpointConfig, policy: RetryPolicy) -> Result<Self, ExecutorError> {
        Self::with_timeouts(config, policy, CONNECT_TIMEOUT, READ_TIMEOUT)
    }

    /// Like [`ResilientExecutor::new`] with explicit connect and per-attempt timeouts.
    pub fn with_timeouts(
        config: &EndpointConfig,
        policy: RetryPolicy,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self, ExecutorError> {
        let url = reqwest::Url::parse(&config.base_url)
            .map_err(|e| ExecutorError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = &config.token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| ExecutorError::InvalidToken)?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(connect_timeout)
            .timeout(read_timeout)
            .build()
            .map_err(ExecutorError::Network)?;

        Ok(Self {
            client,
            url,
            policy,
        })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// POSTs `payload` as JSON, retrying per the policy.
    ///
    /// Any HTTP status is returned as a [`RawResponse`]; a retryable status that
    /// persists through the last attempt is returned as well. Only connection-level
    /// failures that outlast the retry budget surface as errors.
    pub fn post_json<P>(&self, payload: &P) -> Result<RawResponse, ExecutorError>
    where
        P: Serialize + ?Sized,
    {
        let body = serde_json::to_vec(payload).map_err(ExecutorError::Serialization)?;

        retry_with_backoff(
            &self.policy,
            |attempt| {
                debug!(url = %self.url, attempt, "posting request");

                let response = self
                    .client
                    .post(self.url.clone())
                    .body(body.clone())
                    .send()
                    .map_err(ExecutorError::from_transport)?;

                let response = RawResponse::read(response)?;
                debug!(status = response.status, attempt, "received response");
                Ok(response)
            },
            |response| self.verdict(response),
        )
    }

    fn verdict(&self, response: &RawResponse) -> Verdict {
        if !self.policy.should_retry_status(response.status) {
            return Verdict::Accept;
        }

        let retry_after = if RETRY_AFTER_STATUSES.contains(&response.status) {
            response.retry_after()
        } else {
            None
        };

        Verdict::Retry { retry_after }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::error::Error;
    use std::net::TcpListener;
    use std::time::Instant;

    fn config(url: &str) -> EndpointConfig {
        EndpointConfig::new(url)
    }

    fn response_with(headers: &[(&str, &str)]) -> RawResponse {
        RawResponse {
            status: 503,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: String::new(),
        }
    }

    fn no_delay() -> RetryPolicy {
        RetryPolicy::hf().with_backoff_factor(0.0).with_jitter(false)
    }

    #[test]
    fn refused_connection_maps_to_network_error() {
        let error = reqwest::blocking::Client::new()
            .post("http://127.0.0.1:1/")
            .send()
            .unwrap_err();

        let error = ExecutorError::from_transport(error);
        assert!(matches!(error, ExecutorError::Network(_)));
        assert!(error.to_string().contains("Network error"));
        assert!(error.source().is_some());
    }

    #[test]
    fn slow_server_maps_to_timeout_error() {
        // Accepted by the kernel backlog but never answered.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());

        let error = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(200))
            .build()
            .unwrap()
            .post(&url)
            .send()
            .unwrap_err();

        let error = ExecutorError::from_transport(error);
        assert!(matches!(error, ExecutorError::Timeout(_)));
        assert_eq!(error.to_string(), "Request timed out");
    }

    #[test]
    fn read_timeout_is_applied_and_retried() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/models/a", listener.local_addr().unwrap());

        let executor = ResilientExecutor::with_timeouts(
            &config(&url),
            no_delay(),
            Duration::from_millis(200),
            Duration::from_millis(200),
        )
        .unwrap();

        let start = Instant::now();
        let result = executor.post_json(&serde_json::json!({"inputs": "x"}));

        assert!(matches!(result, Err(ExecutorError::Timeout(_))));
        // Four attempts of 200ms each, far below the 30s default.
        assert!(start.elapsed() >= Duration::from_millis(800));
        assert!(start.elapsed() < READ_TIMEOUT);
    }

    #[test]
    fn unserializable_payload_is_rejected_before_sending() {
        let payload: HashMap<(u8, u8), u8> = HashMap::from([((1, 2), 3)]);
        let executor = ResilientExecutor::new(&config("http://127.0.0.1:1/"), no_delay())
            .unwrap();

        let error = executor.post_json(&payload).unwrap_err();
        assert!(matches!(error, ExecutorError::Serialization(_)));
        assert!(error.to_string().contains("Serialization error"));
    }

    #[test]
    fn new_rejects_invalid_url() {
        let result = ResilientExecutor::new(&config("not-a-valid-url"), RetryPolicy::hf());
        match result {
            Err(ExecutorError::InvalidUrl(message)) => {
                assert!(message.contains("not-a-valid-url"));
            }
            other => panic!("Expected InvalidUrl error, got {other:?}"),
        }
    }

    #[test]
    fn new_rejects_token_with_newline() {
        let config = config("http://localhost:8088").with_token("abc\ndef");
        let result = ResilientExecutor::new(&config, RetryPolicy::hf());
        assert!(matches!(result, Err(ExecutorError::InvalidToken)));
    }

    #[test]
    fn new_keeps_url_and_policy() {
        let executor =
            ResilientExecutor::new(&config("http://localhost:8088/models/a"), RetryPolicy::myster())
                .unwrap();
        assert_eq!(executor.url(), "http://localhost:8088/models/a");
        assert_eq!(executor.policy(), &RetryPolicy::myster());
    }

    #[test]
    fn is_success_covers_only_2xx() {
        let mut response = response_with(&[]);
        assert!(!response.is_success());

        response.status = 204;
        assert!(response.is_success());

        response.status = 302;
        assert!(!response.is_success());
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let response = response_with(&[("x-request-id", "42")]);
        assert_eq!(response.header("X-Request-Id"), Some("42"));
        assert_eq!(response.header("missing"), None);
    }

    #[test]
    fn retry_after_parses_integer_seconds() {
        let response = response_with(&[("retry-after", " 3 ")]);
        assert_eq!(response.retry_after(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn retry_after_ignores_http_dates() {
        let response = response_with(&[("retry-after", "Wed, 21 Oct 2015 07:28:00 GMT")]);
        assert_eq!(response.retry_after(), None);
    }

    #[test]
    fn verdict_follows_policy_statuses() {
        let executor =
            ResilientExecutor::new(&config("http://localhost:8088"), RetryPolicy::hf()).unwrap();

        let mut response = response_with(&[("retry-after", "2")]);
        assert_eq!(
            executor.verdict(&response),
            Verdict::Retry {
                retry_after: Some(Duration::from_secs(2))
            }
        );

        response.status = 500;
        assert_eq!(executor.verdict(&response), Verdict::Accept);
    }

    #[test]
    fn retry_after_is_ignored_for_bad_gateway() {
        let executor =
            ResilientExecutor::new(&config("http://localhost:8088"), RetryPolicy::myster())
                .unwrap();

        let mut response = response_with(&[("retry-after", "7")]);
        response.status = 502;
        assert_eq!(
            executor.verdict(&response),
            Verdict::Retry { retry_after: None }
        );

        response.status = 429;
        assert_eq!(
            executor.verdict(&response),
            Verdict::Retry {
                retry_after: Some(Duration::from_secs(7))
            }
        );
    }

    #[test]
    fn display_renders_tuple() {
        let response = RawResponse {
            status: 200,
            headers: BTreeMap::from([("content-type".to_string(), "text/plain".to_string())]),
            body: "ok".to_string(),
        };
        assert_eq!(
            response.to_string(),
            r#"(200, {"content-type": "text/plain"}, "ok")"#
        );
    }

    #[test]
    fn into_tuple_keeps_fields() {
        let response = response_with(&[]);
        let (status, headers, body) = response.into_tuple();
        assert_eq!(status, 503);
        assert!(headers.is_empty());
        assert!(body.is_empty());
    }
}
