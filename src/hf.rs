/// Client for the hosted model inference endpoint.
use serde::Serialize;

use crate::config::EndpointConfig;
use crate::endpoint::EndpointClient;
use crate::executor::{ExecutorError, RawResponse, ResilientExecutor, RetryPolicy};

/// Request body sent to the inference endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HfPayload<'a> {
    pub inputs: &'a str,
}

/// Builder for constructing `HfClient` instances.
///
/// # Examples
///
/// ```
/// use inference_clients::{EndpointConfig, HfClientBuilder};
///
/// let client = HfClientBuilder::new()
///     .config(EndpointConfig::new("http://localhost:8088/models/owner/model"))
///     .build()
///     .expect("Failed to create client");
/// ```
#[derive(Debug, Default)]
pub struct HfClientBuilder {
    config: Option<EndpointConfig>,
    retry_policy: Option<RetryPolicy>,
}

impl HfClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: EndpointConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Builds the `HfClient`.
    ///
    /// # Environment Variables
    ///
    /// If `config()` was not called, `HF_API_BASE` and `HF_TOKEN` are read here,
    /// falling back to `http://localhost:8088/models/owner/model` and no token.
    ///
    /// # Returns
    ///
    /// Returns `Err(ExecutorError::InvalidUrl)` if the base URL is malformed.
    pub fn build(self) -> Result<HfClient, ExecutorError> {
        let config = self.config.unwrap_or_else(EndpointConfig::hf_from_env);
        let retry_policy = self.retry_policy.unwrap_or_else(RetryPolicy::hf);

        reqwest::Url::parse(&config.base_url)
            .map_err(|e| ExecutorError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;

        Ok(HfClient {
            config,
            retry_policy,
        })
    }
}

/// Synchronous client for the inference endpoint.
///
/// Holds only configuration; each call opens and drops its own session.
#[derive(Debug, Clone)]
pub struct HfClient {
    config: EndpointConfig,
    retry_policy: RetryPolicy,
}

impl HfClient {
    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Posts `{"inputs": inputs}` and returns the raw response.
    pub fn post(&self, inputs: &str) -> Result<RawResponse, ExecutorError> {
        let executor = ResilientExecutor::new(&self.config, self.retry_policy.clone())?;
        executor.post_json(&HfPayload { inputs })
    }
}

impl EndpointClient for HfClient {
    fn send_text(&self, text: &str) -> Result<RawResponse, ExecutorError> {
        self.post(text)
    }
}
