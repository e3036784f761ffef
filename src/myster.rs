/// Client for the chat/generate endpoint.
///
/// The endpoint accepts either a conversation or a single text input. Exactly one
/// of the two payload shapes is sent per call.
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::EndpointConfig;
use crate::endpoint::EndpointClient;
use crate::executor::{ExecutorError, RawResponse, ResilientExecutor, RetryPolicy};

/// One entry of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }
}

/// Request body sent to the chat/generate endpoint.
///
/// Serializes as `{"type": "chat", "messages": [...]}` or
/// `{"type": "text", "input": ...}`; `input` is `null` when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MysterPayload<'a> {
    Chat { messages: &'a [ChatMessage] },
    Text { input: Option<&'a str> },
}

impl<'a> MysterPayload<'a> {
    /// Picks the payload shape: non-empty `messages` wins over `inputs`.
    pub fn select(messages: Option<&'a [ChatMessage]>, inputs: Option<&'a str>) -> Self {
        match messages {
            Some(messages) if !messages.is_empty() => MysterPayload::Chat { messages },
            _ => MysterPayload::Text { input: inputs },
        }
    }
}

/// Builder for constructing `MysterClient` instances.
#[derive(Debug, Default)]
pub struct MysterClientBuilder {
    config: Option<EndpointConfig>,
    retry_policy: Option<RetryPolicy>,
}

impl MysterClientBuilder {
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

    /// Builds the `MysterClient`.
    ///
    /// # Environment Variables
    ///
    /// If `config()` was not called, `MYSTER_API_BASE_URL` and `MYSTER_API_KEY` are
    /// read here, falling back to `https://api.myster.example/v1/generate` and no token.
    pub fn build(self) -> Result<MysterClient, ExecutorError> {
        let config = self.config.unwrap_or_else(EndpointConfig::myster_from_env);
        let retry_policy = self.retry_policy.unwrap_or_else(RetryPolicy::myster);

        reqwest::Url::parse(&config.base_url)
            .map_err(|e| ExecutorError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;

        Ok(MysterClient {
            config,
            retry_policy,
        })
    }
}

/// Synchronous client for the chat/generate endpoint.
#[derive(Debug, Clone)]
pub struct MysterClient {
    config: EndpointConfig,
    retry_policy: RetryPolicy,
}

impl MysterClient {
    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Posts a chat payload when `messages` is non-empty, otherwise a text payload
    /// built from `inputs`.
    ///
    /// Passing neither is allowed and sends `{"type": "text", "input": null}`.
    pub fn post(
        &self,
        messages: Option<&[ChatMessage]>,
        inputs: Option<&str>,
    ) -> Result<RawResponse, ExecutorError> {
        let payload = MysterPayload::select(messages, inputs);
        if matches!(payload, MysterPayload::Text { input: None }) {
            warn!("no messages or input supplied, sending null input");
        }

        let executor = ResilientExecutor::new(&self.config, self.retry_policy.clone())?;
        executor.post_json(&payload)
    }

    pub fn chat(&self, messages: &[ChatMessage]) -> Result<RawResponse, ExecutorError> {
        self.post(Some(messages), None)
    }

    pub fn generate(&self, input: &str) -> Result<RawResponse, ExecutorError> {
        self.post(None, Some(input))
    }
}

impl EndpointClient for MysterClient {
    fn send_text(&self, text: &str) -> Result<RawResponse, ExecutorError> {
        self.generate(text)
    }
}
