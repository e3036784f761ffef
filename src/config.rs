//! Endpoint configuration.
//!
//! `EndpointConfig` is the only place environment variables are read. Clients
//! receive a resolved config through their builders, so tests can inject
//! values directly instead of mutating the process environment.

/// Default base URL for the model inference endpoint.
pub const DEFAULT_HF_API_BASE: &str = "http://localhost:8088/models/owner/model";

/// Default base URL for the chat/generate endpoint.
pub const DEFAULT_MYSTER_API_BASE_URL: &str = "https://api.myster.example/v1/generate";

pub const HF_API_BASE_VAR: &str = "HF_API_BASE";
pub const HF_TOKEN_VAR: &str = "HF_TOKEN";
pub const MYSTER_API_BASE_URL_VAR: &str = "MYSTER_API_BASE_URL";
pub const MYSTER_API_KEY_VAR: &str = "MYSTER_API_KEY";

/// Target URL and optional bearer token for one remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    pub base_url: String,
    pub token: Option<String>,
}

impl EndpointConfig {
    /// Creates a config for `base_url` with no token.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
        }
    }

    /// Sets the bearer token. An empty string clears it.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = non_empty(token.into());
        self
    }

    /// Resolves a config from the environment.
    ///
    /// # Arguments
    ///
    /// * `url_var` - Variable holding the base URL, falls back to `default_url` when unset
    /// * `token_var` - Variable holding the bearer token; unset or empty means no token
    /// * `default_url` - Fallback base URL
    pub fn from_env(url_var: &str, token_var: &str, default_url: &str) -> Self {
        let base_url = std::env::var(url_var).unwrap_or_else(|_| default_url.to_string());
        let token = std::env::var(token_var).ok().and_then(non_empty);

        Self { base_url, token }
    }

    /// Reads `HF_API_BASE` and `HF_TOKEN`.
    pub fn hf_from_env() -> Self {
        Self::from_env(HF_API_BASE_VAR, HF_TOKEN_VAR, DEFAULT_HF_API_BASE)
    }

    /// Reads `MYSTER_API_BASE_URL` and `MYSTER_API_KEY`.
    pub fn myster_from_env() -> Self {
        Self::from_env(
            MYSTER_API_BASE_URL_VAR,
            MYSTER_API_KEY_VAR,
            DEFAULT_MYSTER_API_BASE_URL,
        )
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}
