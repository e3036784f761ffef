pub mod config;
pub mod endpoint;
pub mod executor;
pub mod hf;
pub mod myster;

pub use config::EndpointConfig;
pub use endpoint::EndpointClient;
pub use executor::{ExecutorError, RawResponse, ResilientExecutor, RetryPolicy};
pub use hf::{HfClient, HfClientBuilder};
pub use myster::{ChatMessage, MysterClient, MysterClientBuilder, MysterPayload};
