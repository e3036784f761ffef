use crate::executor::{ExecutorError, RawResponse};

/// Common surface of the endpoint clients.
///
/// This trait enables mocking in unit tests and lets callers send plain text
/// without knowing which endpoint shape sits behind it.
pub trait EndpointClient: Send + Sync {
    /// Sends `text` using the endpoint's plain-text payload.
    fn send_text(&self, text: &str) -> Result<RawResponse, ExecutorError>;
}
