use crate::domain::document::Document;
use crate::domain::provider::Action;
use async_trait::async_trait;

/// Carries push envelopes to the backend.
///
/// Retries, authentication, timeouts and wire framing are the implementation's
/// business; errors are passed through to callers uninterpreted.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Sends `request` for `action` and returns the backend's reply.
    ///
    /// # Errors
    /// Returns an error if the backend could not be reached or rejected the request.
    async fn execute(&self, action: Action, request: Document) -> anyhow::Result<Document>;
}
