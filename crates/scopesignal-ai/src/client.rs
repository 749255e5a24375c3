//! The remote call seam: one attempt of a classification request.

use async_trait::async_trait;

use crate::TransportError;

/// A remote model that answers one (system, user) message pair with raw text.
///
/// Implementations perform a single attempt and must bound it with a
/// timeout; retries, parsing, and validation happen above this trait.
/// Failures are returned as errors, never as malformed success payloads.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Model identifier recorded in call metadata.
    fn model(&self) -> &str;

    async fn complete(&self, system: &str, user: &str) -> Result<String, TransportError>;
}
