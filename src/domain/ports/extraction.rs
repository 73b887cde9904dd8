use crate::domain::{errors::DomainError, TextBlock};
use async_trait::async_trait;

/// Structured-document extraction service for formats the loader cannot
/// decode itself (PDF). Requires its own access credential; a missing
/// credential is reported as `MissingCredential`, distinct from extraction
/// failures.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    async fn extract(&self, file_name: &str, bytes: &[u8]) -> Result<Vec<TextBlock>, DomainError>;
}
