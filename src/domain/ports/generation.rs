use crate::domain::errors::DomainError;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Fragment-by-fragment completion stream. Finite; dropping it releases the
/// underlying connection.
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<String, DomainError>> + Send>>;

/// Remote generative language model. The prompt carries the full context for
/// one answer; conversation state is the caller's concern.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn stream_completion(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<CompletionStream, DomainError>;
}
