use crate::domain::{errors::DomainError, Embedding};
use async_trait::async_trait;

/// Remote embedding service. `embed_batch` must preserve input order: the
/// vector at position i corresponds to the text at position i.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Embedding, DomainError>;
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError>;
    fn dimension(&self) -> usize;
}
