use std::sync::Arc;
use tracing::instrument;

use crate::domain::{ports::EmbeddingService, DomainError, SearchResult, VectorIndex};

/// Embeds a question and queries the active index with a fixed k. There is
/// no similarity floor: an empty result can only come from an empty index.
pub struct Retriever {
    embedding: Arc<dyn EmbeddingService>,
    index: Arc<VectorIndex>,
    top_k: usize,
}

impl Retriever {
    pub fn new(
        embedding: Arc<dyn EmbeddingService>,
        index: Arc<VectorIndex>,
        top_k: usize,
    ) -> Self {
        Self {
            embedding,
            index,
            top_k,
        }
    }

    #[instrument(skip(self, question), fields(top_k = self.top_k))]
    pub async fn retrieve(&self, question: &str) -> Result<Vec<SearchResult>, DomainError> {
        let query = self.embedding.embed(question).await?;
        self.index.query(&query, self.top_k)
    }

    pub fn chunk_count(&self) -> usize {
        self.index.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DocumentChunk, Embedding};
    use async_trait::async_trait;
    use uuid::Uuid;

    struct FixedEmbedding(Vec<f32>);

    #[async_trait]
    impl EmbeddingService for FixedEmbedding {
        async fn embed(&self, _text: &str) -> Result<Embedding, DomainError> {
            Ok(Embedding::new(self.0.clone()))
        }

        async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError> {
            Ok(texts.iter().map(|_| Embedding::new(self.0.clone())).collect())
        }

        fn dimension(&self) -> usize {
            self.0.len()
        }
    }

    fn index_of(vectors: Vec<Vec<f32>>) -> Arc<VectorIndex> {
        let doc_id = Uuid::new_v4();
        let chunks = (0..vectors.len())
            .map(|i| DocumentChunk::new(doc_id, format!("chunk {i}"), i))
            .collect();
        let embeddings = vectors.into_iter().map(Embedding::new).collect();
        Arc::new(VectorIndex::build(chunks, embeddings).unwrap())
    }

    #[tokio::test]
    async fn test_retrieve_returns_top_k() {
        let index = index_of(vec![
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![0.9, 0.1],
        ]);
        let retriever = Retriever::new(Arc::new(FixedEmbedding(vec![1.0, 0.0])), index, 2);

        let results = retriever.retrieve("anything").await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.content, "chunk 0");
        assert_eq!(results[1].chunk.content, "chunk 2");
    }

    #[tokio::test]
    async fn test_retrieve_empty_index_is_empty_not_error() {
        let retriever = Retriever::new(
            Arc::new(FixedEmbedding(vec![1.0])),
            Arc::new(VectorIndex::build(vec![], vec![]).unwrap()),
            4,
        );
        let results = retriever.retrieve("anything").await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_embedding_failure_passes_through() {
        struct FailingEmbedding;

        #[async_trait]
        impl EmbeddingService for FailingEmbedding {
            async fn embed(&self, _text: &str) -> Result<Embedding, DomainError> {
                Err(DomainError::embedding("service unavailable"))
            }

            async fn embed_batch(&self, _texts: &[&str]) -> Result<Vec<Embedding>, DomainError> {
                Err(DomainError::embedding("service unavailable"))
            }

            fn dimension(&self) -> usize {
                1
            }
        }

        let retriever = Retriever::new(
            Arc::new(FailingEmbedding),
            index_of(vec![vec![1.0]]),
            4,
        );
        let err = retriever.retrieve("anything").await.unwrap_err();
        assert!(matches!(err, DomainError::EmbeddingService(_)));
    }
}
