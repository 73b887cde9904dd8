//! In-memory nearest-neighbor index over chunk embeddings. Built once per
//! document and replaced wholesale; there is no in-place mutation.

use crate::domain::{DocumentChunk, DomainError, Embedding, Result, SearchResult};

#[derive(Debug)]
pub struct VectorIndex {
    entries: Vec<(DocumentChunk, Embedding)>,
    dimension: usize,
}

impl VectorIndex {
    /// Construct an index from parallel chunk/vector sequences. All vectors
    /// must share one dimension.
    pub fn build(chunks: Vec<DocumentChunk>, vectors: Vec<Embedding>) -> Result<Self> {
        if chunks.len() != vectors.len() {
            return Err(DomainError::configuration(format!(
                "chunk count ({}) does not match vector count ({})",
                chunks.len(),
                vectors.len()
            )));
        }

        let dimension = vectors.first().map(Embedding::dimension).unwrap_or(0);
        for vector in &vectors {
            if vector.dimension() != dimension {
                return Err(DomainError::dimension_mismatch(
                    dimension,
                    vector.dimension(),
                ));
            }
        }

        Ok(Self {
            entries: chunks.into_iter().zip(vectors).collect(),
            dimension,
        })
    }

    /// Top-k entries by cosine similarity, descending. Ties keep insertion
    /// order (stable sort); k is clamped to the index size.
    pub fn query(&self, query: &Embedding, k: usize) -> Result<Vec<SearchResult>> {
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }
        if query.dimension() != self.dimension {
            return Err(DomainError::dimension_mismatch(
                self.dimension,
                query.dimension(),
            ));
        }

        let mut results: Vec<SearchResult> = self
            .entries
            .iter()
            .map(|(chunk, embedding)| SearchResult {
                chunk: chunk.clone(),
                score: query.cosine_similarity(embedding),
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(k);

        Ok(results)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn chunk(content: &str, index: usize) -> DocumentChunk {
        DocumentChunk::new(Uuid::new_v4(), content, index)
    }

    fn index_of(vectors: Vec<Vec<f32>>) -> VectorIndex {
        let chunks = (0..vectors.len())
            .map(|i| chunk(&format!("chunk {i}"), i))
            .collect();
        let embeddings = vectors.into_iter().map(Embedding::new).collect();
        VectorIndex::build(chunks, embeddings).unwrap()
    }

    #[test]
    fn test_build_rejects_length_mismatch() {
        let err = VectorIndex::build(vec![chunk("a", 0)], vec![]).unwrap_err();
        assert!(matches!(err, DomainError::Configuration(_)));
    }

    #[test]
    fn test_build_rejects_inconsistent_dimensions() {
        let chunks = vec![chunk("a", 0), chunk("b", 1)];
        let vectors = vec![
            Embedding::new(vec![1.0, 0.0]),
            Embedding::new(vec![1.0, 0.0, 0.0]),
        ];
        let err = VectorIndex::build(chunks, vectors).unwrap_err();
        assert!(matches!(
            err,
            DomainError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_query_rejects_wrong_dimension() {
        let index = index_of(vec![vec![1.0, 0.0]]);
        let err = index.query(&Embedding::new(vec![1.0]), 1).unwrap_err();
        assert!(matches!(err, DomainError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_query_ranks_by_similarity() {
        let index = index_of(vec![
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![0.7, 0.7],
        ]);
        let results = index.query(&Embedding::new(vec![1.0, 0.0]), 3).unwrap();

        assert_eq!(results[0].chunk.content, "chunk 1");
        assert_eq!(results[1].chunk.content, "chunk 2");
        assert_eq!(results[2].chunk.content, "chunk 0");
    }

    #[test]
    fn test_query_clamps_k_to_index_size() {
        let index = index_of(vec![
            vec![1.0, 0.0],
            vec![0.9, 0.1],
            vec![0.8, 0.2],
        ]);
        let results = index.query(&Embedding::new(vec![1.0, 0.0]), 4).unwrap();
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn test_query_empty_index_returns_empty() {
        let index = VectorIndex::build(vec![], vec![]).unwrap();
        let results = index.query(&Embedding::new(vec![1.0]), 4).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let index = index_of(vec![
            vec![1.0, 0.0],
            vec![2.0, 0.0],
            vec![3.0, 0.0],
        ]);
        // All three are colinear with the query, so every score is 1.0.
        let results = index.query(&Embedding::new(vec![1.0, 0.0]), 3).unwrap();
        let contents: Vec<_> = results.iter().map(|r| r.chunk.content.as_str()).collect();
        assert_eq!(contents, vec!["chunk 0", "chunk 1", "chunk 2"]);
    }

    #[test]
    fn test_query_is_deterministic() {
        let index = index_of(vec![
            vec![0.2, 0.8],
            vec![0.5, 0.5],
            vec![0.9, 0.1],
        ]);
        let query = Embedding::new(vec![0.6, 0.4]);
        let a = index.query(&query, 2).unwrap();
        let b = index.query(&query, 2).unwrap();
        let ids_a: Vec<_> = a.iter().map(|r| r.chunk.id).collect();
        let ids_b: Vec<_> = b.iter().map(|r| r.chunk.id).collect();
        assert_eq!(ids_a, ids_b);
    }
}
