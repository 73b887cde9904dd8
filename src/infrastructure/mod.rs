pub mod config;
pub mod embedding;
pub mod extraction;
pub mod generation;

pub use config::{
    ChunkingConfig, Config, EmbeddingConfig, ExtractionConfig, GenerationConfig, GenerationModel,
    RetrievalConfig, ServerConfig,
};
pub use embedding::GeminiEmbedding;
pub use extraction::DoclingExtractor;
pub use generation::GeminiGeneration;
