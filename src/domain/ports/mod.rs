mod embedding;
mod extraction;
mod generation;

pub use embedding::EmbeddingService;
pub use extraction::ExtractionService;
pub use generation::{CompletionStream, GenerationService};
