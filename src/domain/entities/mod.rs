mod conversation;
mod document;
mod embedding;

pub use conversation::{Conversation, Message, MessageRole};
pub use document::{ChunkMetadata, Document, DocumentChunk, MediaType, SearchResult, TextBlock};
pub use embedding::Embedding;
