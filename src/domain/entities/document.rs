use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An uploaded document awaiting ingestion. Lives only for the duration of
/// one ingestion attempt; the payload is never persisted.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: Uuid,
    pub name: String,
    pub media_type: MediaType,
    pub bytes: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

impl Document {
    pub fn from_upload(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let media_type = MediaType::from_name(&name);
        Self {
            id: Uuid::new_v4(),
            name,
            media_type,
            bytes,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Text,
    Pdf,
}

impl MediaType {
    /// Anything without a `.pdf` extension is treated as plain text.
    pub fn from_name(name: &str) -> Self {
        if name.to_lowercase().ends_with(".pdf") {
            Self::Pdf
        } else {
            Self::Text
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Pdf => "pdf",
        }
    }
}

/// A unit of extracted text with optional provenance, produced by the loader
/// and consumed by the chunker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
    pub page: Option<usize>,
    pub section: Option<String>,
}

impl TextBlock {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            page: None,
            section: None,
        }
    }

    pub fn with_page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: Uuid,
    pub document_id: Uuid,
    pub content: String,
    pub chunk_index: usize,
    pub metadata: ChunkMetadata,
}

impl DocumentChunk {
    pub fn new(document_id: Uuid, content: impl Into<String>, chunk_index: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            content: content.into(),
            chunk_index,
            metadata: ChunkMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: ChunkMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub page: Option<usize>,
    pub section: Option<String>,
}

impl ChunkMetadata {
    pub fn from_block(block: &TextBlock) -> Self {
        Self {
            page: block.page,
            section: block.section.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk: DocumentChunk,
    pub score: f32,
}
