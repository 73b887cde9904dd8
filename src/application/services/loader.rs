use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::NamedTempFile;
use tracing::{info, instrument};

use crate::domain::{
    ports::ExtractionService, Document, DomainError, MediaType, Result, TextBlock,
};

/// Turns an uploaded document into text blocks. Plain text is decoded
/// in-process; PDF is delegated to the extraction service. The upload is
/// spooled to a temp file whose lifetime is tied to the ingestion attempt.
pub struct DocumentLoader {
    extraction: Arc<dyn ExtractionService>,
}

/// Temporary on-disk copy of an upload. The backing file is removed when
/// this value is dropped, on every exit path of the attempt.
pub struct SpooledDocument {
    file: NamedTempFile,
    name: String,
    media_type: MediaType,
}

impl SpooledDocument {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }
}

impl DocumentLoader {
    pub fn new(extraction: Arc<dyn ExtractionService>) -> Self {
        Self { extraction }
    }

    /// Write the upload bytes to scoped temporary storage.
    #[instrument(skip(self, document), fields(document = %document.name))]
    pub fn spool(&self, document: &Document) -> Result<SpooledDocument> {
        let file = NamedTempFile::new()
            .map_err(|e| DomainError::internal(format!("temp file creation failed: {e}")))?;
        fs::write(file.path(), &document.bytes)
            .map_err(|e| DomainError::internal(format!("temp file write failed: {e}")))?;

        info!(path = %file.path().display(), "upload spooled to temp file");
        Ok(SpooledDocument {
            file,
            name: document.name.clone(),
            media_type: document.media_type,
        })
    }

    /// Extract text blocks from the spooled copy. Fails with `Extraction` if
    /// no text can be recovered.
    #[instrument(skip(self, spooled), fields(document = %spooled.name, media_type = spooled.media_type.as_str()))]
    pub async fn extract(&self, spooled: &SpooledDocument) -> Result<Vec<TextBlock>> {
        let bytes = fs::read(spooled.path())
            .map_err(|e| DomainError::internal(format!("temp file read failed: {e}")))?;

        let blocks = match spooled.media_type {
            MediaType::Text => {
                let text = String::from_utf8_lossy(&bytes).into_owned();
                if text.trim().is_empty() {
                    Vec::new()
                } else {
                    vec![TextBlock::new(text)]
                }
            }
            MediaType::Pdf => self.extraction.extract(&spooled.name, &bytes).await?,
        };

        if blocks.iter().all(|b| b.text.trim().is_empty()) {
            return Err(DomainError::extraction(
                "no text could be extracted from the document",
            ));
        }

        info!(blocks = blocks.len(), "document loaded");
        Ok(blocks)
    }

    /// Spool and extract in one step, releasing the temp copy before
    /// returning.
    pub async fn load(&self, document: &Document) -> Result<Vec<TextBlock>> {
        let spooled = self.spool(document)?;
        self.extract(&spooled).await
    }
}
