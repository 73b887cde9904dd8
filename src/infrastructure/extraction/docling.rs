use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::domain::{ports::ExtractionService, DomainError, TextBlock};
use crate::infrastructure::config::ExtractionConfig;

const TOKEN_VAR: &str = "HUGGINGFACEHUB_API_TOKEN";

/// Client for a docling conversion deployment, which turns PDF bytes into
/// structured text blocks. The deployment authenticates with a Hugging Face
/// token passed as a bearer credential.
pub struct DoclingExtractor {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct ConvertRequest<'a> {
    filename: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct ConvertResponse {
    #[serde(default)]
    blocks: Vec<ConvertBlock>,
}

#[derive(Deserialize)]
struct ConvertBlock {
    text: String,
    page: Option<usize>,
    section: Option<String>,
}

impl DoclingExtractor {
    pub fn new(config: &ExtractionConfig) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| DomainError::internal(format!("http client build failed: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn token() -> Result<String, DomainError> {
        std::env::var(TOKEN_VAR)
            .map_err(|_| DomainError::missing_credential(format!("{TOKEN_VAR} is not set")))
    }
}

#[async_trait]
impl ExtractionService for DoclingExtractor {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn extract(&self, file_name: &str, bytes: &[u8]) -> Result<Vec<TextBlock>, DomainError> {
        let token = Self::token()?;

        let body = ConvertRequest {
            filename: file_name,
            content: STANDARD.encode(bytes),
        };

        let response = self
            .client
            .post(format!("{}/v1/convert", self.base_url))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| DomainError::extraction(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(DomainError::extraction(format!(
                "conversion request returned {status}: {detail}"
            )));
        }

        let converted: ConvertResponse = response
            .json()
            .await
            .map_err(|e| DomainError::extraction(format!("malformed conversion response: {e}")))?;

        let blocks: Vec<TextBlock> = converted
            .blocks
            .into_iter()
            .map(|b| TextBlock {
                text: b.text,
                page: b.page,
                section: b.section,
            })
            .collect();

        info!(blocks = blocks.len(), "document converted");
        Ok(blocks)
    }
}
