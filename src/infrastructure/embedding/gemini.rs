use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{ports::EmbeddingService, DomainError, Embedding};
use crate::infrastructure::config::EmbeddingConfig;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const API_KEY_VAR: &str = "GOOGLE_API_KEY";

/// Gemini embedding endpoints (`embedContent` / `batchEmbedContents`). The
/// batch endpoint returns vectors in request order, which is what keeps
/// chunk i aligned with vector i.
pub struct GeminiEmbedding {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimension: usize,
}

#[derive(Serialize)]
struct EmbedContentRequest {
    model: String,
    content: RequestContent,
}

#[derive(Serialize)]
struct BatchEmbedRequest {
    requests: Vec<EmbedContentRequest>,
}

#[derive(Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

impl GeminiEmbedding {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| DomainError::internal(format!("http client build failed: {e}")))?;

        Ok(Self {
            client,
            base_url: API_BASE.to_string(),
            model: qualified(&config.model),
            dimension: config.dimension,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn api_key() -> Result<String, DomainError> {
        std::env::var(API_KEY_VAR)
            .map_err(|_| DomainError::missing_credential(format!("{API_KEY_VAR} is not set")))
    }

    fn request_for(&self, text: &str) -> EmbedContentRequest {
        EmbedContentRequest {
            model: self.model.clone(),
            content: RequestContent {
                parts: vec![RequestPart {
                    text: text.to_string(),
                }],
            },
        }
    }

    async fn post<Req: Serialize, Res: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &Req,
    ) -> Result<Res, DomainError> {
        let key = Self::api_key()?;
        let url = format!("{}/{}:{}", self.base_url, self.model, endpoint);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", key)
            .json(body)
            .send()
            .await
            .map_err(|e| DomainError::embedding(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(DomainError::embedding(format!(
                "embedding request returned {status}: {detail}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| DomainError::embedding(format!("malformed embedding response: {e}")))
    }
}

#[async_trait]
impl EmbeddingService for GeminiEmbedding {
    async fn embed(&self, text: &str) -> Result<Embedding, DomainError> {
        let response: EmbedContentResponse =
            self.post("embedContent", &self.request_for(text)).await?;
        Ok(Embedding::new(response.embedding.values))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = BatchEmbedRequest {
            requests: texts.iter().map(|t| self.request_for(t)).collect(),
        };
        let response: BatchEmbedResponse = self.post("batchEmbedContents", &body).await?;

        if response.embeddings.len() != texts.len() {
            return Err(DomainError::embedding(format!(
                "embedding count mismatch: sent {}, received {}",
                texts.len(),
                response.embeddings.len()
            )));
        }

        Ok(response
            .embeddings
            .into_iter()
            .map(|e| Embedding::new(e.values))
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// The REST path expects the `models/` prefix; accept configs with or
/// without it.
fn qualified(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}
