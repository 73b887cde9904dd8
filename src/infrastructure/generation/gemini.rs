use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{
    ports::{CompletionStream, GenerationService},
    DomainError,
};
use crate::infrastructure::config::{GenerationConfig, GenerationModel};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const API_KEY_VAR: &str = "GOOGLE_API_KEY";

/// Gemini `streamGenerateContent` over SSE. The returned stream owns the
/// response body; dropping it closes the connection, which is how early
/// abandonment by the consumer releases the call.
pub struct GeminiGeneration {
    client: reqwest::Client,
    base_url: String,
    model: GenerationModel,
    timeout: Duration,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<RequestContent>,
    contents: Vec<RequestContent>,
}

#[derive(Serialize)]
struct RequestContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Deserialize)]
struct GenerationChunk {
    #[serde(default)]
    candidates: Vec<ChunkCandidate>,
}

#[derive(Deserialize)]
struct ChunkCandidate {
    content: Option<ChunkContent>,
}

#[derive(Deserialize)]
struct ChunkContent {
    #[serde(default)]
    parts: Vec<ChunkPart>,
}

#[derive(Deserialize)]
struct ChunkPart {
    text: Option<String>,
}

impl GeminiGeneration {
    pub fn new(config: &GenerationConfig) -> Result<Self, DomainError> {
        // Only connection establishment is clocked; the body stream is
        // bounded by consumer lifetime, not a deadline.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| DomainError::internal(format!("http client build failed: {e}")))?;

        Ok(Self {
            client,
            base_url: API_BASE.to_string(),
            model: config.model,
            timeout: Duration::from_secs(config.timeout_seconds),
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
}

#[async_trait]
impl GenerationService for GeminiGeneration {
    async fn stream_completion(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<CompletionStream, DomainError> {
        let key = Self::api_key()?;
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url,
            self.model.as_str()
        );

        let body = GenerateContentRequest {
            system_instruction: (!system.is_empty()).then(|| RequestContent {
                role: None,
                parts: vec![RequestPart {
                    text: system.to_string(),
                }],
            }),
            contents: vec![RequestContent {
                role: Some("user"),
                parts: vec![RequestPart {
                    text: prompt.to_string(),
                }],
            }],
        };

        let request = self
            .client
            .post(&url)
            .header("x-goog-api-key", key)
            .json(&body)
            .send();
        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| DomainError::generation("generation request timed out"))?
            .map_err(|e| DomainError::generation(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(DomainError::generation(format!(
                "generation request returned {status}: {detail}"
            )));
        }

        let fragments = response
            .bytes_stream()
            .eventsource()
            .filter_map(|event| {
                futures::future::ready(match event {
                    Ok(event) => fragment_from(&event.data).map(Ok),
                    Err(e) => Some(Err(DomainError::generation(e.to_string()))),
                })
            });

        Ok(Box::pin(fragments))
    }
}

/// Concatenated text of one SSE event, or `None` for events carrying no
/// text (safety metadata, usage counts, the trailing empty event).
fn fragment_from(data: &str) -> Option<String> {
    if data.trim().is_empty() {
        return None;
    }

    let chunk: GenerationChunk = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            debug!(error = %e, "skipping undecodable stream event");
            return None;
        }
    };

    let text: String = chunk
        .candidates
        .iter()
        .filter_map(|c| c.content.as_ref())
        .flat_map(|c| c.parts.iter())
        .filter_map(|p| p.text.as_deref())
        .collect();

    (!text.is_empty()).then_some(text)
}
