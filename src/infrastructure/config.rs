use std::env;
use std::str::FromStr;

use crate::domain::{DomainError, Result};

pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are Document RAG Assistant.
Your role is to help users understand and explore the content of uploaded documents.

Follow these rules:
1. Always prioritize the document context when answering questions.
2. If the answer is not in the document, clearly say you don't know.
3. Keep responses friendly, clear, and concise.
";

#[derive(Debug, Clone)]
pub struct Config {
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
    pub extraction: ExtractionConfig,
    pub server: ServerConfig,
    pub system_prompt: String,
}

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub max_size: usize,
    pub overlap: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub model: String,
    pub dimension: usize,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub model: GenerationModel,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
}

/// The generation models the service will talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GenerationModel {
    #[default]
    Gemini15Flash,
    Gemini20Flash,
    Gemini25Flash,
}

impl GenerationModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini15Flash => "gemini-1.5-flash",
            Self::Gemini20Flash => "gemini-2.0-flash",
            Self::Gemini25Flash => "gemini-2.5-flash",
        }
    }
}

impl FromStr for GenerationModel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "gemini-1.5-flash" => Ok(Self::Gemini15Flash),
            "gemini-2.0-flash" => Ok(Self::Gemini20Flash),
            "gemini-2.5-flash" => Ok(Self::Gemini25Flash),
            other => Err(DomainError::configuration(format!(
                "unknown generation model: {other}"
            ))),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig {
                max_size: 1000,
                overlap: 100,
            },
            retrieval: RetrievalConfig { top_k: 4 },
            embedding: EmbeddingConfig {
                model: "models/gemini-embedding-exp-03-07".to_string(),
                dimension: 3072,
                timeout_seconds: 30,
            },
            generation: GenerationConfig {
                model: GenerationModel::default(),
                timeout_seconds: 60,
            },
            extraction: ExtractionConfig {
                base_url: "http://localhost:5001".to_string(),
                timeout_seconds: 120,
            },
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                allowed_origins: Vec::new(),
            },
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl Config {
    /// Defaults overridden from the environment. Call after
    /// `dotenvy::dotenv()` so a local `.env` participates.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(v) = parse_var("CHUNK_MAX_SIZE")? {
            config.chunking.max_size = v;
        }
        if let Some(v) = parse_var("CHUNK_OVERLAP")? {
            config.chunking.overlap = v;
        }
        if config.chunking.overlap >= config.chunking.max_size {
            return Err(DomainError::configuration(
                "CHUNK_OVERLAP must be smaller than CHUNK_MAX_SIZE",
            ));
        }
        if let Some(v) = parse_var("RETRIEVER_K")? {
            config.retrieval.top_k = v;
        }
        if let Ok(v) = env::var("EMBEDDING_MODEL") {
            config.embedding.model = v;
        }
        if let Some(v) = parse_var("EMBEDDING_DIMENSION")? {
            config.embedding.dimension = v;
        }
        if let Ok(v) = env::var("GENERATION_MODEL") {
            config.generation.model = v.parse()?;
        }
        if let Some(v) = parse_var("GENERATION_TIMEOUT_SECONDS")? {
            config.generation.timeout_seconds = v;
        }
        if let Ok(v) = env::var("EXTRACTION_URL") {
            config.extraction.base_url = v;
        }
        if let Ok(v) = env::var("SYSTEM_PROMPT") {
            config.system_prompt = v;
        }
        if let Ok(v) = env::var("SERVER_HOST") {
            config.server.host = v;
        }
        if let Some(v) = parse_var("SERVER_PORT")? {
            config.server.port = v;
        }
        if let Ok(v) = env::var("ALLOWED_ORIGINS") {
            config.server.allowed_origins =
                v.split(',').map(|s| s.trim().to_string()).collect();
        }

        Ok(config)
    }
}

fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| DomainError::configuration(format!("invalid value for {name}: {raw}"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.chunking.max_size, 1000);
        assert_eq!(config.chunking.overlap, 100);
        assert_eq!(config.retrieval.top_k, 4);
        assert_eq!(config.generation.model, GenerationModel::Gemini15Flash);
    }

    #[test]
    fn test_generation_model_round_trip() {
        for model in [
            GenerationModel::Gemini15Flash,
            GenerationModel::Gemini20Flash,
            GenerationModel::Gemini25Flash,
        ] {
            assert_eq!(model.as_str().parse::<GenerationModel>().unwrap(), model);
        }
        assert!("gpt-4".parse::<GenerationModel>().is_err());
    }
}
