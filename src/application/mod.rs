//! Application layer - Use cases and orchestration.
//!
//! This module contains application services that orchestrate domain logic
//! and infrastructure. Services depend on domain ports (traits) rather than
//! concrete implementations.

pub mod services;
pub mod session;

pub use services::{
    AnswerPipeline, AnswerStream, DocumentLoader, IngestEvent, IngestReport, IngestStage,
    IngestionOrchestrator, Retriever,
};
pub use session::SessionContext;
