mod answer;
mod ingestion;
mod loader;
mod retriever;

pub use answer::{AnswerPipeline, AnswerStream};
pub use ingestion::{IngestEvent, IngestReport, IngestStage, IngestionOrchestrator};
pub use loader::{DocumentLoader, SpooledDocument};
pub use retriever::Retriever;
