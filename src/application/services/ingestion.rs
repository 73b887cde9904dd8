//! Staged document ingestion: spool, load, split, embed, index, publish.
//! Each attempt runs against private state and only touches the session at
//! the final publish, so a failure at any stage leaves the previously active
//! index usable.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

use crate::application::services::{DocumentLoader, Retriever};
use crate::application::session::SessionContext;
use crate::domain::chunking::split_blocks;
use crate::domain::{ports::EmbeddingService, Document, DomainError, Result, VectorIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStage {
    Saving,
    Loading,
    Splitting,
    Embedding,
    Indexing,
    Ready,
}

impl IngestStage {
    pub const TOTAL: usize = 6;

    pub fn step(&self) -> usize {
        match self {
            Self::Saving => 1,
            Self::Loading => 2,
            Self::Splitting => 3,
            Self::Embedding => 4,
            Self::Indexing => 5,
            Self::Ready => 6,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IngestEvent {
    Stage {
        stage: IngestStage,
        step: usize,
        total: usize,
    },
    Ready {
        document: String,
        chunks: usize,
    },
    Failed {
        stage: IngestStage,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct IngestReport {
    pub document: String,
    pub chunks: usize,
    pub dimension: usize,
}

pub struct IngestionOrchestrator {
    loader: DocumentLoader,
    embedding: Arc<dyn EmbeddingService>,
    session: Arc<SessionContext>,
    max_chunk_size: usize,
    chunk_overlap: usize,
    top_k: usize,
}

impl IngestionOrchestrator {
    pub fn new(
        loader: DocumentLoader,
        embedding: Arc<dyn EmbeddingService>,
        session: Arc<SessionContext>,
        max_chunk_size: usize,
        chunk_overlap: usize,
        top_k: usize,
    ) -> Self {
        Self {
            loader,
            embedding,
            session,
            max_chunk_size,
            chunk_overlap,
            top_k,
        }
    }

    /// Run one ingestion attempt, reporting stage transitions through
    /// `progress`. Progress delivery is best-effort: a dropped receiver does
    /// not interrupt the attempt.
    #[instrument(skip(self, document, progress), fields(document = %document.name))]
    pub async fn process(
        &self,
        document: Document,
        progress: mpsc::Sender<IngestEvent>,
    ) -> Result<IngestReport> {
        let ticket = self.session.issue_ticket();

        match self.run(&document, ticket, &progress).await {
            Ok(report) => {
                emit(
                    &progress,
                    IngestEvent::Ready {
                        document: report.document.clone(),
                        chunks: report.chunks,
                    },
                )
                .await;
                info!(chunks = report.chunks, "document ingestion completed");
                Ok(report)
            }
            Err((stage, e)) => {
                warn!(stage = stage.step(), error = %e, "document ingestion failed");
                emit(
                    &progress,
                    IngestEvent::Failed {
                        stage,
                        reason: e.to_string(),
                    },
                )
                .await;
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        document: &Document,
        ticket: u64,
        progress: &mpsc::Sender<IngestEvent>,
    ) -> std::result::Result<IngestReport, (IngestStage, DomainError)> {
        emit_stage(progress, IngestStage::Saving).await;
        let spooled = self
            .loader
            .spool(document)
            .map_err(|e| (IngestStage::Saving, e))?;

        emit_stage(progress, IngestStage::Loading).await;
        let blocks = self
            .loader
            .extract(&spooled)
            .await
            .map_err(|e| (IngestStage::Loading, e))?;

        emit_stage(progress, IngestStage::Splitting).await;
        let chunks = split_blocks(
            document.id,
            &blocks,
            self.max_chunk_size,
            self.chunk_overlap,
        )
        .map_err(|e| (IngestStage::Splitting, e))?;
        if chunks.is_empty() {
            return Err((
                IngestStage::Splitting,
                DomainError::extraction("document produced no chunks"),
            ));
        }
        info!(chunks = chunks.len(), "document split into chunks");

        emit_stage(progress, IngestStage::Embedding).await;
        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let vectors = self
            .embedding
            .embed_batch(&texts)
            .await
            .map_err(|e| (IngestStage::Embedding, e))?;

        emit_stage(progress, IngestStage::Indexing).await;
        let index = VectorIndex::build(chunks, vectors).map_err(|e| (IngestStage::Indexing, e))?;
        let report = IngestReport {
            document: document.name.clone(),
            chunks: index.len(),
            dimension: index.dimension(),
        };

        let retriever = Arc::new(Retriever::new(
            self.embedding.clone(),
            Arc::new(index),
            self.top_k,
        ));
        let published = self
            .session
            .publish(ticket, retriever)
            .map_err(|e| (IngestStage::Indexing, e))?;
        if !published {
            // A newer attempt reached Ready first; this result is stale.
            return Err((
                IngestStage::Indexing,
                DomainError::internal("ingestion superseded by a newer document"),
            ));
        }

        Ok(report)
    }
}

async fn emit(progress: &mpsc::Sender<IngestEvent>, event: IngestEvent) {
    let _ = progress.send(event).await;
}

async fn emit_stage(progress: &mpsc::Sender<IngestEvent>, stage: IngestStage) {
    emit(
        progress,
        IngestEvent::Stage {
            stage,
            step: stage.step(),
            total: IngestStage::TOTAL,
        },
    )
    .await;
}
