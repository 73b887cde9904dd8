//! Document question answering over a retrieval-augmented generation
//! pipeline: upload a document, ingest it into an in-memory vector index,
//! then stream answers grounded in the retrieved chunks.

pub mod api;
pub mod application;
pub mod domain;
pub mod infrastructure;
