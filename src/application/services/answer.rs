//! Answers a question against the active index: retrieve, assemble the
//! prompt, stream the completion. Every outcome, including failures, lands
//! in the conversation so the visible history matches what the caller saw.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

use crate::application::services::Retriever;
use crate::application::session::SessionContext;
use crate::domain::{ports::GenerationService, DomainError, MessageRole, SearchResult};

pub const NO_DOCUMENT_MESSAGE: &str =
    "Please process a document first to enable question answering.";
pub const NO_CONTEXT_MESSAGE: &str = "I couldn't find relevant info in the document.";
pub const EMPTY_RESPONSE_MESSAGE: &str = "No response received. Try a different model.";

pub struct AnswerPipeline {
    generation: Arc<dyn GenerationService>,
    session: Arc<SessionContext>,
}

/// Finite, non-restartable fragment stream. Dropping it stops the producer
/// task, which in turn releases the generation connection.
pub struct AnswerStream {
    rx: mpsc::Receiver<String>,
}

impl Stream for AnswerStream {
    type Item = String;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<String>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl AnswerPipeline {
    pub fn new(generation: Arc<dyn GenerationService>, session: Arc<SessionContext>) -> Self {
        Self {
            generation,
            session,
        }
    }

    /// Answer a question with a lazy stream of text fragments. The question
    /// is recorded immediately; the assistant turn is recorded when the
    /// stream finishes (or fails).
    #[instrument(skip(self, question))]
    pub fn answer(&self, question: &str) -> AnswerStream {
        let (tx, rx) = mpsc::channel(16);
        let question = question.to_string();

        self.session.record_message(MessageRole::User, &question);

        let generation = self.generation.clone();
        let session = self.session.clone();
        tokio::spawn(async move {
            run(generation, session, question, tx).await;
        });

        AnswerStream { rx }
    }
}

async fn run(
    generation: Arc<dyn GenerationService>,
    session: Arc<SessionContext>,
    question: String,
    tx: mpsc::Sender<String>,
) {
    let retriever = match active_retriever(&session) {
        Ok(retriever) => retriever,
        Err(DomainError::NoDocument) => {
            deliver_terminal(&session, &tx, NO_DOCUMENT_MESSAGE.to_string()).await;
            return;
        }
        Err(e) => {
            deliver_terminal(&session, &tx, format!("Error: {e}")).await;
            return;
        }
    };

    let results = match retriever.retrieve(&question).await {
        Ok(results) => results,
        Err(e) => {
            warn!(error = %e, "retrieval failed");
            deliver_terminal(&session, &tx, format!("Error: {e}")).await;
            return;
        }
    };

    // Any empty retrieval means the document holds nothing relevant; the
    // model is not consulted.
    if results.is_empty() {
        deliver_terminal(&session, &tx, NO_CONTEXT_MESSAGE.to_string()).await;
        return;
    }

    let prompt = build_prompt(&results, &question);
    let mut stream = match generation
        .stream_completion(session.system_prompt(), &prompt)
        .await
    {
        Ok(stream) => stream,
        Err(e) => {
            warn!(error = %e, "generation request failed");
            deliver_terminal(&session, &tx, format!("Error: {e}")).await;
            return;
        }
    };

    let mut full_response = String::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(fragment) => {
                if fragment.trim().is_empty() {
                    continue;
                }
                full_response.push_str(&fragment);
                if tx.send(fragment).await.is_err() {
                    // Consumer abandoned the stream; dropping `stream` here
                    // closes the connection.
                    return;
                }
            }
            Err(e) => {
                warn!(error = %e, "generation stream failed");
                deliver_terminal(&session, &tx, format!("Error: {e}")).await;
                return;
            }
        }
    }

    if full_response.trim().is_empty() {
        deliver_terminal(&session, &tx, EMPTY_RESPONSE_MESSAGE.to_string()).await;
    } else {
        info!(chars = full_response.len(), "answer completed");
        session.record_message(MessageRole::Assistant, full_response);
    }
}

fn active_retriever(session: &SessionContext) -> Result<Arc<Retriever>, DomainError> {
    session.retriever()?.ok_or(DomainError::NoDocument)
}

/// Record a single terminal fragment as the whole assistant turn.
async fn deliver_terminal(session: &SessionContext, tx: &mpsc::Sender<String>, message: String) {
    session.record_message(MessageRole::Assistant, &message);
    let _ = tx.send(message).await;
}

/// The prompt carries the retrieved context and the latest question only;
/// stored history is displayed but not replayed into the model. Keeping the
/// policy in one place makes it trivial to change.
fn build_prompt(results: &[SearchResult], question: &str) -> String {
    let context = results
        .iter()
        .map(|r| r.chunk.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("Based on this document content:\n\n{context}\n\nQuestion: {question}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{CompletionStream, EmbeddingService};
    use crate::domain::{DocumentChunk, Embedding, VectorIndex};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct FixedEmbedding(Vec<f32>);

    #[async_trait]
    impl EmbeddingService for FixedEmbedding {
        async fn embed(&self, _text: &str) -> Result<Embedding, DomainError> {
            Ok(Embedding::new(self.0.clone()))
        }

        async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError> {
            Ok(texts.iter().map(|_| Embedding::new(self.0.clone())).collect())
        }

        fn dimension(&self) -> usize {
            self.0.len()
        }
    }

    enum StubBehavior {
        Fragments(Vec<&'static str>),
        RequestError,
        MidStreamError,
    }

    struct StubGeneration {
        behavior: StubBehavior,
        calls: AtomicUsize,
    }

    impl StubGeneration {
        fn new(behavior: StubBehavior) -> Self {
            Self {
                behavior,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl GenerationService for StubGeneration {
        async fn stream_completion(
            &self,
            _system: &str,
            _prompt: &str,
        ) -> Result<CompletionStream, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                StubBehavior::RequestError => {
                    Err(DomainError::generation("model not available"))
                }
                StubBehavior::Fragments(fragments) => {
                    let items: Vec<Result<String, DomainError>> =
                        fragments.iter().map(|f| Ok(f.to_string())).collect();
                    Ok(Box::pin(futures::stream::iter(items)))
                }
                StubBehavior::MidStreamError => {
                    let items: Vec<Result<String, DomainError>> = vec![
                        Ok("partial".to_string()),
                        Err(DomainError::generation("stream cut")),
                    ];
                    Ok(Box::pin(futures::stream::iter(items)))
                }
            }
        }
    }

    fn session_with_index(chunks: Vec<&str>) -> Arc<SessionContext> {
        let session = Arc::new(SessionContext::new("You are a document assistant."));
        let doc_id = Uuid::new_v4();
        let contents: Vec<DocumentChunk> = chunks
            .iter()
            .enumerate()
            .map(|(i, c)| DocumentChunk::new(doc_id, *c, i))
            .collect();
        let vectors = contents
            .iter()
            .map(|_| Embedding::new(vec![1.0, 0.0]))
            .collect();
        let index = VectorIndex::build(contents, vectors).unwrap();
        let retriever = Arc::new(Retriever::new(
            Arc::new(FixedEmbedding(vec![1.0, 0.0])),
            Arc::new(index),
            4,
        ));
        session.publish(1, retriever).unwrap();
        session
    }

    async fn collect(stream: AnswerStream) -> Vec<String> {
        stream.collect().await
    }

    #[tokio::test]
    async fn test_no_document_short_circuits_without_service_calls() {
        let session = Arc::new(SessionContext::new("sys"));
        let generation = Arc::new(StubGeneration::new(StubBehavior::Fragments(vec!["x"])));
        let pipeline = AnswerPipeline::new(generation.clone(), session.clone());

        let fragments = collect(pipeline.answer("what is this about?")).await;

        assert_eq!(fragments, vec![NO_DOCUMENT_MESSAGE.to_string()]);
        assert_eq!(generation.calls.load(Ordering::SeqCst), 0);

        let messages = session.messages();
        assert_eq!(messages.last().unwrap().content, NO_DOCUMENT_MESSAGE);
    }

    #[tokio::test]
    async fn test_empty_retrieval_short_circuits_generation() {
        // An index over zero chunks retrieves nothing, which must answer
        // with the fixed no-relevant-info message and no model call.
        let session = Arc::new(SessionContext::new("sys"));
        let retriever = Arc::new(Retriever::new(
            Arc::new(FixedEmbedding(vec![1.0, 0.0])),
            Arc::new(VectorIndex::build(vec![], vec![]).unwrap()),
            4,
        ));
        session.publish(1, retriever).unwrap();

        let generation = Arc::new(StubGeneration::new(StubBehavior::Fragments(vec!["x"])));
        let pipeline = AnswerPipeline::new(generation.clone(), session.clone());

        let fragments = collect(pipeline.answer("anything relevant?")).await;

        assert_eq!(fragments, vec![NO_CONTEXT_MESSAGE.to_string()]);
        assert_eq!(generation.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_streams_fragments_and_records_full_answer() {
        let session = session_with_index(vec!["the sky is blue"]);
        let generation = Arc::new(StubGeneration::new(StubBehavior::Fragments(vec![
            "The sky ", "is blue.",
        ])));
        let pipeline = AnswerPipeline::new(generation, session.clone());

        let fragments = collect(pipeline.answer("what color is the sky?")).await;

        assert_eq!(fragments, vec!["The sky ".to_string(), "is blue.".to_string()]);
        let last = session.messages().last().unwrap().clone();
        assert_eq!(last.role, MessageRole::Assistant);
        assert_eq!(last.content, "The sky is blue.");
    }

    #[tokio::test]
    async fn test_whitespace_only_stream_yields_no_response_message() {
        let session = session_with_index(vec!["content"]);
        let generation = Arc::new(StubGeneration::new(StubBehavior::Fragments(vec![
            "  ", "\n",
        ])));
        let pipeline = AnswerPipeline::new(generation, session.clone());

        let fragments = collect(pipeline.answer("question")).await;

        assert_eq!(fragments, vec![EMPTY_RESPONSE_MESSAGE.to_string()]);
        assert_eq!(
            session.messages().last().unwrap().content,
            EMPTY_RESPONSE_MESSAGE
        );
    }

    #[tokio::test]
    async fn test_request_failure_becomes_terminal_error_fragment() {
        let session = session_with_index(vec!["content"]);
        let generation = Arc::new(StubGeneration::new(StubBehavior::RequestError));
        let pipeline = AnswerPipeline::new(generation, session.clone());

        let fragments = collect(pipeline.answer("question")).await;

        assert_eq!(fragments.len(), 1);
        assert!(fragments[0].starts_with("Error: "));
        assert_eq!(session.messages().last().unwrap().content, fragments[0]);
    }

    #[tokio::test]
    async fn test_mid_stream_failure_is_reported_after_partial_output() {
        let session = session_with_index(vec!["content"]);
        let generation = Arc::new(StubGeneration::new(StubBehavior::MidStreamError));
        let pipeline = AnswerPipeline::new(generation, session.clone());

        let fragments = collect(pipeline.answer("question")).await;

        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0], "partial");
        assert!(fragments[1].starts_with("Error: "));
    }

    #[tokio::test]
    async fn test_user_message_recorded_before_answering() {
        let session = session_with_index(vec!["content"]);
        let generation = Arc::new(StubGeneration::new(StubBehavior::Fragments(vec!["ok"])));
        let pipeline = AnswerPipeline::new(generation, session.clone());

        let _ = collect(pipeline.answer("my question")).await;

        let roles: Vec<MessageRole> = session.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                MessageRole::System,
                MessageRole::User,
                MessageRole::Assistant
            ]
        );
        assert_eq!(session.messages()[1].content, "my question");
    }

    #[test]
    fn test_prompt_embeds_context_in_retrieval_order() {
        let doc_id = Uuid::new_v4();
        let results = vec![
            SearchResult {
                chunk: DocumentChunk::new(doc_id, "first chunk", 0),
                score: 0.9,
            },
            SearchResult {
                chunk: DocumentChunk::new(doc_id, "second chunk", 1),
                score: 0.5,
            },
        ];

        let prompt = build_prompt(&results, "the question");
        assert_eq!(
            prompt,
            "Based on this document content:\n\nfirst chunk\n\nsecond chunk\n\nQuestion: the question"
        );
    }
}
