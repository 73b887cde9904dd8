use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use doc_rag::api::{create_router, AppState};
use doc_rag::application::{
    AnswerPipeline, DocumentLoader, IngestionOrchestrator, SessionContext,
};
use doc_rag::infrastructure::{Config, DoclingExtractor, GeminiEmbedding, GeminiGeneration};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "doc_rag=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    info!(
        chunk_size = config.chunking.max_size,
        top_k = config.retrieval.top_k,
        generation_model = config.generation.model.as_str(),
        "configuration loaded"
    );

    let extraction = Arc::new(DoclingExtractor::new(&config.extraction)?);
    let embedding = Arc::new(GeminiEmbedding::new(&config.embedding)?);
    let generation = Arc::new(GeminiGeneration::new(&config.generation)?);

    let session = Arc::new(SessionContext::new(&config.system_prompt));
    let orchestrator = Arc::new(IngestionOrchestrator::new(
        DocumentLoader::new(extraction),
        embedding,
        session.clone(),
        config.chunking.max_size,
        config.chunking.overlap,
        config.retrieval.top_k,
    ));
    let answer = Arc::new(AnswerPipeline::new(generation, session.clone()));

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    let state = AppState::new(session, orchestrator, answer, config);
    let app = create_router(state);

    info!("API server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
