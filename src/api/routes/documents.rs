use std::convert::Infallible;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;

use crate::api::state::AppState;
use crate::application::IngestEvent;
use crate::domain::Document;

/// Accept a multipart upload and stream ingestion progress back as SSE
/// events, terminating in `ready` or `failed`. The previously active index
/// keeps serving questions until the new one is published.
pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, String)> {
    let document = read_upload(&mut multipart).await?;

    let (tx, rx) = mpsc::channel::<IngestEvent>(16);
    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        // Failures are reported through the event channel.
        let _ = orchestrator.process(document, tx).await;
    });

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|event| (event, rx))
    })
    .map(|event| {
        let event = Event::default()
            .json_data(&event)
            .unwrap_or_else(|_| Event::default().data("{}"));
        Ok::<_, Infallible>(event)
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

async fn read_upload(multipart: &mut Multipart) -> Result<Document, (StatusCode, String)> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("invalid multipart payload: {e}"),
        )
    })? {
        if field.name() != Some("file") && field.file_name().is_none() {
            continue;
        }

        let name = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| "document.txt".to_string());
        let bytes = field.bytes().await.map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                format!("failed to read upload: {e}"),
            )
        })?;

        if bytes.is_empty() {
            return Err((StatusCode::BAD_REQUEST, "uploaded file is empty".into()));
        }
        return Ok(Document::from_upload(name, bytes.to_vec()));
    }

    Err((
        StatusCode::BAD_REQUEST,
        "expected a multipart field named \"file\"".into(),
    ))
}

/// "New document": drop the active index and reset the conversation to the
/// system message.
pub async fn reset_session(State(state): State<AppState>) -> Result<StatusCode, StatusCode> {
    state.session.reset().map_err(|e| {
        tracing::error!(error = %e, "Failed to reset session");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(StatusCode::NO_CONTENT)
}
