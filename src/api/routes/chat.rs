use std::convert::Infallible;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;
use crate::domain::Message;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub role: String,
    pub content: String,
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        Self {
            role: message.role.as_str().to_string(),
            content: message.content,
        }
    }
}

/// Stream answer fragments for one question. Terminal conditions (no
/// document, nothing relevant, service failure) arrive as the single
/// fragment of the stream.
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, String)> {
    let question = request.message.trim().to_string();
    if question.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "message must not be empty".to_string(),
        ));
    }

    let stream = state
        .answer
        .answer(&question)
        .map(|fragment| Ok::<_, Infallible>(Event::default().data(fragment)));

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Snapshot of the conversation for rendering, system message included.
pub async fn get_conversation(State(state): State<AppState>) -> Json<Vec<MessageResponse>> {
    Json(
        state
            .session
            .messages()
            .into_iter()
            .map(MessageResponse::from)
            .collect(),
    )
}
