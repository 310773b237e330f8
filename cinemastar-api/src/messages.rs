use axum::{
    extract::{Json, Path, State},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tracing::info;
use cinemastar_booking::Reply;
use cinemastar_catalog::SeatMap;
use crate::error::AppError;
use crate::state::AppState;

/// The single inbound event: who is talking and what they said
#[derive(Debug, Deserialize)]
pub struct InboundMessage {
    pub conversation_id: String,
    pub text: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/messages", post(handle_message))
        .route("/v1/sessions/{id}/seats", get(seat_map))
}

async fn handle_message(
    State(state): State<AppState>,
    Json(msg): Json<InboundMessage>,
) -> Result<Json<Reply>, AppError> {
    let conversation_id = msg.conversation_id.trim();
    if conversation_id.is_empty() {
        return Err(AppError::ValidationError("conversation_id must not be empty".to_string()));
    }

    let reply = state.dialogue.handle_text(conversation_id, &msg.text).await?;
    info!("Conversation {} now at {:?}", conversation_id, reply.stage);
    Ok(Json(reply))
}

async fn seat_map(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> Result<Json<SeatMap>, AppError> {
    let session = state
        .catalog
        .get_session(session_id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("Session {} not found", session_id)))?;
    let seats = state.catalog.list_seats(session_id).await?;

    Ok(Json(SeatMap::from_seats(&session, &seats)))
}
