use crate::interface_adapters::http::ErrorResponse;
use crate::interface_adapters::state::AppState;
use crate::use_cases::LobbyError;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;

#[derive(Debug, serde::Deserialize)]
pub struct LobbyInitRequest {
    // Lobby id chosen by the caller.
    #[serde(default)]
    lobby_id: String,
}

#[derive(Debug, serde::Serialize)]
struct LobbyInitResponse {
    // The lobby id that was created.
    lobby_id: String,
}

pub async fn create_lobby_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LobbyInitRequest>,
) -> impl IntoResponse {
    let lobby_id = payload.lobby_id.trim().to_string();
    if lobby_id.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "lobby_id is required".to_string(),
            }),
        )
            .into_response();
    }

    // Created lobbies are not pinned and will be removed on last disconnect.
    match state
        .lobby_registry
        .create_lobby(lobby_id.clone(), false)
        .await
    {
        Ok(_lobby) => (StatusCode::CREATED, Json(LobbyInitResponse { lobby_id })).into_response(),
        Err(LobbyError::AlreadyExists) => (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "lobby already exists".to_string(),
            }),
        )
            .into_response(),
    }
}
