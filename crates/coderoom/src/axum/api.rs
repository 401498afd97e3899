use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use super::SyncState;
use crate::completion::{self, Suggestion};
use crate::room::Room;
use crate::SyncError;

fn default_language() -> String {
    "python".to_string()
}

/// Request body for room creation; the body itself is optional
#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    #[serde(default = "default_language")]
    pub language: String,
}

/// Room shape served at the HTTP boundary
#[derive(Debug, Serialize, Deserialize)]
pub struct RoomResponse {
    #[serde(rename = "roomId")]
    pub room_id: String,
    pub code: String,
    pub language: String,
    pub created_at: DateTime<Utc>,
}

impl From<Room> for RoomResponse {
    fn from(room: Room) -> Self {
        Self {
            room_id: room.id,
            code: room.code,
            language: room.language,
            created_at: room.created_at,
        }
    }
}

/// Request body for completion suggestions
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutocompleteRequest {
    pub code: String,
    pub cursor_position: usize,
    #[serde(default = "default_language")]
    pub language: String,
}

/// Create the REST router for room management and completions
pub fn api_router() -> Router<SyncState> {
    Router::new()
        .route("/rooms", post(create_room))
        .route("/rooms/{room_id}", get(get_room).delete(delete_room))
        .route("/autocomplete", post(autocomplete))
        .route("/health", get(health))
}

async fn create_room(
    State(state): State<SyncState>,
    body: Option<Json<CreateRoomRequest>>,
) -> Result<(StatusCode, Json<RoomResponse>), StatusCode> {
    let language = body
        .map(|Json(request)| request.language)
        .unwrap_or_else(default_language);

    let room = state
        .registry()
        .store()
        .create(&language)
        .await
        .map_err(|e| {
            error!("Failed to create room: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok((StatusCode::CREATED, Json(room.into())))
}

async fn get_room(
    State(state): State<SyncState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomResponse>, StatusCode> {
    match state.registry().get(&room_id).await {
        Ok(room) => Ok(Json(room.snapshot().into())),
        Err(SyncError::RoomNotFound { .. }) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            error!("Failed to fetch room {}: {}", room_id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn delete_room(
    State(state): State<SyncState>,
    Path(room_id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    // Live channels go first so no client keeps editing a dead room
    let closed = state.connections().close_room(&room_id).await;
    state.registry().evict(&room_id);

    match state.registry().store().delete(&room_id).await {
        Ok(()) => {
            info!("Deleted room {} ({} connections closed)", room_id, closed);
            Ok(StatusCode::NO_CONTENT)
        }
        Err(SyncError::RoomNotFound { .. }) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            error!("Failed to delete room {}: {}", room_id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn autocomplete(
    Json(request): Json<AutocompleteRequest>,
) -> Result<Json<Suggestion>, StatusCode> {
    if request.cursor_position > request.code.len() {
        return Err(StatusCode::BAD_REQUEST);
    }

    Ok(Json(completion::suggest(
        &request.code,
        request.cursor_position,
        &request.language,
    )))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}
