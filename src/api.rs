//! HTTP API endpoints.
//!
//! Read-only views used for debugging and for clients that poll instead of
//! holding a socket open.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::app::AppState;
use crate::error::QuizError;
use crate::types::RoomCode;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub msg: String,
}

impl IntoResponse for QuizError {
    fn into_response(self) -> Response {
        let status = match &self {
            QuizError::NotFound(_) => StatusCode::NOT_FOUND,
            QuizError::InvalidRoomCode(_) | QuizError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            code: self.code(),
            msg: self.user_message(),
        };
        (status, Json(body)).into_response()
    }
}

/// Point-in-time read of a room.
///
/// GET /api/rooms/{code}
pub async fn get_room(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<crate::types::Room>, QuizError> {
    let code = RoomCode::parse(&code)?;
    let room = state.service.get_room(&code).await?;
    Ok(Json(room))
}

/// Liveness probe.
///
/// GET /api/health
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
