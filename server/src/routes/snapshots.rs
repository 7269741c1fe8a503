//! Snapshot HTTP endpoints.
//!
//! `PUT /api/rooms/{room}/snapshot` stores a PNG body, `GET` returns it.
//! Errors map to a status plus `{ "code": "E_*", "message": ... }`.

#[cfg(test)]
#[path = "snapshots_test.rs"]
mod snapshots_test;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::warn;

use crate::frame::ErrorCode;
use crate::services::snapshot::{self, SnapshotError};
use crate::state::AppState;

pub async fn put_snapshot(State(state): State<AppState>, Path(room): Path<String>, body: Bytes) -> Response {
    match snapshot::save(&state, &room, body.to_vec()).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => snapshot_error_response(&e),
    }
}

pub async fn get_snapshot(State(state): State<AppState>, Path(room): Path<String>) -> Response {
    match snapshot::load(&state, &room).await {
        Ok(Some(png)) => ([(header::CONTENT_TYPE, "image/png")], png).into_response(),
        Ok(None) => error_body(StatusCode::NOT_FOUND, "E_SNAPSHOT_NOT_FOUND", &format!("no snapshot for room `{room}`")),
        Err(e) => snapshot_error_response(&e),
    }
}

fn snapshot_error_to_status(err: &SnapshotError) -> StatusCode {
    match err {
        SnapshotError::InvalidRoom(_) | SnapshotError::Empty => StatusCode::BAD_REQUEST,
        SnapshotError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        SnapshotError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn snapshot_error_response(err: &SnapshotError) -> Response {
    let status = snapshot_error_to_status(err);
    if status.is_server_error() {
        warn!(error = %err, "snapshot: request failed");
    }
    error_body(status, err.error_code(), &err.to_string())
}

fn error_body(status: StatusCode, code: &str, message: &str) -> Response {
    (status, Json(json!({ "code": code, "message": message }))).into_response()
}
