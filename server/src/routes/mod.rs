//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! One Axum router serves the room relay websocket, the per-room snapshot
//! blob, and a health probe. The snapshot routes carry their own body limit
//! so large PNG uploads are accepted without raising it everywhere.

pub mod snapshots;
pub mod ws;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the relay router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    let snapshot_limit = DefaultBodyLimit::max(state.config.snapshot_max_bytes);

    Router::new()
        .route("/api/ws", get(ws::handle_ws))
        .route(
            "/api/rooms/{room}/snapshot",
            get(snapshots::get_snapshot).put(snapshots::put_snapshot).layer(snapshot_limit),
        )
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
