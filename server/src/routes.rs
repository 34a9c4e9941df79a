use axum::{extract::State, routing::get, Json, Router};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// GET /health — liveness plus the number of open connections.
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "connections": state.connections.len(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Build the axum Router with all routes and middleware.
///
/// The relay answers upgrades on `/ws` and on the bare address, so clients
/// that dial `ws://host:port` directly are served too.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ws_handler::ws_upgrade))
        .route("/ws", get(ws_handler::ws_upgrade))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
