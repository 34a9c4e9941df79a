use axum::{
    extract::{rejection::QueryRejection, ws::WebSocketUpgrade, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::auth::{AuthError, Identity};
use crate::state::AppState;
use crate::ws::actor;

/// Query parameters for WebSocket connection.
/// Auth is via query param ?token=JWT, with a bearer header as fallback.
#[derive(Debug, Default, Deserialize)]
pub struct WsAuthQuery {
    pub token: Option<String>,
}

/// GET /ws?token=JWT
///
/// Upgrade gate. The credential is checked before the upgrade completes: on
/// failure the client gets a plain `401 Unauthorized` and the socket is
/// closed, so no duplex channel ever exists for an unauthenticated peer.
/// A query string that doesn't parse is a bad credential, not a bad request.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    query: Result<Query<WsAuthQuery>, QueryRejection>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let verdict = presented_credential(query, &headers)
        .and_then(|credential| state.verifier.verify(credential.as_deref()));

    match verdict {
        Ok(identity) => {
            tracing::debug!(username = %identity.username, "WebSocket credential accepted");
            ws.on_upgrade(move |socket| handle_authenticated(socket, state, identity))
        }
        Err(err) => {
            tracing::warn!(reason = err.kind(), "WebSocket auth failed");
            unauthorized(err)
        }
    }
}

/// Handle an authenticated WebSocket connection by running its actor.
async fn handle_authenticated(
    socket: axum::extract::ws::WebSocket,
    state: AppState,
    identity: Identity,
) {
    actor::run_connection(socket, state, identity).await;
}

/// The credential the client presented: `?token=` first, then the bearer
/// header.
fn presented_credential(
    query: Result<Query<WsAuthQuery>, QueryRejection>,
    headers: &HeaderMap,
) -> Result<Option<String>, AuthError> {
    match query {
        Ok(Query(params)) => Ok(params.token.or_else(|| bearer_token(headers))),
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Unparseable WebSocket query");
            Err(AuthError::Invalid)
        }
    }
}

/// Extract `<token>` from `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
}

fn unauthorized(err: AuthError) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::CONNECTION, "close")],
        err.to_string(),
    )
        .into_response()
}
