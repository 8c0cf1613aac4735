use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use tracing::warn;

use crate::{error::AppError, services::websocket_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/ws",
    tag = "relay",
    responses(
        (status = 101, description = "Switching protocols to WebSocket"),
        (status = 503, description = "Peer limit reached")
    )
)]
/// Upgrade the HTTP connection into a relay session.
///
/// Every text frame sent on the socket is forwarded unmodified to all other peers.
pub async fn ws_handler(
    State(state): State<SharedState>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    let Some(slot) = state.try_reserve_peer() else {
        let limit = state.relay_settings().max_peers;
        warn!(limit, "rejecting relay connection; peer limit reached");
        return Err(AppError::ServiceUnavailable(format!(
            "relay is full ({limit} peers)"
        )));
    };

    Ok(ws.on_upgrade(move |socket| websocket_service::handle_socket(state, socket, slot)))
}

/// Configure the WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/ws", get(ws_handler))
}
