use tracing::debug;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report liveness together with the number of connected peers.
pub fn health_status(state: &SharedState) -> HealthResponse {
    let peers = state.peers().len();
    debug!(peers, "health check");
    HealthResponse::ok(peers)
}
