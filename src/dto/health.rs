use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status, always "ok" while the relay accepts requests.
    pub status: String,
    /// Number of WebSocket peers currently connected.
    pub peers: usize,
}

impl HealthResponse {
    /// Create a health response reporting `peers` live connections.
    pub fn ok(peers: usize) -> Self {
        Self {
            status: "ok".to_string(),
            peers,
        }
    }
}
