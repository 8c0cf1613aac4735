use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the huddle-sync relay.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::websocket::ws_handler,
    ),
    components(schemas(crate::dto::health::HealthResponse)),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "relay", description = "WebSocket fan-out shared by the game clients"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_relay_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/ws"));
        assert!(doc.paths.paths.contains_key("/healthcheck"));
    }
}
