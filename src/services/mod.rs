/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Intent handling for one game client.
pub mod phase_controller;
/// In-process fan-out hub and the client-side relay trait.
pub mod relay;
/// Reducer applying game events to the local state.
pub mod sync_engine;
/// WebSocket connection handling for the relay server.
pub mod websocket_service;
