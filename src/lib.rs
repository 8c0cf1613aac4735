//! Library crate for huddle-sync: the replicated game client and the relay server.
//!
//! Clients (`services::phase_controller::GameClient`) derive the shared game state
//! by replaying events fanned out by the relay (`services::relay`). The relay
//! binary exposes the same hub over WebSocket.

/// JSON configuration: game catalog and relay limits.
pub mod config;
/// Wire messages and request payloads.
pub mod dto;
/// Error types for intents, decoding and HTTP responses.
pub mod error;
/// HTTP and WebSocket routes of the relay server.
pub mod routes;
/// Relay hub, sync engine and game client.
pub mod services;
/// Shared game state, phase machine and relay server state.
pub mod state;
