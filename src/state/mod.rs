//! Shared state of the relay server.

/// Replicated game aggregate and its derived views.
pub mod game;
/// Phase graph gating local intents.
pub mod state_machine;
/// Typed phase change commands.
pub mod transitions;

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Instant,
};

use dashmap::DashMap;

use crate::{
    config::{AppConfig, RelaySettings},
    services::relay::{PeerId, RelayHub},
};

/// Handle to the relay state shared by every request handler.
pub type SharedState = Arc<AppState>;

/// State of the relay server: the broadcast hub and the live connections.
pub struct AppState {
    config: AppConfig,
    hub: Arc<RelayHub>,
    peers: DashMap<PeerId, Instant>,
    reserved: AtomicUsize,
}

/// A connection slot counted against the peer limit until dropped.
pub struct PeerSlot {
    state: SharedState,
}

impl Drop for PeerSlot {
    fn drop(&mut self) {
        self.state.reserved.fetch_sub(1, Ordering::AcqRel);
    }
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(config: AppConfig) -> SharedState {
        let hub = RelayHub::new(config.relay().channel_capacity);
        Arc::new(Self {
            config,
            hub,
            peers: DashMap::new(),
            reserved: AtomicUsize::new(0),
        })
    }

    /// Relay limits from the loaded configuration.
    pub fn relay_settings(&self) -> RelaySettings {
        self.config.relay()
    }

    /// Broadcast hub shared by every WebSocket connection.
    pub fn hub(&self) -> &Arc<RelayHub> {
        &self.hub
    }

    /// Registry of connected peers with their connection time.
    pub fn peers(&self) -> &DashMap<PeerId, Instant> {
        &self.peers
    }

    /// Claim a connection slot, or `None` when the peer limit is reached.
    ///
    /// The check and the increment are a single atomic step, so concurrent
    /// upgrades cannot overshoot the limit.
    pub fn try_reserve_peer(self: &Arc<Self>) -> Option<PeerSlot> {
        let limit = self.config.relay().max_peers;
        self.reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |taken| {
                (taken < limit).then_some(taken + 1)
            })
            .ok()
            .map(|_| PeerSlot {
                state: Arc::clone(self),
            })
    }

    /// Whether another connection would exceed the configured limit.
    pub fn is_full(&self) -> bool {
        self.reserved.load(Ordering::Acquire) >= self.config.relay().max_peers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_limit(max_peers: usize) -> SharedState {
        let config =
            AppConfig::from_json(&format!(r#"{{"relay": {{"maxPeers": {max_peers}}}}}"#)).unwrap();
        AppState::new(config)
    }

    #[test]
    fn slots_are_capped_and_released_on_drop() {
        let state = state_with_limit(2);
        let first = state.try_reserve_peer().unwrap();
        let second = state.try_reserve_peer().unwrap();
        assert!(state.is_full());
        assert!(state.try_reserve_peer().is_none());

        drop(first);
        assert!(!state.is_full());
        let third = state.try_reserve_peer();
        assert!(third.is_some());
        drop(second);
    }

    #[test]
    fn concurrent_reservations_never_exceed_limit() {
        let state = state_with_limit(3);
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let state = Arc::clone(&state);
                // Slots are leaked so that every grant stays counted.
                std::thread::spawn(move || state.try_reserve_peer().map(std::mem::forget).is_some())
            })
            .collect();

        let granted = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|granted| *granted)
            .count();
        assert_eq!(granted, 3);
    }
}
