use std::time::Instant;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    services::relay::{RelayChannel, Subscription},
    state::{PeerSlot, SharedState},
};

/// Handle the full lifecycle of one relay WebSocket connection.
///
/// Text frames are published to the hub as-is; frames from other peers are
/// written back to the socket. Game events are never parsed here. Text frames
/// over the configured size are dropped and the connection stays open.
pub async fn handle_socket(state: SharedState, socket: WebSocket, slot: PeerSlot) {
    let peer = state.hub().connect();
    let peer_id = peer.id();
    let subscription = peer.subscribe();
    state.peers().insert(peer_id, Instant::now());
    info!(peer = peer_id, peers = state.peers().len(), "relay peer connected");

    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });
    let forward_task = spawn_forwarder(subscription, outbound_tx.clone());

    let max_frame_bytes = state.relay_settings().max_frame_bytes;
    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                let text = text.as_str();
                if text.len() > max_frame_bytes {
                    warn!(
                        peer = peer_id,
                        size = text.len(),
                        limit = max_frame_bytes,
                        "dropping oversized frame"
                    );
                    continue;
                }
                debug!(peer = peer_id, size = text.len(), "relaying frame");
                peer.publish_frame(text.to_owned());
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(peer = peer_id, "relay peer closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {
                debug!(peer = peer_id, "ignoring binary frame");
            }
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(peer = peer_id, error = %err, "websocket error");
                break;
            }
        }
    }

    forward_task.abort();
    let _ = forward_task.await;
    drop(slot);
    state.peers().remove(&peer_id);
    info!(peer = peer_id, peers = state.peers().len(), "relay peer disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Pump frames published by the other peers into this connection's writer.
fn spawn_forwarder(
    mut subscription: Subscription,
    outbound_tx: mpsc::UnboundedSender<Message>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = subscription.recv().await {
            if outbound_tx.send(Message::Text(frame.to_string().into())).is_err() {
                break;
            }
        }
    })
}

async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
