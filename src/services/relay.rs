//! Fan-out channel connecting the clients of one session.
//!
//! [`RelayHub`] is an in-process broadcast bus. The relay server exposes it over
//! WebSocket, and tests plug clients straight into it. A peer never receives the
//! frames it published itself.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use tracing::{debug, warn};

use crate::dto::message::GameMessage;

/// Identifier of a connection to the hub, unrelated to player ids.
pub type PeerId = u64;

/// A frame travelling through the hub, tagged with the peer that sent it.
#[derive(Debug, Clone)]
pub struct RelayFrame {
    /// Peer that published the frame.
    pub origin: PeerId,
    /// Frame body, forwarded unmodified.
    pub text: Arc<str>,
}

/// Outbound side of the relay as seen by a client.
///
/// Publishing is fire-and-forget: there is no acknowledgement and delivery may
/// silently fail.
pub trait RelayChannel: Send + Sync {
    /// Hand an encoded frame to the relay.
    fn publish_frame(&self, frame: String);

    /// Start receiving frames published by other participants. Dropping the
    /// subscription unsubscribes.
    fn subscribe(&self) -> Subscription;

    /// Encode and publish a message.
    fn publish(&self, message: &GameMessage) {
        match message.encode() {
            Ok(frame) => self.publish_frame(frame),
            Err(err) => warn!(
                kind = message.event.kind(),
                error = %err,
                "failed to encode game message; not published"
            ),
        }
    }
}

/// Broadcast hub shared by every peer of a session.
pub struct RelayHub {
    sender: broadcast::Sender<RelayFrame>,
    next_peer: AtomicU64,
}

impl RelayHub {
    /// Create a hub buffering up to `capacity` frames per subscriber.
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, _receiver) = broadcast::channel(capacity.max(1));
        Arc::new(Self {
            sender,
            next_peer: AtomicU64::new(1),
        })
    }

    /// Attach a new peer to the hub.
    pub fn connect(self: &Arc<Self>) -> RelayPeer {
        let id = self.next_peer.fetch_add(1, Ordering::Relaxed);
        RelayPeer {
            id,
            hub: Arc::clone(self),
        }
    }
}

/// Handle held by one participant of the hub.
#[derive(Clone)]
pub struct RelayPeer {
    id: PeerId,
    hub: Arc<RelayHub>,
}

impl RelayPeer {
    /// Hub-assigned id of this peer.
    pub fn id(&self) -> PeerId {
        self.id
    }
}

impl RelayChannel for RelayPeer {
    fn publish_frame(&self, frame: String) {
        let frame = RelayFrame {
            origin: self.id,
            text: frame.into(),
        };
        if self.hub.sender.send(frame).is_err() {
            debug!(peer = self.id, "no subscribers; frame dropped");
        }
    }

    fn subscribe(&self) -> Subscription {
        Subscription {
            peer: self.id,
            receiver: self.hub.sender.subscribe(),
        }
    }
}

/// Inbound stream of frames published by the other peers.
pub struct Subscription {
    peer: PeerId,
    receiver: broadcast::Receiver<RelayFrame>,
}

impl Subscription {
    /// Wait for the next foreign frame; `None` once the hub is gone.
    pub async fn recv(&mut self) -> Option<Arc<str>> {
        loop {
            match self.receiver.recv().await {
                Ok(frame) if frame.origin == self.peer => continue,
                Ok(frame) => return Some(frame.text),
                Err(RecvError::Lagged(skipped)) => {
                    // Best-effort delivery: skip what was lost and keep going.
                    warn!(peer = self.peer, skipped, "relay subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next foreign frame if one is already queued.
    pub fn try_recv(&mut self) -> Option<Arc<str>> {
        loop {
            match self.receiver.try_recv() {
                Ok(frame) if frame.origin == self.peer => continue,
                Ok(frame) => return Some(frame.text),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(peer = self.peer, skipped, "relay subscriber lagged");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_reach_every_other_peer() {
        let hub = RelayHub::new(16);
        let alice = hub.connect();
        let bob = hub.connect();
        let carol = hub.connect();
        let mut alice_sub = alice.subscribe();
        let mut bob_sub = bob.subscribe();
        let mut carol_sub = carol.subscribe();

        alice.publish_frame("hello".into());

        assert_eq!(bob_sub.try_recv().as_deref(), Some("hello"));
        assert_eq!(carol_sub.try_recv().as_deref(), Some("hello"));
        assert_eq!(alice_sub.try_recv(), None);
    }

    #[test]
    fn single_publisher_order_is_preserved() {
        let hub = RelayHub::new(16);
        let sender = hub.connect();
        let receiver = hub.connect();
        let mut sub = receiver.subscribe();

        for index in 0..5 {
            sender.publish_frame(index.to_string());
        }

        let received: Vec<String> = std::iter::from_fn(|| sub.try_recv())
            .map(|frame| frame.to_string())
            .collect();
        assert_eq!(received, vec!["0", "1", "2", "3", "4"]);
    }

    #[test]
    fn lagging_subscriber_skips_and_continues() {
        let hub = RelayHub::new(2);
        let sender = hub.connect();
        let receiver = hub.connect();
        let mut sub = receiver.subscribe();

        for index in 0..5 {
            sender.publish_frame(index.to_string());
        }

        assert_eq!(sub.try_recv().as_deref(), Some("3"));
        assert_eq!(sub.try_recv().as_deref(), Some("4"));
        assert_eq!(sub.try_recv(), None);
    }

    #[test]
    fn publishing_without_subscribers_is_silent() {
        let hub = RelayHub::new(4);
        hub.connect().publish_frame("lost".into());
    }

    #[tokio::test]
    async fn async_recv_skips_own_frames() {
        let hub = RelayHub::new(8);
        let alice = hub.connect();
        let bob = hub.connect();
        let mut alice_sub = alice.subscribe();

        alice.publish_frame("mine".into());
        bob.publish_frame("theirs".into());

        assert_eq!(alice_sub.recv().await.as_deref(), Some("theirs"));
    }
}
