//! Peer-result channel: sharing probe results between instances (tabs,
//! windows, processes) of the same origin without a server round-trip.
//!
//! The channel only moves messages. Whether a received result is fresh
//! enough to adopt is decided by the scheduler.

use crate::error::ChannelError;
use crate::health::HealthCheckResult;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

pub const HEALTH_CHANNEL_NAME: &str = "health-check-service";

/// Wire shape: `{ "type": "health-result", "result": { ... } }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PeerMessage {
    HealthResult { result: HealthCheckResult },
}

/// A message plus the id of the instance that sent it, so senders can skip their own echoes
#[derive(Debug, Clone, PartialEq)]
pub struct PeerEnvelope {
    pub origin: Uuid,
    pub message: PeerMessage,
}

pub trait PeerResultChannel: Send + Sync {
    fn name(&self) -> &str;

    fn publish(&self, origin: Uuid, message: PeerMessage) -> Result<(), ChannelError>;

    /// `None` when the channel cannot deliver anything (no-op or closed)
    fn subscribe(&self) -> Option<broadcast::Receiver<PeerEnvelope>>;

    fn close(&self);
}

pub type SharedPeerChannel = Arc<dyn PeerResultChannel>;

/// In-process bus; every clone is one participant on the same channel
#[derive(Clone)]
pub struct LocalPeerBus {
    name: String,
    sender: broadcast::Sender<PeerEnvelope>,
    closed: Arc<AtomicBool>,
}

impl LocalPeerBus {
    pub fn new(name: impl Into<String>) -> Self {
        let (sender, _) = broadcast::channel(32);
        Self {
            name: name.into(),
            sender,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Another participant on the same bus. Closing one participant does not
    /// close the others.
    pub fn participant(&self) -> Self {
        Self {
            name: self.name.clone(),
            sender: self.sender.clone(),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Default for LocalPeerBus {
    fn default() -> Self {
        Self::new(HEALTH_CHANNEL_NAME)
    }
}

impl PeerResultChannel for LocalPeerBus {
    fn name(&self) -> &str {
        &self.name
    }

    fn publish(&self, origin: Uuid, message: PeerMessage) -> Result<(), ChannelError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ChannelError::Closed(self.name.clone()));
        }
        self.sender
            .send(PeerEnvelope { origin, message })
            .map(|receivers| debug!("[{}] delivered to {} receivers", self.name, receivers))
            .map_err(|_| ChannelError::NoPeers(self.name.clone()))
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<PeerEnvelope>> {
        if self.closed.load(Ordering::Acquire) {
            None
        } else {
            Some(self.sender.subscribe())
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// For targets with no peers at all
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPeerChannel;

impl PeerResultChannel for NoopPeerChannel {
    fn name(&self) -> &str {
        HEALTH_CHANNEL_NAME
    }

    fn publish(&self, _origin: Uuid, _message: PeerMessage) -> Result<(), ChannelError> {
        Ok(())
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<PeerEnvelope>> {
        None
    }

    fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_wire_shape() {
        let msg = PeerMessage::HealthResult {
            result: HealthCheckResult::healthy(120, 1_000),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "health-result");
        assert_eq!(json["result"]["isHealthy"], true);

        let back: PeerMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }

    #[tokio::test]
    async fn test_participants_share_messages() {
        let tab_a = LocalPeerBus::default();
        let tab_b = tab_a.participant();
        let mut rx = tab_b.subscribe().unwrap();

        let origin = Uuid::new_v4();
        let msg = PeerMessage::HealthResult {
            result: HealthCheckResult::healthy(80, 5),
        };
        tab_a.publish(origin, msg.clone()).unwrap();

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.origin, origin);
        assert_eq!(envelope.message, msg);
    }

    #[test]
    fn test_closed_participant_rejects_publish() {
        let tab_a = LocalPeerBus::default();
        let tab_b = tab_a.participant();
        let _rx = tab_b.subscribe();

        tab_a.close();
        let msg = PeerMessage::HealthResult {
            result: HealthCheckResult::healthy(80, 5),
        };
        assert!(matches!(tab_a.publish(Uuid::new_v4(), msg.clone()), Err(ChannelError::Closed(_))));
        assert!(tab_a.subscribe().is_none());
        assert!(tab_b.publish(Uuid::new_v4(), msg).is_ok());
    }

    #[test]
    fn test_noop_channel_delivers_nothing() {
        let channel = NoopPeerChannel;
        let msg = PeerMessage::HealthResult {
            result: HealthCheckResult::healthy(80, 5),
        };
        assert!(channel.publish(Uuid::new_v4(), msg).is_ok());
        assert!(channel.subscribe().is_none());
        assert_eq!(channel.name(), HEALTH_CHANNEL_NAME);
    }
}
