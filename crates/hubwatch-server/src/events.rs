//! Publish/subscribe channel for status change events.

use async_trait::async_trait;
use common::Result;
use tokio::sync::broadcast;
use tracing::debug;

/// Channel status changes are published on.
pub const STATUS_CHANNEL: &str = "controller_status_changes";

/// Publishing seam consumed by the health monitor.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish `message` on `channel`.
    async fn publish(&self, channel: &str, message: &str) -> Result<()>;
}

/// A message as seen by subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub channel: String,
    pub payload: String,
}

/// In-process bus fanning messages out to every subscriber.
///
/// Slow subscribers lose the oldest messages once `capacity` is exceeded.
#[derive(Debug, Clone)]
pub struct BroadcastBus {
    tx: broadcast::Sender<BusMessage>,
}

impl BroadcastBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Receive every message published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<BusMessage> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EventBus for BroadcastBus {
    async fn publish(&self, channel: &str, message: &str) -> Result<()> {
        let msg = BusMessage {
            channel: channel.to_string(),
            payload: message.to_string(),
        };

        // No subscribers is not a failure
        if self.tx.send(msg).is_err() {
            debug!(channel, "Published with no subscribers");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_messages() {
        let bus = BroadcastBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(STATUS_CHANNEL, "ctrl-1:offline:online")
            .await
            .unwrap();

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.channel, STATUS_CHANNEL);
        assert_eq!(msg.payload, "ctrl-1:offline:online");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let bus = BroadcastBus::default();
        assert_eq!(bus.subscriber_count(), 0);
        tokio_test::assert_ok!(bus.publish(STATUS_CHANNEL, "a:online:offline").await);
    }
}
