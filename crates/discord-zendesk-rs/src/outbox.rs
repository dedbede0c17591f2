// ABOUTME: Fire-and-forget queue for posting into Discord from other contexts.
// ABOUTME: The webhook submits posts; a worker on the Discord side delivers them.

use crate::chat::ChatPlatform;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// A message waiting to be posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundPost {
    pub channel_id: u64,
    pub text: String,
}

/// Sending half of the outbox. Cheap to clone.
#[derive(Clone)]
pub struct ChatOutbox {
    tx: mpsc::UnboundedSender<OutboundPost>,
}

/// Receiving half, drained by [`run_outbox`].
pub struct OutboxReceiver {
    rx: mpsc::UnboundedReceiver<OutboundPost>,
}

/// Create a connected outbox pair.
pub fn channel() -> (ChatOutbox, OutboxReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChatOutbox { tx }, OutboxReceiver { rx })
}

impl ChatOutbox {
    /// Queue a post without waiting for delivery.
    ///
    /// Returns false if the worker has stopped.
    pub fn submit(&self, channel_id: u64, text: impl Into<String>) -> bool {
        let post = OutboundPost {
            channel_id,
            text: text.into(),
        };
        match self.tx.send(post) {
            Ok(()) => {
                debug!(channel_id, "Queued outbound post");
                true
            }
            Err(_) => {
                warn!(channel_id, "Outbox worker stopped, dropping post");
                false
            }
        }
    }
}

impl OutboxReceiver {
    pub async fn recv(&mut self) -> Option<OutboundPost> {
        self.rx.recv().await
    }

    /// Take a queued post without waiting.
    ///
    /// The worker only uses [`recv`](Self::recv); this lets callers that hold the
    /// receiver, such as tests, check what was queued.
    pub fn try_recv(&mut self) -> Option<OutboundPost> {
        self.rx.try_recv().ok()
    }
}

/// Deliver queued posts until every [`ChatOutbox`] handle is dropped.
///
/// Posts to channels the bot can no longer see are dropped.
pub async fn run_outbox(mut outbox: OutboxReceiver, chat: Arc<dyn ChatPlatform>) {
    info!("Outbox worker started");

    while let Some(post) = outbox.recv().await {
        if !chat.channel_exists(post.channel_id).await {
            warn!(channel_id = post.channel_id, "Channel not resolvable, dropping post");
            continue;
        }

        if let Err(e) = chat.send_message(post.channel_id, &post.text).await {
            error!(channel_id = post.channel_id, error = %e, "Failed to deliver post");
        }
    }

    info!("Outbox worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_submit_then_receive() {
        let (outbox, mut rx) = channel();
        assert!(outbox.submit(42, "hello"));
        assert_eq!(
            rx.recv().await,
            Some(OutboundPost {
                channel_id: 42,
                text: "hello".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_submit_after_receiver_dropped() {
        let (outbox, rx) = channel();
        drop(rx);
        assert!(!outbox.submit(42, "hello"));
    }
}
