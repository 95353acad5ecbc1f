//! Change notifications for the UI layer.
//!
//! Subscribers get a `tokio::sync::broadcast` receiver; slow subscribers
//! lose the oldest events rather than blocking the client.

use serde::Serialize;
use tokio::sync::broadcast;

use wayfarer_shared::types::{CommunityId, ConversationId, UserId};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientEvent {
    SessionChanged {
        user_id: Option<UserId>,
        mock: bool,
    },
    ConversationsChanged {
        ids: Vec<ConversationId>,
    },
    TotalUnreadChanged {
        total: u32,
    },
    CommunityChanged {
        id: CommunityId,
    },
    FeedChanged {
        community_id: CommunityId,
    },
    NotificationsChanged {
        unread: usize,
    },
    /// An optimistic change was rolled back after the remote call failed.
    MutationReverted {
        action: &'static str,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ClientEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: ClientEvent) {
        // no receivers is fine: nobody is watching yet
        if let Err(broadcast::error::SendError(event)) = self.tx.send(event) {
            tracing::trace!(?event, "event dropped, no subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
