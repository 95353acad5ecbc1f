use thiserror::Error;

use wayfarer_shared::types::{CommunityId, ConversationId, EventId, PostId, UserId};
use wayfarer_shared::ValidationError;
use wayfarer_store::StoreError;

use crate::remote::RemoteError;

/// Errors returned by client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("No user is signed in")]
    NotSignedIn,

    #[error("Not allowed: {0}")]
    Forbidden(&'static str),

    #[error("Conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    #[error("Community not found: {0}")]
    CommunityNotFound(CommunityId),

    #[error("Post not found: {0}")]
    PostNotFound(PostId),

    #[error("Event not found: {0}")]
    EventNotFound(EventId),

    #[error("{user} has no pending request in this community")]
    NoPendingRequest { user: UserId },

    #[error("{user} is not a member of this community")]
    NotAMember { user: UserId },

    #[error("Application state lock poisoned")]
    StatePoisoned,
}

impl ClientError {
    /// Static text suitable for a toast or inline alert.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Validation(v) => v.to_string(),
            ClientError::Remote(RemoteError::RateLimited) => {
                "Too many attempts. Please wait a moment and try again.".into()
            }
            ClientError::Remote(RemoteError::Unauthorized(_)) => {
                "Your session has expired. Please sign in again.".into()
            }
            ClientError::Remote(e) if e.is_unreachable() => {
                "Can't reach the server. Check your connection and try again.".into()
            }
            ClientError::Remote(_) => "Something went wrong. Please try again.".into(),
            ClientError::NotSignedIn => "Please sign in to continue.".into(),
            ClientError::Forbidden(_) => "You don't have permission to do that.".into(),
            ClientError::ConversationNotFound(_)
            | ClientError::CommunityNotFound(_)
            | ClientError::PostNotFound(_)
            | ClientError::EventNotFound(_) => "That item no longer exists.".into(),
            ClientError::NoPendingRequest { .. } | ClientError::NotAMember { .. } => {
                self.to_string()
            }
            ClientError::Store(_) | ClientError::StatePoisoned => {
                "Something went wrong saving your data.".into()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_messages_are_classified() {
        let rate = ClientError::Remote(RemoteError::RateLimited);
        assert!(rate.user_message().contains("wait"));

        let offline = ClientError::Remote(RemoteError::Network("dns".into()));
        assert!(offline.user_message().contains("connection"));

        let invalid = ClientError::Validation(ValidationError::TitleTooShort);
        assert_eq!(invalid.user_message(), "Name must be at least 3 characters");
    }
}
