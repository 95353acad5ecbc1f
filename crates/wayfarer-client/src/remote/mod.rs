//! Remote backend: the hosted auth + table service.
//!
//! Everything the client needs from the backend goes through the
//! [`RemoteBackend`] trait so the application state never depends on a
//! concrete HTTP client.  [`RestBackend`] talks to the real service,
//! [`OfflineBackend`] is used when none is configured.

pub mod offline;
pub mod rest;

use async_trait::async_trait;
use thiserror::Error;

use wayfarer_shared::types::{CommunityId, EventId, PostId, UserId};
use wayfarer_store::{Comment, Community, Event, Membership, Post, Profile, Resource};

pub use offline::OfflineBackend;
pub use rest::RestBackend;

/// Classified remote failure.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Not found")]
    NotFound,

    #[error("Remote backend unavailable")]
    Unavailable,

    #[error("Remote returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Classify a non-success HTTP response.
    pub fn from_status(status: u16, body: &str) -> Self {
        let lowered = body.to_lowercase();
        match status {
            429 => RemoteError::RateLimited,
            _ if lowered.contains("rate limit") => RemoteError::RateLimited,
            401 | 403 => RemoteError::Unauthorized(body.to_string()),
            404 => RemoteError::NotFound,
            _ => RemoteError::Status {
                status,
                body: body.to_string(),
            },
        }
    }

    /// Whether the failure means the backend could not be reached at all,
    /// as opposed to the backend answering with a refusal.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, RemoteError::Network(_) | RemoteError::Unavailable)
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            RemoteError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            RemoteError::from_status(status.as_u16(), &e.to_string())
        } else {
            RemoteError::Network(e.to_string())
        }
    }
}

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Result of a successful password sign-in.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user_id: UserId,
    pub access_token: String,
}

#[async_trait]
pub trait RemoteBackend: Send + Sync {
    // -- auth / profiles --

    /// Exchange credentials for a session.  Implementations keep the access
    /// token for subsequent calls.
    async fn sign_in(&self, email: &str, password: &str) -> RemoteResult<AuthSession>;

    async fn sign_out(&self) -> RemoteResult<()>;

    async fn fetch_profile(&self, id: &UserId) -> RemoteResult<Option<Profile>>;

    // -- communities / members --

    /// All communities with their membership lists.
    async fn list_communities(&self) -> RemoteResult<Vec<Community>>;

    async fn upsert_community(&self, community: &Community) -> RemoteResult<()>;

    async fn upsert_member(&self, community: &CommunityId, member: &Membership) -> RemoteResult<()>;

    async fn delete_member(&self, community: &CommunityId, user: &UserId) -> RemoteResult<()>;

    // -- feed --

    /// Posts of a community, with `has_liked` resolved for `viewer`.
    async fn list_posts(&self, community: &CommunityId, viewer: &UserId)
        -> RemoteResult<Vec<Post>>;

    async fn insert_post(&self, post: &Post) -> RemoteResult<()>;

    async fn set_like(&self, post: &PostId, user: &UserId, liked: bool) -> RemoteResult<()>;

    async fn insert_comment(&self, comment: &Comment) -> RemoteResult<()>;

    // -- events / resources --

    async fn list_events(&self, community: &CommunityId, viewer: &UserId)
        -> RemoteResult<Vec<Event>>;

    async fn insert_event(&self, event: &Event) -> RemoteResult<()>;

    async fn set_rsvp(&self, event: &EventId, user: &UserId, attending: bool) -> RemoteResult<()>;

    async fn list_resources(&self, community: &CommunityId) -> RemoteResult<Vec<Resource>>;

    async fn insert_resource(&self, resource: &Resource) -> RemoteResult<()>;
}
