use async_trait::async_trait;

use wayfarer_shared::types::{CommunityId, EventId, PostId, UserId};
use wayfarer_store::{Comment, Community, Event, Membership, Post, Profile, Resource};

use super::{AuthSession, RemoteBackend, RemoteError, RemoteResult};

/// Backend used when no remote is configured: every call fails with
/// [`RemoteError::Unavailable`], so the client runs on local storage only.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineBackend;

#[async_trait]
impl RemoteBackend for OfflineBackend {
    async fn sign_in(&self, _email: &str, _password: &str) -> RemoteResult<AuthSession> {
        Err(RemoteError::Unavailable)
    }

    async fn sign_out(&self) -> RemoteResult<()> {
        Ok(())
    }

    async fn fetch_profile(&self, _id: &UserId) -> RemoteResult<Option<Profile>> {
        Err(RemoteError::Unavailable)
    }

    async fn list_communities(&self) -> RemoteResult<Vec<Community>> {
        Err(RemoteError::Unavailable)
    }

    async fn upsert_community(&self, _community: &Community) -> RemoteResult<()> {
        Err(RemoteError::Unavailable)
    }

    async fn upsert_member(&self, _c: &CommunityId, _m: &Membership) -> RemoteResult<()> {
        Err(RemoteError::Unavailable)
    }

    async fn delete_member(&self, _c: &CommunityId, _u: &UserId) -> RemoteResult<()> {
        Err(RemoteError::Unavailable)
    }

    async fn list_posts(&self, _c: &CommunityId, _v: &UserId) -> RemoteResult<Vec<Post>> {
        Err(RemoteError::Unavailable)
    }

    async fn insert_post(&self, _post: &Post) -> RemoteResult<()> {
        Err(RemoteError::Unavailable)
    }

    async fn set_like(&self, _p: &PostId, _u: &UserId, _liked: bool) -> RemoteResult<()> {
        Err(RemoteError::Unavailable)
    }

    async fn insert_comment(&self, _comment: &Comment) -> RemoteResult<()> {
        Err(RemoteError::Unavailable)
    }

    async fn list_events(&self, _c: &CommunityId, _v: &UserId) -> RemoteResult<Vec<Event>> {
        Err(RemoteError::Unavailable)
    }

    async fn insert_event(&self, _event: &Event) -> RemoteResult<()> {
        Err(RemoteError::Unavailable)
    }

    async fn set_rsvp(&self, _e: &EventId, _u: &UserId, _attending: bool) -> RemoteResult<()> {
        Err(RemoteError::Unavailable)
    }

    async fn list_resources(&self, _c: &CommunityId) -> RemoteResult<Vec<Resource>> {
        Err(RemoteError::Unavailable)
    }

    async fn insert_resource(&self, _resource: &Resource) -> RemoteResult<()> {
        Err(RemoteError::Unavailable)
    }
}
