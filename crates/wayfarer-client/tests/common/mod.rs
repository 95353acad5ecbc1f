//! Scriptable in-memory backend shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use wayfarer_client::remote::{AuthSession, RemoteBackend, RemoteError, RemoteResult};
use wayfarer_client::{AppState, Client, Session};
use wayfarer_shared::types::{CommunityId, EventId, PostId, UserId};
use wayfarer_store::{Comment, Community, Database, Event, Membership, Post, Profile, Resource};

pub const PASSWORD: &str = "correct horse";
pub const USER_ID: &str = "2b7e1516-28ae-4d2a-a6ab-f7158809cf4f";

#[derive(Default)]
pub struct FakeBackend {
    /// Every write fails with a 500.
    pub fail_writes: AtomicBool,
    /// Every call fails as if the network were down.
    pub unreachable: AtomicBool,
    pub calls: Mutex<Vec<String>>,
    pub communities: Mutex<Vec<Community>>,
    pub posts: Mutex<Vec<Post>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    pub fn go_offline(&self) {
        self.unreachable.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn read(&self, name: &str) -> RemoteResult<()> {
        self.calls.lock().unwrap().push(name.to_string());
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(RemoteError::Network("connection refused".into()));
        }
        Ok(())
    }

    fn write(&self, name: &str) -> RemoteResult<()> {
        self.read(name)?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RemoteError::Status {
                status: 500,
                body: "internal error".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteBackend for FakeBackend {
    async fn sign_in(&self, email: &str, password: &str) -> RemoteResult<AuthSession> {
        self.read("sign_in")?;
        if password != PASSWORD {
            return Err(RemoteError::from_status(400, "Invalid login credentials"));
        }
        Ok(AuthSession {
            user_id: UserId::new(USER_ID),
            access_token: format!("token-for-{email}"),
        })
    }

    async fn sign_out(&self) -> RemoteResult<()> {
        self.read("sign_out")
    }

    async fn fetch_profile(&self, id: &UserId) -> RemoteResult<Option<Profile>> {
        self.read("fetch_profile")?;
        Ok(Some(Profile {
            id: id.clone(),
            username: "marta".into(),
            display_name: Some("Marta".into()),
            avatar_url: None,
            bio: None,
            created_at: Utc::now(),
        }))
    }

    async fn list_communities(&self) -> RemoteResult<Vec<Community>> {
        self.read("list_communities")?;
        Ok(self.communities.lock().unwrap().clone())
    }

    async fn upsert_community(&self, community: &Community) -> RemoteResult<()> {
        self.write("upsert_community")?;
        let mut list = self.communities.lock().unwrap();
        list.retain(|c| c.id != community.id);
        list.push(community.clone());
        Ok(())
    }

    async fn upsert_member(&self, _community: &CommunityId, _member: &Membership) -> RemoteResult<()> {
        self.write("upsert_member")
    }

    async fn delete_member(&self, _community: &CommunityId, _user: &UserId) -> RemoteResult<()> {
        self.write("delete_member")
    }

    async fn list_posts(&self, community: &CommunityId, _viewer: &UserId) -> RemoteResult<Vec<Post>> {
        self.read("list_posts")?;
        Ok(self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| &p.community_id == community)
            .cloned()
            .collect())
    }

    async fn insert_post(&self, post: &Post) -> RemoteResult<()> {
        self.write("insert_post")?;
        self.posts.lock().unwrap().push(post.clone());
        Ok(())
    }

    async fn set_like(&self, _post: &PostId, _user: &UserId, _liked: bool) -> RemoteResult<()> {
        self.write("set_like")
    }

    async fn insert_comment(&self, _comment: &Comment) -> RemoteResult<()> {
        self.write("insert_comment")
    }

    async fn list_events(&self, _community: &CommunityId, _viewer: &UserId) -> RemoteResult<Vec<Event>> {
        self.read("list_events")?;
        Ok(Vec::new())
    }

    async fn insert_event(&self, _event: &Event) -> RemoteResult<()> {
        self.write("insert_event")
    }

    async fn set_rsvp(&self, _event: &EventId, _user: &UserId, _attending: bool) -> RemoteResult<()> {
        self.write("set_rsvp")
    }

    async fn list_resources(&self, _community: &CommunityId) -> RemoteResult<Vec<Resource>> {
        self.read("list_resources")?;
        Ok(Vec::new())
    }

    async fn insert_resource(&self, _resource: &Resource) -> RemoteResult<()> {
        self.write("insert_resource")
    }
}

/// A client over an in-memory database, talking to `backend`.
pub fn client_with(backend: Arc<FakeBackend>) -> Client {
    Client::new(AppState::new(Database::open_in_memory().unwrap()), backend)
}

/// A client already signed in against `backend`.
pub async fn signed_in(backend: Arc<FakeBackend>) -> Client {
    let client = client_with(backend);
    client.sign_in("marta@example.com", PASSWORD).await.unwrap();
    assert!(matches!(client.session().unwrap(), Session::Authenticated(_)));
    client
}
