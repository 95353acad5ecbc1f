//! REST client for the hosted backend.
//!
//! Auth lives under `/auth/v1`, tables under `/rest/v1/<table>`.  Every
//! request carries the project's anon key as `apikey`; authenticated calls
//! additionally send the user's access token as a bearer token.  Table rows
//! use snake_case columns and are mapped to the camelCase domain models here.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use wayfarer_shared::types::{CommentId, CommunityId, EventId, PostId, ResourceId, UserId};
use wayfarer_store::{
    AccessPolicy, Comment, Community, Event, MemberRole, Membership, MembershipStatus, Post,
    Profile, Resource,
};

use super::{AuthSession, RemoteBackend, RemoteError, RemoteResult};

pub struct RestBackend {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    access_token: RwLock<Option<String>>,
}

impl RestBackend {
    pub fn new(base_url: &str, anon_key: &str, timeout: Duration) -> RemoteResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            access_token: RwLock::new(None),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn bearer(&self) -> String {
        let token = self
            .access_token
            .read()
            .ok()
            .and_then(|guard| guard.clone());
        token.unwrap_or_else(|| self.anon_key.clone())
    }

    fn set_token(&self, token: Option<String>) {
        match self.access_token.write() {
            Ok(mut guard) => *guard = token,
            Err(e) => warn!(error = %e, "access token lock poisoned"),
        }
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer())
    }

    async fn send_json<T: DeserializeOwned>(&self, rb: RequestBuilder) -> RemoteResult<T> {
        let resp = rb.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RemoteError::from_status(status.as_u16(), &body));
        }
        resp.json::<T>()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }

    async fn send_unit(&self, rb: RequestBuilder) -> RemoteResult<()> {
        let resp = rb.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RemoteError::from_status(status.as_u16(), &body));
        }
        Ok(())
    }

    async fn upsert<T: Serialize + ?Sized>(&self, table: &str, row: &T) -> RemoteResult<()> {
        debug!(table, "upserting row");
        let rb = self
            .request(Method::POST, &self.table_url(table))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(row);
        self.send_unit(rb).await
    }

    async fn insert<T: Serialize + ?Sized>(&self, table: &str, row: &T) -> RemoteResult<()> {
        debug!(table, "inserting row");
        let rb = self
            .request(Method::POST, &self.table_url(table))
            .header("Prefer", "return=minimal")
            .json(row);
        self.send_unit(rb).await
    }

    async fn delete(&self, table: &str, filters: &[(&str, String)]) -> RemoteResult<()> {
        debug!(table, "deleting rows");
        let query: Vec<(&str, String)> = filters
            .iter()
            .map(|(col, val)| (*col, format!("eq.{val}")))
            .collect();
        let rb = self
            .request(Method::DELETE, &self.table_url(table))
            .query(&query);
        self.send_unit(rb).await
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> RemoteResult<Vec<T>> {
        let rb = self.request(Method::GET, &self.table_url(table)).query(query);
        self.send_json(rb).await
    }
}

#[async_trait]
impl RemoteBackend for RestBackend {
    async fn sign_in(&self, email: &str, password: &str) -> RemoteResult<AuthSession> {
        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            user: TokenUser,
        }
        #[derive(Deserialize)]
        struct TokenUser {
            id: String,
        }

        let rb = self
            .http
            .post(self.auth_url("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }));

        let resp: TokenResponse = self.send_json(rb).await?;
        self.set_token(Some(resp.access_token.clone()));

        Ok(AuthSession {
            user_id: UserId::new(resp.user.id),
            access_token: resp.access_token,
        })
    }

    async fn sign_out(&self) -> RemoteResult<()> {
        let rb = self.request(Method::POST, &self.auth_url("logout"));
        let result = self.send_unit(rb).await;
        // the local token is dropped even if the server call fails
        self.set_token(None);
        result
    }

    async fn fetch_profile(&self, id: &UserId) -> RemoteResult<Option<Profile>> {
        let rows: Vec<ProfileRow> = self
            .select(
                "profiles",
                &[("id", format!("eq.{id}")), ("select", "*".into())],
            )
            .await?;
        Ok(rows.into_iter().next().map(Profile::from))
    }

    async fn list_communities(&self) -> RemoteResult<Vec<Community>> {
        let rows: Vec<CommunityRow> = self
            .select(
                "communities",
                &[
                    ("select", "*,members(*)".into()),
                    ("order", "created_at.desc".into()),
                ],
            )
            .await?;
        Ok(rows.into_iter().map(Community::from).collect())
    }

    async fn upsert_community(&self, community: &Community) -> RemoteResult<()> {
        self.upsert("communities", &CommunityRow::from(community))
            .await?;
        let members: Vec<MemberRow> = community
            .members
            .iter()
            .map(|m| MemberRow::new(community.id, m))
            .collect();
        if members.is_empty() {
            return Ok(());
        }
        self.upsert("members", &members).await
    }

    async fn upsert_member(&self, community: &CommunityId, member: &Membership) -> RemoteResult<()> {
        self.upsert("members", &MemberRow::new(*community, member))
            .await
    }

    async fn delete_member(&self, community: &CommunityId, user: &UserId) -> RemoteResult<()> {
        self.delete(
            "members",
            &[
                ("community_id", community.to_string()),
                ("user_id", user.to_string()),
            ],
        )
        .await
    }

    async fn list_posts(
        &self,
        community: &CommunityId,
        viewer: &UserId,
    ) -> RemoteResult<Vec<Post>> {
        let rows: Vec<PostRow> = self
            .select(
                "posts",
                &[
                    ("community_id", format!("eq.{community}")),
                    ("select", "*,comments(*),post_likes(user_id)".into()),
                    ("order", "created_at.desc".into()),
                ],
            )
            .await?;
        Ok(rows.into_iter().map(|r| r.into_post(viewer)).collect())
    }

    async fn insert_post(&self, post: &Post) -> RemoteResult<()> {
        self.insert("posts", &PostRow::from(post)).await
    }

    async fn set_like(&self, post: &PostId, user: &UserId, liked: bool) -> RemoteResult<()> {
        if liked {
            let row = UserLinkRow {
                post_id: Some(*post),
                event_id: None,
                user_id: user.clone(),
            };
            self.upsert("post_likes", &row).await
        } else {
            self.delete(
                "post_likes",
                &[("post_id", post.to_string()), ("user_id", user.to_string())],
            )
            .await
        }
    }

    async fn insert_comment(&self, comment: &Comment) -> RemoteResult<()> {
        self.insert("comments", &CommentRow::from(comment)).await
    }

    async fn list_events(
        &self,
        community: &CommunityId,
        viewer: &UserId,
    ) -> RemoteResult<Vec<Event>> {
        let rows: Vec<EventRow> = self
            .select(
                "events",
                &[
                    ("community_id", format!("eq.{community}")),
                    ("select", "*,event_attendees(user_id)".into()),
                    ("order", "starts_at.asc".into()),
                ],
            )
            .await?;
        Ok(rows.into_iter().map(|r| r.into_event(viewer)).collect())
    }

    async fn insert_event(&self, event: &Event) -> RemoteResult<()> {
        self.insert("events", &EventRow::from(event)).await
    }

    async fn set_rsvp(&self, event: &EventId, user: &UserId, attending: bool) -> RemoteResult<()> {
        if attending {
            let row = UserLinkRow {
                post_id: None,
                event_id: Some(*event),
                user_id: user.clone(),
            };
            self.upsert("event_attendees", &row).await
        } else {
            self.delete(
                "event_attendees",
                &[("event_id", event.to_string()), ("user_id", user.to_string())],
            )
            .await
        }
    }

    async fn list_resources(&self, community: &CommunityId) -> RemoteResult<Vec<Resource>> {
        let rows: Vec<ResourceRow> = self
            .select(
                "resources",
                &[
                    ("community_id", format!("eq.{community}")),
                    ("order", "created_at.desc".into()),
                ],
            )
            .await?;
        Ok(rows.into_iter().map(Resource::from).collect())
    }

    async fn insert_resource(&self, resource: &Resource) -> RemoteResult<()> {
        self.insert("resources", &ResourceRow::from(resource)).await
    }
}

// ---------------------------------------------------------------------------
// Table rows
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ProfileRow {
    id: String,
    username: String,
    full_name: Option<String>,
    avatar_url: Option<String>,
    bio: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<ProfileRow> for Profile {
    fn from(r: ProfileRow) -> Self {
        Self {
            id: UserId::new(r.id),
            username: r.username,
            display_name: r.full_name,
            avatar_url: r.avatar_url,
            bio: r.bio,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CommunityRow {
    id: CommunityId,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    category: String,
    image_url: Option<String>,
    access: AccessPolicy,
    creator_id: UserId,
    created_at: DateTime<Utc>,
    #[serde(default, skip_serializing)]
    members: Vec<MemberRow>,
}

impl From<&Community> for CommunityRow {
    fn from(c: &Community) -> Self {
        Self {
            id: c.id,
            name: c.name.clone(),
            description: c.description.clone(),
            category: c.category.clone(),
            image_url: c.image_url.clone(),
            access: c.access,
            creator_id: c.creator_id.clone(),
            created_at: c.created_at,
            members: Vec::new(),
        }
    }
}

impl From<CommunityRow> for Community {
    fn from(r: CommunityRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            description: r.description,
            category: r.category,
            image_url: r.image_url,
            access: r.access,
            creator_id: r.creator_id,
            members: r.members.into_iter().map(Membership::from).collect(),
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct MemberRow {
    community_id: CommunityId,
    user_id: UserId,
    status: MembershipStatus,
    role: MemberRole,
    joined_at: DateTime<Utc>,
}

impl MemberRow {
    fn new(community_id: CommunityId, m: &Membership) -> Self {
        Self {
            community_id,
            user_id: m.user_id.clone(),
            status: m.status,
            role: m.role,
            joined_at: m.joined_at,
        }
    }
}

impl From<MemberRow> for Membership {
    fn from(r: MemberRow) -> Self {
        Self {
            user_id: r.user_id,
            status: r.status,
            role: r.role,
            joined_at: r.joined_at,
        }
    }
}

/// Embedded `{ user_id }` rows from the like / attendee join tables.
#[derive(Debug, Serialize, Deserialize)]
struct UserRef {
    user_id: UserId,
}

#[derive(Debug, Serialize, Deserialize)]
struct PostRow {
    id: PostId,
    community_id: CommunityId,
    author_id: UserId,
    content: String,
    created_at: DateTime<Utc>,
    #[serde(default, skip_serializing)]
    comments: Vec<CommentRow>,
    #[serde(default, skip_serializing)]
    post_likes: Vec<UserRef>,
}

impl PostRow {
    fn into_post(self, viewer: &UserId) -> Post {
        let has_liked = self.post_likes.iter().any(|l| &l.user_id == viewer);
        let mut comments: Vec<Comment> = self.comments.into_iter().map(Comment::from).collect();
        comments.sort_by_key(|c| c.created_at);
        Post {
            id: self.id,
            community_id: self.community_id,
            author_id: self.author_id,
            content: self.content,
            likes: u32::try_from(self.post_likes.len()).unwrap_or(u32::MAX),
            has_liked,
            comments,
            created_at: self.created_at,
        }
    }
}

impl From<&Post> for PostRow {
    fn from(p: &Post) -> Self {
        Self {
            id: p.id,
            community_id: p.community_id,
            author_id: p.author_id.clone(),
            content: p.content.clone(),
            created_at: p.created_at,
            comments: Vec::new(),
            post_likes: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CommentRow {
    id: CommentId,
    post_id: PostId,
    author_id: UserId,
    content: String,
    created_at: DateTime<Utc>,
}

impl From<&Comment> for CommentRow {
    fn from(c: &Comment) -> Self {
        Self {
            id: c.id,
            post_id: c.post_id,
            author_id: c.author_id.clone(),
            content: c.content.clone(),
            created_at: c.created_at,
        }
    }
}

impl From<CommentRow> for Comment {
    fn from(r: CommentRow) -> Self {
        Self {
            id: r.id,
            post_id: r.post_id,
            author_id: r.author_id,
            content: r.content,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct UserLinkRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    post_id: Option<PostId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    event_id: Option<EventId>,
    user_id: UserId,
}

#[derive(Debug, Serialize, Deserialize)]
struct EventRow {
    id: EventId,
    community_id: CommunityId,
    title: String,
    #[serde(default)]
    location: String,
    starts_at: DateTime<Utc>,
    #[serde(default, skip_serializing)]
    event_attendees: Vec<UserRef>,
}

impl EventRow {
    fn into_event(self, viewer: &UserId) -> Event {
        let attendees: Vec<UserId> = self
            .event_attendees
            .into_iter()
            .map(|a| a.user_id)
            .collect();
        Event {
            id: self.id,
            community_id: self.community_id,
            title: self.title,
            location: self.location,
            starts_at: self.starts_at,
            is_attending: attendees.contains(viewer),
            attendees,
        }
    }
}

impl From<&Event> for EventRow {
    fn from(e: &Event) -> Self {
        Self {
            id: e.id,
            community_id: e.community_id,
            title: e.title.clone(),
            location: e.location.clone(),
            starts_at: e.starts_at,
            event_attendees: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ResourceRow {
    id: ResourceId,
    community_id: CommunityId,
    title: String,
    url: String,
    added_by: UserId,
    created_at: DateTime<Utc>,
}

impl From<&Resource> for ResourceRow {
    fn from(r: &Resource) -> Self {
        Self {
            id: r.id,
            community_id: r.community_id,
            title: r.title.clone(),
            url: r.url.clone(),
            added_by: r.added_by.clone(),
            created_at: r.created_at,
        }
    }
}

impl From<ResourceRow> for Resource {
    fn from(r: ResourceRow) -> Self {
        Self {
            id: r.id,
            community_id: r.community_id,
            title: r.title,
            url: r.url,
            added_by: r.added_by,
            created_at: r.created_at,
        }
    }
}
