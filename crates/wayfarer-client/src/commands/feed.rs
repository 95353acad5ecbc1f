use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use wayfarer_shared::types::{CommentId, CommunityId, EventId, PostId, ResourceId, UserId};
use wayfarer_shared::validation::{require_title, validate_content, validate_url};
use wayfarer_store::{Comment, Event, Post, Resource, StorageKey};

use crate::client::Client;
use crate::error::{ClientError, Result};
use crate::events::ClientEvent;
use crate::repository::{resolve_load, LoadSource};
use crate::state::AppState;

/// Form input for a new community event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDraft {
    pub title: String,
    #[serde(default)]
    pub location: String,
    pub starts_at: DateTime<Utc>,
}

impl Client {
    // ------------------------------------------------------------------
    // Posts
    // ------------------------------------------------------------------

    pub async fn create_post(&self, community_id: CommunityId, content: &str) -> Result<Post> {
        validate_content(content)?;
        let me = self.member_of(community_id)?;

        let post = Post {
            id: PostId::new(),
            community_id,
            author_id: me,
            content: content.trim().to_string(),
            likes: 0,
            has_liked: false,
            comments: Vec::new(),
            created_at: Utc::now(),
        };
        let id = post.id;

        self.optimistic(
            "create-post",
            StorageKey::Posts,
            |state| {
                state.posts.push(post.clone());
                Ok(((), post.clone()))
            },
            |remote, post| async move { remote.insert_post(&post).await },
            |state, ()| {
                state.posts.retain(|p| p.id != id);
                Ok(())
            },
        )
        .await?;

        self.emit(ClientEvent::FeedChanged { community_id });
        Ok(post)
    }

    /// Like or unlike a post.  Returns the new `has_liked`.
    pub async fn toggle_like(&self, post_id: PostId) -> Result<bool> {
        let (me, community_id) = self.read(|s| {
            let me = s.current_user()?;
            let post = s
                .posts
                .iter()
                .find(|p| p.id == post_id)
                .ok_or(ClientError::PostNotFound(post_id))?;
            Ok::<_, ClientError>((me, post.community_id))
        })??;

        let mut liked = false;
        let result = self
            .optimistic(
                "like",
                StorageKey::Posts,
                |state| {
                    let post = state.post_mut(post_id)?;
                    let before = (post.likes, post.has_liked);
                    post.toggle_like();
                    liked = post.has_liked;
                    Ok((before, liked))
                },
                |remote, liked| async move { remote.set_like(&post_id, &me, liked).await },
                |state, (likes, has_liked)| {
                    let post = state.post_mut(post_id)?;
                    post.likes = likes;
                    post.has_liked = has_liked;
                    Ok(())
                },
            )
            .await;

        if Client::settled(&result) {
            self.emit(ClientEvent::FeedChanged { community_id });
        }
        result?;
        Ok(liked)
    }

    pub async fn add_comment(&self, post_id: PostId, content: &str) -> Result<Comment> {
        validate_content(content)?;
        let (me, community_id) = self.read(|s| {
            let me = s.current_user()?;
            let post = s
                .posts
                .iter()
                .find(|p| p.id == post_id)
                .ok_or(ClientError::PostNotFound(post_id))?;
            Ok::<_, ClientError>((me, post.community_id))
        })??;

        let comment = Comment {
            id: CommentId::new(),
            post_id,
            author_id: me,
            content: content.trim().to_string(),
            created_at: Utc::now(),
        };
        let comment_id = comment.id;

        let result = self
            .optimistic(
                "comment",
                StorageKey::Posts,
                |state| {
                    state.post_mut(post_id)?.comments.push(comment.clone());
                    Ok(((), comment.clone()))
                },
                |remote, comment| async move { remote.insert_comment(&comment).await },
                |state, ()| {
                    state.post_mut(post_id)?.comments.retain(|c| c.id != comment_id);
                    Ok(())
                },
            )
            .await;

        if Client::settled(&result) {
            self.emit(ClientEvent::FeedChanged { community_id });
        }
        result?;
        Ok(comment)
    }

    /// Posts of a community, newest first.
    pub fn posts_for(&self, community_id: CommunityId) -> Result<Vec<Post>> {
        self.read(|s| {
            let mut posts: Vec<Post> = s
                .posts
                .iter()
                .filter(|p| p.community_id == community_id)
                .cloned()
                .collect();
            posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            posts
        })
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    pub async fn create_event(&self, community_id: CommunityId, draft: EventDraft) -> Result<Event> {
        require_title(&draft.title)?;
        let me = self.member_of(community_id)?;

        let event = Event {
            id: EventId::new(),
            community_id,
            title: draft.title.trim().to_string(),
            location: draft.location,
            starts_at: draft.starts_at,
            attendees: vec![me],
            is_attending: true,
        };
        let id = event.id;

        self.optimistic(
            "create-event",
            StorageKey::Events,
            |state| {
                state.events.push(event.clone());
                Ok(((), event.clone()))
            },
            |remote, event| async move { remote.insert_event(&event).await },
            |state, ()| {
                state.events.retain(|e| e.id != id);
                Ok(())
            },
        )
        .await?;

        self.emit(ClientEvent::FeedChanged { community_id });
        Ok(event)
    }

    /// Attend or stop attending.  Returns the new `is_attending`.
    pub async fn toggle_rsvp(&self, event_id: EventId) -> Result<bool> {
        let (me, community_id) = self.read(|s| {
            let me = s.current_user()?;
            let event = s
                .events
                .iter()
                .find(|e| e.id == event_id)
                .ok_or(ClientError::EventNotFound(event_id))?;
            Ok::<_, ClientError>((me, event.community_id))
        })??;

        let mut attending = false;
        let result = self
            .optimistic(
                "rsvp",
                StorageKey::Events,
                |state| {
                    let event = state.event_mut(event_id)?;
                    let before = event.clone();
                    event.toggle_rsvp(&me);
                    attending = event.is_attending;
                    Ok((before, attending))
                },
                |remote, attending| {
                    let me = me.clone();
                    async move { remote.set_rsvp(&event_id, &me, attending).await }
                },
                |state, before| {
                    *state.event_mut(event_id)? = before;
                    Ok(())
                },
            )
            .await;

        if Client::settled(&result) {
            self.emit(ClientEvent::FeedChanged { community_id });
        }
        result?;
        Ok(attending)
    }

    /// Upcoming and past events of a community, soonest first.
    pub fn events_for(&self, community_id: CommunityId) -> Result<Vec<Event>> {
        self.read(|s| {
            let mut events: Vec<Event> = s
                .events
                .iter()
                .filter(|e| e.community_id == community_id)
                .cloned()
                .collect();
            events.sort_by_key(|e| e.starts_at);
            events
        })
    }

    // ------------------------------------------------------------------
    // Resources
    // ------------------------------------------------------------------

    pub async fn add_resource(&self, community_id: CommunityId, title: &str, url: &str) -> Result<Resource> {
        require_title(title)?;
        validate_url(url)?;
        let me = self.member_of(community_id)?;

        let resource = Resource {
            id: ResourceId::new(),
            community_id,
            title: title.trim().to_string(),
            url: url.trim().to_string(),
            added_by: me,
            created_at: Utc::now(),
        };
        let id = resource.id;

        self.optimistic(
            "add-resource",
            StorageKey::Resources,
            |state| {
                state.resources.push(resource.clone());
                Ok(((), resource.clone()))
            },
            |remote, resource| async move { remote.insert_resource(&resource).await },
            |state, ()| {
                state.resources.retain(|r| r.id != id);
                Ok(())
            },
        )
        .await?;

        self.emit(ClientEvent::FeedChanged { community_id });
        Ok(resource)
    }

    pub fn resources_for(&self, community_id: CommunityId) -> Result<Vec<Resource>> {
        self.read(|s| {
            s.resources
                .iter()
                .filter(|r| r.community_id == community_id)
                .cloned()
                .collect()
        })
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Pull posts, events and resources of one community from the backend
    /// and merge them over the local cache.  Returns where the posts came
    /// from; remote failures fall back to local data.
    pub async fn refresh_feed(&self, community_id: CommunityId) -> Result<LoadSource> {
        let viewer = self.read(|s| s.current_user())??;
        let remote = self.remote();

        let posts = remote.list_posts(&community_id, &viewer).await;
        let events = remote.list_events(&community_id, &viewer).await;
        let resources = remote.list_resources(&community_id).await;

        let source = {
            let mut state = self.lock()?;

            let local = std::mem::take(&mut state.posts);
            let (merged, source) =
                resolve_load("posts", local, posts, |p| p.community_id == community_id);
            state.posts = merged;
            if source == LoadSource::Remote {
                state.persist(StorageKey::Posts)?;
            }

            let local = std::mem::take(&mut state.events);
            let (merged, events_source) =
                resolve_load("events", local, events, |e| e.community_id == community_id);
            state.events = merged;
            if events_source == LoadSource::Remote {
                state.persist(StorageKey::Events)?;
            }

            let local = std::mem::take(&mut state.resources);
            let (merged, resources_source) =
                resolve_load("resources", local, resources, |r| r.community_id == community_id);
            state.resources = merged;
            if resources_source == LoadSource::Remote {
                state.persist(StorageKey::Resources)?;
            }

            source
        };

        debug!(community = %community_id, ?source, "feed refreshed");
        self.emit(ClientEvent::FeedChanged { community_id });
        Ok(source)
    }

    /// The current user, if they are an approved member of `community_id`.
    fn member_of(&self, community_id: CommunityId) -> Result<UserId> {
        self.read(|s: &AppState| {
            let me = s.current_user()?;
            if s.community(community_id)?.is_member(&me) {
                Ok(me)
            } else {
                Err(ClientError::NotAMember { user: me })
            }
        })?
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use wayfarer_store::{AccessPolicy, Database, Profile};

    use super::*;
    use crate::commands::CommunityDraft;
    use crate::remote::OfflineBackend;
    use crate::state::Session;

    async fn client_with_community() -> (Client, CommunityId) {
        let mut state = AppState::new(Database::open_in_memory().unwrap());
        state.session = Session::Mock(Profile::mock("host"));
        let client = Client::new(state, Arc::new(OfflineBackend));
        let community = client
            .create_community(CommunityDraft {
                name: "Slow travel".into(),
                description: String::new(),
                category: String::new(),
                image_url: None,
                access: AccessPolicy::Open,
            })
            .await
            .unwrap();
        (client, community.id)
    }

    #[tokio::test]
    async fn like_toggles_locally() {
        let (client, community) = client_with_community().await;
        let post = client.create_post(community, "Night bus to Porto").await.unwrap();

        assert!(client.toggle_like(post.id).await.unwrap());
        assert_eq!(client.posts_for(community).unwrap()[0].likes, 1);
        assert!(!client.toggle_like(post.id).await.unwrap());
        assert_eq!(client.posts_for(community).unwrap()[0].likes, 0);
    }

    #[tokio::test]
    async fn comments_need_content() {
        let (client, community) = client_with_community().await;
        let post = client.create_post(community, "Best hostels?").await.unwrap();

        assert!(matches!(
            client.add_comment(post.id, " ").await,
            Err(ClientError::Validation(_))
        ));
        client.add_comment(post.id, "Try the one by the river").await.unwrap();
        assert_eq!(client.posts_for(community).unwrap()[0].comments.len(), 1);
    }

    #[tokio::test]
    async fn non_members_cannot_post() {
        let (client, community) = client_with_community().await;
        client.state().lock().unwrap().session = Session::Mock(Profile::mock("stranger"));
        assert!(matches!(
            client.create_post(community, "hello").await,
            Err(ClientError::NotAMember { .. })
        ));
    }

    #[tokio::test]
    async fn creator_attends_own_event_and_can_cancel() {
        let (client, community) = client_with_community().await;
        let event = client
            .create_event(
                community,
                EventDraft {
                    title: "Sunset picnic".into(),
                    location: "Miradouro".into(),
                    starts_at: Utc::now(),
                },
            )
            .await
            .unwrap();
        assert!(event.is_attending);

        assert!(!client.toggle_rsvp(event.id).await.unwrap());
        assert!(client.events_for(community).unwrap()[0].attendees.is_empty());
    }

    #[tokio::test]
    async fn resources_need_web_links() {
        let (client, community) = client_with_community().await;
        assert!(matches!(
            client.add_resource(community, "Rail map", "ftp://maps").await,
            Err(ClientError::Validation(_))
        ));
        client
            .add_resource(community, "Rail map", "https://example.org/rail")
            .await
            .unwrap();
        assert_eq!(client.resources_for(community).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn offline_refresh_keeps_local_feed() {
        let (client, community) = client_with_community().await;
        client.create_post(community, "Still here").await.unwrap();
        assert_eq!(client.refresh_feed(community).await.unwrap(), LoadSource::Local);
        assert_eq!(client.posts_for(community).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_local_write_undoes_the_like() {
        let (client, community) = client_with_community().await;
        let post = client.create_post(community, "Ferry tips").await.unwrap();
        let mut events = client.subscribe();
        client
            .state()
            .lock()
            .unwrap()
            .database
            .conn()
            .execute_batch(
                "CREATE TEMP TRIGGER refuse_writes BEFORE INSERT ON local_storage
                 BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
            )
            .unwrap();

        assert!(matches!(client.toggle_like(post.id).await, Err(ClientError::Store(_))));
        let now = client.posts_for(community).unwrap();
        assert_eq!((now[0].likes, now[0].has_liked), (0, false));
        assert!(events.try_recv().is_err());
    }
}
