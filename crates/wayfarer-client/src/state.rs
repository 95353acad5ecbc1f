//! Application state owned by a [`Client`](crate::Client).
//!
//! The [`AppState`] struct is wrapped in `Arc<Mutex<>>` by the client; it is
//! constructed explicitly and handed in, so tests and embedders can build one
//! over any [`Database`].

use wayfarer_shared::types::{CommunityId, ConversationId, EventId, PostId, TripId, UserId};
use wayfarer_store::{
    Community, Conversation, Database, Event, Message, Notification, Post, Profile, Resource,
    StorageKey,
};

use crate::error::{ClientError, Result};
use crate::reconcile;

/// Who the client is acting as.  At most one identity is authoritative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    Anonymous,
    /// Signed in against the remote backend.
    Authenticated(Profile),
    /// Client-only identity, persisted locally, never sent to the backend.
    Mock(Profile),
}

impl Session {
    pub fn profile(&self) -> Option<&Profile> {
        match self {
            Session::Anonymous => None,
            Session::Authenticated(p) | Session::Mock(p) => Some(p),
        }
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.profile().map(|p| &p.id)
    }

    pub fn is_mock(&self) -> bool {
        matches!(self, Session::Mock(_))
    }
}

/// Central application state.
///
/// Holds the session, the local database and the in-memory copy of every
/// collection the UI renders.  In-memory collections are always written back
/// to the database through [`AppState::persist`].
pub struct AppState {
    pub session: Session,

    /// Handle to the local SQLite store.
    pub database: Database,

    pub communities: Vec<Community>,
    pub conversations: Vec<Conversation>,
    /// Flat message list; the source of truth for conversation summaries.
    pub messages: Vec<Message>,
    pub posts: Vec<Post>,
    pub events: Vec<Event>,
    pub resources: Vec<Resource>,
    pub notifications: Vec<Notification>,
    pub followed_users: Vec<UserId>,
    pub booked_trips: Vec<TripId>,
}

impl AppState {
    /// Create an empty state over `database` without reading it.
    pub fn new(database: Database) -> Self {
        Self {
            session: Session::Anonymous,
            database,
            communities: Vec::new(),
            conversations: Vec::new(),
            messages: Vec::new(),
            posts: Vec::new(),
            events: Vec::new(),
            resources: Vec::new(),
            notifications: Vec::new(),
            followed_users: Vec::new(),
            booked_trips: Vec::new(),
        }
    }

    /// Build the state from everything in local storage.
    ///
    /// A stored mock identity becomes the session unless it was signed out
    /// of.  Messages pointing at conversations that no longer exist are
    /// dropped.
    pub fn load(database: Database) -> Result<Self> {
        let mut state = Self::new(database);
        state.restore_session();
        state.reload()?;
        Ok(state)
    }

    /// Adopt the stored mock identity if it is marked active.
    ///
    /// Stores written before the active flag existed count as active.
    /// Returns whether the session changed.
    pub fn restore_session(&mut self) -> bool {
        let db = &self.database;
        let mock: Option<Profile> = db.load(StorageKey::MockUser).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ignoring unreadable mock identity");
            None
        });
        let active: Option<bool> = db.load(StorageKey::MockActive).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ignoring unreadable session flag");
            None
        });

        match mock {
            Some(profile) if active != Some(false) => {
                if self.session == Session::Mock(profile.clone()) {
                    return false;
                }
                tracing::info!(user = %profile.id.short(), "restored local identity");
                self.session = Session::Mock(profile);
                true
            }
            _ => false,
        }
    }

    /// Re-read every collection from local storage, keeping the session.
    pub fn reload(&mut self) -> Result<()> {
        let db = &self.database;
        self.communities = db.load_or_default(StorageKey::Communities)?;
        self.conversations = db.load_or_default(StorageKey::Conversations)?;
        self.messages = db.load_or_default(StorageKey::Messages)?;
        self.posts = db.load_or_default(StorageKey::Posts)?;
        self.events = db.load_or_default(StorageKey::Events)?;
        self.resources = db.load_or_default(StorageKey::Resources)?;
        self.notifications = db.load_or_default(StorageKey::Notifications)?;
        self.followed_users = db.load_or_default(StorageKey::FollowedUsers)?;
        self.booked_trips = db.load_or_default(StorageKey::BookedTrips)?;

        let orphans = reconcile::orphaned_messages(&self.conversations, &self.messages);
        if !orphans.is_empty() {
            tracing::warn!(count = orphans.len(), "dropping messages without a conversation");
            self.messages.retain(|m| !orphans.contains(&m.id));
            self.persist(StorageKey::Messages)?;
        }
        self.reconcile_conversations();

        tracing::info!(
            communities = self.communities.len(),
            conversations = self.conversations.len(),
            messages = self.messages.len(),
            "local state loaded"
        );
        Ok(())
    }

    /// The signed-in (or mock) user.
    pub fn current_user(&self) -> Result<UserId> {
        self.session.user_id().cloned().ok_or(ClientError::NotSignedIn)
    }

    /// Write the in-memory collection behind `key` to local storage.
    pub fn persist(&self, key: StorageKey) -> Result<()> {
        let db = &self.database;
        match key {
            StorageKey::FollowedUsers => db.save(key, &self.followed_users)?,
            StorageKey::BookedTrips => db.save(key, &self.booked_trips)?,
            StorageKey::Communities => db.save(key, &self.communities)?,
            StorageKey::Conversations => db.save(key, &self.conversations)?,
            StorageKey::Messages => db.save(key, &self.messages)?,
            StorageKey::Notifications => db.save(key, &self.notifications)?,
            StorageKey::Posts => db.save(key, &self.posts)?,
            StorageKey::Events => db.save(key, &self.events)?,
            StorageKey::Resources => db.save(key, &self.resources)?,
            StorageKey::MockUser => match &self.session {
                Session::Mock(profile) => db.save(key, profile)?,
                // the stored mock identity outlives other sessions
                _ => {}
            },
            StorageKey::MockActive => db.save(key, &self.session.is_mock())?,
        }
        Ok(())
    }

    /// Re-derive unread counts and last messages; returns changed ids.
    pub fn reconcile_conversations(&mut self) -> Vec<ConversationId> {
        let Some(me) = self.session.user_id().cloned() else {
            return Vec::new();
        };
        reconcile::reconcile(&mut self.conversations, &self.messages, &me)
    }

    pub fn total_unread(&self) -> u32 {
        reconcile::total_unread(&self.conversations)
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    pub fn conversation(&self, id: ConversationId) -> Result<&Conversation> {
        self.conversations
            .iter()
            .find(|c| c.id == id)
            .ok_or(ClientError::ConversationNotFound(id))
    }

    pub fn conversation_mut(&mut self, id: ConversationId) -> Result<&mut Conversation> {
        self.conversations
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(ClientError::ConversationNotFound(id))
    }

    pub fn community(&self, id: CommunityId) -> Result<&Community> {
        self.communities
            .iter()
            .find(|c| c.id == id)
            .ok_or(ClientError::CommunityNotFound(id))
    }

    pub fn community_mut(&mut self, id: CommunityId) -> Result<&mut Community> {
        self.communities
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(ClientError::CommunityNotFound(id))
    }

    pub fn post_mut(&mut self, id: PostId) -> Result<&mut Post> {
        self.posts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(ClientError::PostNotFound(id))
    }

    pub fn event_mut(&mut self, id: EventId) -> Result<&mut Event> {
        self.events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(ClientError::EventNotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use wayfarer_shared::types::MessageId;
    use wayfarer_store::DeliveryStatus;

    use super::*;

    #[test]
    fn load_restores_mock_identity_and_reconciles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");

        let me = Profile::mock("nomad");
        let conv = Conversation::direct(me.id.clone(), UserId::from("ana"));
        let ghost = Conversation::direct(me.id.clone(), UserId::from("ghost"));
        let incoming = Message {
            id: MessageId::new(),
            conversation_id: conv.id,
            sender_id: UserId::from("ana"),
            content: "hola".into(),
            timestamp: Utc::now(),
            read: false,
            status: DeliveryStatus::Delivered,
        };
        let orphan = Message {
            id: MessageId::new(),
            conversation_id: ghost.id,
            ..incoming.clone()
        };

        {
            let db = Database::open_at(&path).unwrap();
            db.save(StorageKey::MockUser, &me).unwrap();
            db.save(StorageKey::Conversations, &vec![conv.clone()]).unwrap();
            db.save(StorageKey::Messages, &vec![incoming.clone(), orphan]).unwrap();
        }

        let state = AppState::load(Database::open_at(&path).unwrap()).unwrap();
        assert_eq!(state.session, Session::Mock(me));
        assert_eq!(state.messages, vec![incoming.clone()]);
        assert_eq!(state.conversations[0].unread_count, 1);
        assert_eq!(state.conversations[0].last_message, Some(incoming));

        // the orphan is gone from disk too
        let on_disk: Vec<Message> = state.database.load(StorageKey::Messages).unwrap().unwrap();
        assert_eq!(on_disk.len(), 1);
    }

    #[test]
    fn signed_out_mock_identity_is_not_restored() {
        let db = Database::open_in_memory().unwrap();
        db.save(StorageKey::MockUser, &Profile::mock("nomad")).unwrap();
        db.save(StorageKey::MockActive, &false).unwrap();

        let mut state = AppState::load(db).unwrap();
        assert_eq!(state.session, Session::Anonymous);
        assert!(!state.restore_session());

        state.database.save(StorageKey::MockActive, &true).unwrap();
        assert!(state.restore_session());
        assert!(state.session.is_mock());
    }

    #[test]
    fn anonymous_state_has_no_user() {
        let state = AppState::new(Database::open_in_memory().unwrap());
        assert!(matches!(state.current_user(), Err(ClientError::NotSignedIn)));
    }
}
