//! Domain model structs persisted in local storage.
//!
//! Every struct derives `Serialize` and `Deserialize`: the same JSON shape is
//! written to the local key/value table, exchanged with the remote backend and
//! handed to the UI layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use wayfarer_shared::types::{
    CommentId, CommunityId, ConversationId, EventId, MessageId, NotificationId, PostId,
    ResourceId, UserId,
};

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// A user profile, either from the remote `profiles` table or a local mock.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: UserId,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// Build a client-only profile for offline use.
    pub fn mock(username: &str) -> Self {
        Self {
            id: UserId::new_mock(),
            username: username.to_string(),
            display_name: None,
            avatar_url: None,
            bio: None,
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    Direct,
    Group,
}

/// Per-participant flags shown in the conversation header.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user_id: UserId,
    #[serde(default)]
    pub is_online: bool,
    #[serde(default)]
    pub is_typing: bool,
}

impl Participant {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            is_online: false,
            is_typing: false,
        }
    }
}

/// A direct or group message thread.
///
/// `last_message` and `unread_count` are derived from the message list and
/// recomputed whenever it changes; they are never edited by hand.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: ConversationId,
    pub kind: ConversationKind,
    pub name: Option<String>,
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub last_message: Option<Message>,
    #[serde(default)]
    pub unread_count: u32,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn direct(a: UserId, b: UserId) -> Self {
        Self {
            id: ConversationId::new(),
            kind: ConversationKind::Direct,
            name: None,
            participants: vec![Participant::new(a), Participant::new(b)],
            last_message: None,
            unread_count: 0,
            created_at: Utc::now(),
        }
    }

    pub fn group(name: String, participants: Vec<UserId>) -> Self {
        Self {
            id: ConversationId::new(),
            kind: ConversationKind::Group,
            name: Some(name),
            participants: participants.into_iter().map(Participant::new).collect(),
            last_message: None,
            unread_count: 0,
            created_at: Utc::now(),
        }
    }

    pub fn has_participant(&self, user: &UserId) -> bool {
        self.participants.iter().any(|p| &p.user_id == user)
    }

    pub fn participant_mut(&mut self, user: &UserId) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| &p.user_id == user)
    }

    /// True when this is the one-to-one thread between `a` and `b`.
    pub fn is_direct_between(&self, a: &UserId, b: &UserId) -> bool {
        self.kind == ConversationKind::Direct
            && self.participants.len() == 2
            && self.has_participant(a)
            && self.has_participant(b)
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sending,
    Sent,
    Delivered,
    Read,
    Failed,
}

/// A single chat message.  Only `read` and `status` change after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
    pub status: DeliveryStatus,
}

// ---------------------------------------------------------------------------
// Community
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccessPolicy {
    /// Anyone may join immediately.
    Open,
    /// Joining creates a pending request an admin must approve.
    Request,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    Approved,
    Pending,
    Declined,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Admin,
    Member,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub user_id: UserId,
    pub status: MembershipStatus,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

/// A named group with membership and access-control state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Community {
    pub id: CommunityId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    pub image_url: Option<String>,
    pub access: AccessPolicy,
    pub creator_id: UserId,
    #[serde(default)]
    pub members: Vec<Membership>,
    pub created_at: DateTime<Utc>,
}

impl Community {
    pub fn membership(&self, user: &UserId) -> Option<&Membership> {
        self.members.iter().find(|m| &m.user_id == user)
    }

    pub fn is_admin(&self, user: &UserId) -> bool {
        self.membership(user).is_some_and(|m| {
            m.role == MemberRole::Admin && m.status == MembershipStatus::Approved
        })
    }

    pub fn is_member(&self, user: &UserId) -> bool {
        self.membership(user)
            .is_some_and(|m| m.status == MembershipStatus::Approved)
    }

    pub fn admin_count(&self) -> usize {
        self.members
            .iter()
            .filter(|m| m.role == MemberRole::Admin && m.status == MembershipStatus::Approved)
            .count()
    }

    pub fn pending(&self) -> impl Iterator<Item = &Membership> {
        self.members
            .iter()
            .filter(|m| m.status == MembershipStatus::Pending)
    }
}

// ---------------------------------------------------------------------------
// Feed: posts, comments, events, resources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub author_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    pub community_id: CommunityId,
    pub author_id: UserId,
    pub content: String,
    #[serde(default)]
    pub likes: u32,
    #[serde(default)]
    pub has_liked: bool,
    #[serde(default)]
    pub comments: Vec<Comment>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// Flip the local user's like.  The count never drops below zero.
    pub fn toggle_like(&mut self) {
        if self.has_liked {
            self.has_liked = false;
            self.likes = self.likes.saturating_sub(1);
        } else {
            self.has_liked = true;
            self.likes = self.likes.saturating_add(1);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: EventId,
    pub community_id: CommunityId,
    pub title: String,
    #[serde(default)]
    pub location: String,
    pub starts_at: DateTime<Utc>,
    #[serde(default)]
    pub attendees: Vec<UserId>,
    #[serde(default)]
    pub is_attending: bool,
}

impl Event {
    /// Add or remove `user` from the attendee list.
    pub fn toggle_rsvp(&mut self, user: &UserId) {
        if self.is_attending {
            self.is_attending = false;
            self.attendees.retain(|a| a != user);
        } else {
            self.is_attending = true;
            if !self.attendees.contains(user) {
                self.attendees.push(user.clone());
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: ResourceId,
    pub community_id: CommunityId,
    pub title: String,
    pub url: String,
    pub added_by: UserId,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Message,
    Like,
    Comment,
    JoinRequest,
    RequestApproved,
    Event,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub text: String,
    pub link: Option<String>,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(likes: u32, has_liked: bool) -> Post {
        Post {
            id: PostId::new(),
            community_id: CommunityId::new(),
            author_id: UserId::from("author"),
            content: "hi".into(),
            likes,
            has_liked,
            comments: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn like_toggles_by_one() {
        let mut p = post(4, false);
        p.toggle_like();
        assert!(p.has_liked);
        assert_eq!(p.likes, 5);
        p.toggle_like();
        assert!(!p.has_liked);
        assert_eq!(p.likes, 4);
    }

    #[test]
    fn unlike_never_goes_negative() {
        // inconsistent remote data: liked but zero likes
        let mut p = post(0, true);
        p.toggle_like();
        assert!(!p.has_liked);
        assert_eq!(p.likes, 0);
    }

    #[test]
    fn rsvp_toggles_attendance() {
        let me = UserId::from("me");
        let mut ev = Event {
            id: EventId::new(),
            community_id: CommunityId::new(),
            title: "Sunrise hike".into(),
            location: String::new(),
            starts_at: Utc::now(),
            attendees: vec![UserId::from("other")],
            is_attending: false,
        };
        ev.toggle_rsvp(&me);
        assert!(ev.is_attending);
        assert_eq!(ev.attendees.len(), 2);
        ev.toggle_rsvp(&me);
        assert!(!ev.is_attending);
        assert_eq!(ev.attendees, vec![UserId::from("other")]);
    }

    #[test]
    fn direct_conversation_matches_either_order() {
        let a = UserId::from("a");
        let b = UserId::from("b");
        let c = Conversation::direct(a.clone(), b.clone());
        assert!(c.is_direct_between(&a, &b));
        assert!(c.is_direct_between(&b, &a));
        assert!(!c.is_direct_between(&a, &UserId::from("c")));
    }

    #[test]
    fn community_json_uses_camel_case() {
        let c = Community {
            id: CommunityId::new(),
            name: "Backpackers".into(),
            description: String::new(),
            category: "adventure".into(),
            image_url: None,
            access: AccessPolicy::Request,
            creator_id: UserId::from("me"),
            members: Vec::new(),
            created_at: Utc::now(),
        };
        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(v["access"], "request");
        assert_eq!(v["creatorId"], "me");
        assert!(v.get("imageUrl").is_some());
    }
}
