use serde::{Deserialize, Serialize};
use uuid::Uuid;

// User identity = backend auth id, or a `mock-` prefixed id for local identities
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh identifier for a client-only (mock) identity.
    pub fn new_mock() -> Self {
        Self(format!("{}{}", crate::constants::MOCK_USER_PREFIX, Uuid::new_v4()))
    }

    pub fn is_mock(&self) -> bool {
        self.0.starts_with(crate::constants::MOCK_USER_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_id!(
    /// Direct or group message thread.
    ConversationId
);
uuid_id!(MessageId);
uuid_id!(
    /// Community (group with membership and access policy).
    CommunityId
);
uuid_id!(PostId);
uuid_id!(CommentId);
uuid_id!(EventId);
uuid_id!(ResourceId);
uuid_id!(NotificationId);

/// Trip identifiers come from the trip catalogue, which is not ours.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct TripId(pub String);

impl std::fmt::Display for TripId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TripId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_ids_are_recognised() {
        let id = UserId::new_mock();
        assert!(id.is_mock());
        assert!(!UserId::new("3f1c2a9e-0000-0000-0000-000000000000").is_mock());
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = CommunityId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.0));

        let user: UserId = serde_json::from_str("\"alice\"").unwrap();
        assert_eq!(user, UserId::from("alice"));
    }

    #[test]
    fn short_handles_short_ids() {
        assert_eq!(UserId::from("bob").short(), "bob");
        assert_eq!(UserId::from("0123456789").short(), "01234567");
    }
}
