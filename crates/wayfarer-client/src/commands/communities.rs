use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use wayfarer_shared::types::{CommunityId, UserId};
use wayfarer_shared::validation::require_title;
use wayfarer_store::{
    AccessPolicy, Community, MemberRole, Membership, MembershipStatus, StorageKey,
};

use crate::client::Client;
use crate::error::{ClientError, Result};
use crate::events::ClientEvent;
use crate::state::AppState;

/// Form input for a new community.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    pub image_url: Option<String>,
    pub access: AccessPolicy,
}

impl Client {
    /// Create a community; the creator becomes its first admin.
    pub async fn create_community(&self, draft: CommunityDraft) -> Result<Community> {
        require_title(&draft.name)?;

        let me = self.read(|s| s.current_user())??;
        let now = Utc::now();
        let community = Community {
            id: CommunityId::new(),
            name: draft.name.trim().to_string(),
            description: draft.description,
            category: draft.category,
            image_url: draft.image_url,
            access: draft.access,
            creator_id: me.clone(),
            members: vec![Membership {
                user_id: me,
                status: MembershipStatus::Approved,
                role: MemberRole::Admin,
                joined_at: now,
            }],
            created_at: now,
        };
        let id = community.id;

        self.optimistic(
            "create-community",
            StorageKey::Communities,
            |state| {
                state.communities.push(community.clone());
                Ok(((), community.clone()))
            },
            |remote, community| async move { remote.upsert_community(&community).await },
            |state, ()| {
                state.communities.retain(|c| c.id != id);
                Ok(())
            },
        )
        .await?;

        info!(community = %id, name = %community.name, "community created");
        self.emit(ClientEvent::CommunityChanged { id });
        Ok(community)
    }

    /// Join an open community, or ask to join a request-only one.
    ///
    /// Joining again while approved or pending changes nothing.  A declined
    /// user may ask again.
    pub async fn join(&self, id: CommunityId) -> Result<MembershipStatus> {
        let me = self.read(|s| s.current_user())??;

        let mut outcome = MembershipStatus::Pending;
        let mut wrote = false;
        let result = self
            .optimistic(
                "join",
                StorageKey::Communities,
                |state| {
                    let community = state.community(id)?;
                    let previous = community.membership(&me).cloned();
                    if let Some(m) = previous.as_ref().filter(|m| m.status != MembershipStatus::Declined) {
                        outcome = m.status;
                        return Ok((previous, None));
                    }

                    let status = match community.access {
                        AccessPolicy::Open => MembershipStatus::Approved,
                        AccessPolicy::Request => MembershipStatus::Pending,
                    };
                    let membership = Membership {
                        user_id: me.clone(),
                        status,
                        role: MemberRole::Member,
                        joined_at: Utc::now(),
                    };
                    set_membership(state, id, &me, Some(membership.clone()))?;
                    outcome = status;
                    wrote = true;
                    Ok((previous, Some(membership)))
                },
                |remote, membership| async move {
                    match membership {
                        Some(m) => remote.upsert_member(&id, &m).await,
                        None => Ok(()),
                    }
                },
                |state, previous| set_membership(state, id, &me, previous),
            )
            .await;

        if wrote && Client::settled(&result) {
            self.emit(ClientEvent::CommunityChanged { id });
        }
        result?;
        info!(community = %id, status = ?outcome, "joined community");
        Ok(outcome)
    }

    /// Leave a community.  The last remaining admin cannot leave.
    pub async fn leave(&self, id: CommunityId) -> Result<()> {
        let me = self.read(|s| s.current_user())??;

        let result = self
            .optimistic(
                "leave",
                StorageKey::Communities,
                |state| {
                    let community = state.community(id)?;
                    let previous = community
                        .membership(&me)
                        .cloned()
                        .ok_or_else(|| ClientError::NotAMember { user: me.clone() })?;
                    if community.is_admin(&me) && community.admin_count() == 1 {
                        return Err(ClientError::Forbidden("the last admin cannot leave"));
                    }
                    set_membership(state, id, &me, None)?;
                    Ok((previous, me.clone()))
                },
                |remote, user| async move { remote.delete_member(&id, &user).await },
                |state, previous| set_membership(state, id, &me, Some(previous)),
            )
            .await;

        if Client::settled(&result) {
            self.emit(ClientEvent::CommunityChanged { id });
        }
        result?;
        info!(community = %id, "left community");
        Ok(())
    }

    /// Accept a pending join request.  Admins only.
    pub async fn approve(&self, id: CommunityId, user: &UserId) -> Result<()> {
        self.moderate(id, user, "approve", MembershipStatus::Approved).await
    }

    /// Refuse a pending join request.  Admins only.
    pub async fn decline(&self, id: CommunityId, user: &UserId) -> Result<()> {
        self.moderate(id, user, "decline", MembershipStatus::Declined).await
    }

    /// Remove a member.  Admins only.  Neither the creator nor the last
    /// approved admin can be removed; an admin may remove themselves while
    /// another admin remains.
    pub async fn remove_member(&self, id: CommunityId, user: &UserId) -> Result<()> {
        let me = self.read(|s| s.current_user())??;

        let result = self
            .optimistic(
                "remove-member",
                StorageKey::Communities,
                |state| {
                    let community = state.community(id)?;
                    if !community.is_admin(&me) {
                        return Err(ClientError::Forbidden("only admins can remove members"));
                    }
                    if &community.creator_id == user {
                        return Err(ClientError::Forbidden("the creator cannot be removed"));
                    }
                    let previous = community
                        .membership(user)
                        .cloned()
                        .ok_or_else(|| ClientError::NotAMember { user: user.clone() })?;
                    if community.is_admin(user) && community.admin_count() == 1 {
                        return Err(ClientError::Forbidden("the last admin cannot be removed"));
                    }
                    set_membership(state, id, user, None)?;
                    Ok((previous, user.clone()))
                },
                |remote, user| async move { remote.delete_member(&id, &user).await },
                |state, previous| set_membership(state, id, user, Some(previous)),
            )
            .await;

        if Client::settled(&result) {
            self.emit(ClientEvent::CommunityChanged { id });
        }
        result?;
        info!(community = %id, %user, "member removed");
        Ok(())
    }

    /// All communities, refreshed from the backend when it answers.
    pub async fn list_communities(&self) -> Result<Vec<Community>> {
        self.refresh_communities().await?;
        self.read(|s| s.communities.clone())
    }

    pub fn community(&self, id: CommunityId) -> Result<Community> {
        self.read(|s| s.community(id).cloned())?
    }

    /// Open join requests.  Admins only.
    pub fn pending_requests(&self, id: CommunityId) -> Result<Vec<Membership>> {
        self.read(|s| {
            let me = s.current_user()?;
            let community = s.community(id)?;
            if !community.is_admin(&me) {
                return Err(ClientError::Forbidden("only admins can see join requests"));
            }
            Ok(community.pending().cloned().collect())
        })?
    }

    async fn moderate(
        &self,
        id: CommunityId,
        user: &UserId,
        action: &'static str,
        decision: MembershipStatus,
    ) -> Result<()> {
        let me = self.read(|s| s.current_user())??;

        let result = self
            .optimistic(
                action,
                StorageKey::Communities,
                |state| {
                    let community = state.community(id)?;
                    if !community.is_admin(&me) {
                        return Err(ClientError::Forbidden("only admins can review join requests"));
                    }
                    let previous = community
                        .membership(user)
                        .filter(|m| m.status == MembershipStatus::Pending)
                        .cloned()
                        .ok_or_else(|| ClientError::NoPendingRequest { user: user.clone() })?;
                    let updated = Membership {
                        status: decision,
                        ..previous.clone()
                    };
                    set_membership(state, id, user, Some(updated.clone()))?;
                    Ok((previous, updated))
                },
                |remote, updated| async move { remote.upsert_member(&id, &updated).await },
                |state, previous| set_membership(state, id, user, Some(previous)),
            )
            .await;

        if Client::settled(&result) {
            self.emit(ClientEvent::CommunityChanged { id });
        }
        result?;
        info!(community = %id, %user, ?decision, "join request reviewed");
        Ok(())
    }
}

/// Set (or clear) `user`'s membership in place.
fn set_membership(
    state: &mut AppState,
    id: CommunityId,
    user: &UserId,
    membership: Option<Membership>,
) -> Result<()> {
    let community = state.community_mut(id)?;
    let position = community.members.iter().position(|m| &m.user_id == user);
    match (position, membership) {
        (Some(i), Some(m)) => community.members[i] = m,
        (Some(i), None) => {
            community.members.remove(i);
        }
        (None, Some(m)) => community.members.push(m),
        (None, None) => {}
    }
    Ok(())
}
