use chrono::Utc;
use tracing::{debug, info, warn};

use wayfarer_shared::types::{ConversationId, MessageId, UserId};
use wayfarer_shared::validation::{require_title, validate_content};
use wayfarer_shared::ValidationError;
use wayfarer_store::{Conversation, DeliveryStatus, Message, StorageKey};

use crate::client::Client;
use crate::error::{ClientError, Result};
use crate::events::ClientEvent;
use crate::state::AppState;

impl Client {
    /// Send a direct message, opening the conversation with `recipient` if
    /// there is none yet.
    pub fn send_message(&self, recipient: &UserId, content: &str) -> Result<Message> {
        validate_content(content)?;

        let (message, changed, total) = {
            let mut state = self.lock()?;
            let me = state.current_user()?;
            if recipient == &me {
                return Err(ClientError::Forbidden("cannot message yourself"));
            }

            let existing = state
                .conversations
                .iter()
                .find(|c| c.is_direct_between(&me, recipient))
                .map(|c| c.id);
            let (conversation_id, opened) = match existing {
                Some(id) => (id, None),
                None => {
                    let conversation = Conversation::direct(me.clone(), recipient.clone());
                    let id = conversation.id;
                    state.conversations.push(conversation);
                    (id, Some(id))
                }
            };

            let message = outgoing(conversation_id, me, content);
            let changed = append_message(&mut state, message.clone(), opened)?;
            if opened.is_some() {
                info!(conversation = %conversation_id, with = %recipient, "opened direct conversation");
            }
            (message, changed, state.total_unread())
        };

        self.publish_conversations(changed, total);
        Ok(message)
    }

    /// Post into an existing conversation (direct or group).
    pub fn send_to_conversation(&self, conversation_id: ConversationId, content: &str) -> Result<Message> {
        validate_content(content)?;

        let (message, changed, total) = {
            let mut state = self.lock()?;
            let me = state.current_user()?;
            if !state.conversation(conversation_id)?.has_participant(&me) {
                return Err(ClientError::Forbidden("not a participant of this conversation"));
            }
            let message = outgoing(conversation_id, me, content);
            let changed = append_message(&mut state, message.clone(), None)?;
            (message, changed, state.total_unread())
        };

        self.publish_conversations(changed, total);
        Ok(message)
    }

    /// Create a named group thread.  The local user is always a participant.
    pub fn create_group(&self, name: &str, participants: &[UserId]) -> Result<Conversation> {
        require_title(name)?;

        let conversation = {
            let mut state = self.lock()?;
            let me = state.current_user()?;

            let mut members = vec![me.clone()];
            for user in participants {
                if !members.contains(user) {
                    members.push(user.clone());
                }
            }
            if members.len() < 2 {
                return Err(ValidationError::NoParticipants.into());
            }

            let conversation = Conversation::group(name.trim().to_string(), members);
            state.conversations.push(conversation.clone());
            if let Err(e) = state.persist(StorageKey::Conversations) {
                state.conversations.retain(|c| c.id != conversation.id);
                return Err(e);
            }
            conversation
        };

        info!(conversation = %conversation.id, members = conversation.participants.len(), "created group");
        self.emit(ClientEvent::ConversationsChanged {
            ids: vec![conversation.id],
        });
        Ok(conversation)
    }

    /// Accept an incoming message.  Duplicates (same id) are ignored.
    pub fn receive_message(&self, message: Message) -> Result<()> {
        let (changed, total) = {
            let mut state = self.lock()?;
            state.conversation(message.conversation_id)?;
            if state.messages.iter().any(|m| m.id == message.id) {
                debug!(message = %message.id, "duplicate message ignored");
                return Ok(());
            }
            let changed = append_message(&mut state, message, None)?;
            (changed, state.total_unread())
        };

        self.publish_conversations(changed, total);
        Ok(())
    }

    /// Mark every incoming message of a conversation as read.
    ///
    /// Returns how many messages changed.
    pub fn mark_conversation_read(&self, conversation_id: ConversationId) -> Result<usize> {
        let (flipped, changed, total) = {
            let mut state = self.lock()?;
            let me = state.current_user()?;
            state.conversation(conversation_id)?;

            let mut previous = Vec::new();
            for m in state
                .messages
                .iter_mut()
                .filter(|m| m.conversation_id == conversation_id && m.sender_id != me && !m.read)
            {
                previous.push((m.id, m.status));
                m.read = true;
                m.status = DeliveryStatus::Read;
            }
            if previous.is_empty() {
                return Ok(0);
            }

            let changed = state.reconcile_conversations();
            if let Err(e) = persist_messages(&state) {
                for m in state.messages.iter_mut() {
                    if let Some((_, status)) = previous.iter().find(|(id, _)| *id == m.id) {
                        m.read = false;
                        m.status = *status;
                    }
                }
                state.reconcile_conversations();
                return Err(e);
            }
            (previous.len(), changed, state.total_unread())
        };

        debug!(conversation = %conversation_id, flipped, "conversation marked read");
        self.publish_conversations(changed, total);
        Ok(flipped)
    }

    /// Typing indicators are transient and not persisted.
    pub fn set_typing(&self, conversation_id: ConversationId, user: &UserId, typing: bool) -> Result<()> {
        {
            let mut state = self.lock()?;
            let conversation = state.conversation_mut(conversation_id)?;
            match conversation.participant_mut(user) {
                Some(p) if p.is_typing != typing => p.is_typing = typing,
                Some(_) => return Ok(()),
                None => {
                    debug!(conversation = %conversation_id, %user, "typing from non-participant ignored");
                    return Ok(());
                }
            }
        }

        self.emit(ClientEvent::ConversationsChanged {
            ids: vec![conversation_id],
        });
        Ok(())
    }

    /// Update `user`'s online flag in every conversation they take part in.
    pub fn set_presence(&self, user: &UserId, online: bool) -> Result<()> {
        let changed: Vec<ConversationId> = {
            let mut state = self.lock()?;
            state
                .conversations
                .iter_mut()
                .filter_map(|c| {
                    let p = c.participant_mut(user)?;
                    if p.is_online == online {
                        return None;
                    }
                    p.is_online = online;
                    Some(c.id)
                })
                .collect()
        };

        if !changed.is_empty() {
            self.emit(ClientEvent::ConversationsChanged { ids: changed });
        }
        Ok(())
    }

    pub fn total_unread(&self) -> Result<u32> {
        self.read(AppState::total_unread)
    }

    /// Conversations, most recent activity first.
    pub fn conversations(&self) -> Result<Vec<Conversation>> {
        self.read(|s| {
            let mut list = s.conversations.clone();
            list.sort_by_key(|c| {
                std::cmp::Reverse(c.last_message.as_ref().map_or(c.created_at, |m| m.timestamp))
            });
            list
        })
    }

    /// Messages of one conversation in chronological order.
    pub fn messages(&self, conversation_id: ConversationId) -> Result<Vec<Message>> {
        self.read(|s| {
            let mut list: Vec<Message> = s
                .messages
                .iter()
                .filter(|m| m.conversation_id == conversation_id)
                .cloned()
                .collect();
            list.sort_by_key(|m| m.timestamp);
            list
        })
    }

    fn publish_conversations(&self, changed: Vec<ConversationId>, total: u32) {
        if changed.is_empty() {
            return;
        }
        self.emit(ClientEvent::ConversationsChanged { ids: changed });
        self.emit(ClientEvent::TotalUnreadChanged { total });
    }
}

fn outgoing(conversation_id: ConversationId, sender_id: UserId, content: &str) -> Message {
    Message {
        id: MessageId::new(),
        conversation_id,
        sender_id,
        content: content.to_string(),
        timestamp: Utc::now(),
        read: true,
        status: DeliveryStatus::Sent,
    }
}

/// Append, re-derive conversation summaries and persist.
///
/// If the write fails the message is dropped again, along with the
/// conversation `opened` for it, and the summaries are re-derived.
fn append_message(
    state: &mut AppState,
    message: Message,
    opened: Option<ConversationId>,
) -> Result<Vec<ConversationId>> {
    let id = message.id;
    state.messages.push(message);
    let changed = state.reconcile_conversations();
    if let Err(e) = persist_messages(state) {
        state.messages.retain(|m| m.id != id);
        if let Some(opened) = opened {
            state.conversations.retain(|c| c.id != opened);
        }
        state.reconcile_conversations();
        if let Err(e) = persist_messages(state) {
            warn!(error = %e, "could not restore stored messages");
        }
        return Err(e);
    }
    Ok(changed)
}

fn persist_messages(state: &AppState) -> Result<()> {
    state.persist(StorageKey::Conversations)?;
    state.persist(StorageKey::Messages)
}
