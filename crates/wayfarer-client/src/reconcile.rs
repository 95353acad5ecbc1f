//! Derivation of per-conversation `unread_count` and `last_message`.
//!
//! The message list is the only source of truth; these two fields are caches
//! of it.  [`reconcile`] recomputes them in one pass over the messages and
//! touches only the conversations whose derived values actually changed.

use std::collections::{HashMap, HashSet};

use wayfarer_shared::types::{ConversationId, MessageId, UserId};
use wayfarer_store::{Conversation, Message};

#[derive(Default)]
struct Derived<'a> {
    unread: u32,
    last: Option<&'a Message>,
}

/// Recompute derived fields and return the ids of conversations that changed.
///
/// Unread = messages with `read == false` not sent by `local_user`.  Last
/// message = greatest timestamp; on equal timestamps the message that comes
/// later in `messages` wins.
pub fn reconcile(
    conversations: &mut [Conversation],
    messages: &[Message],
    local_user: &UserId,
) -> Vec<ConversationId> {
    let mut derived: HashMap<ConversationId, Derived<'_>> = HashMap::new();

    for msg in messages {
        let entry = derived.entry(msg.conversation_id).or_default();
        if !msg.read && &msg.sender_id != local_user {
            entry.unread += 1;
        }
        let newer = entry
            .last
            .map_or(true, |best| msg.timestamp >= best.timestamp);
        if newer {
            entry.last = Some(msg);
        }
    }

    let mut changed = Vec::new();
    for conv in conversations.iter_mut() {
        let d = derived.remove(&conv.id).unwrap_or_default();

        let unread_changed = conv.unread_count != d.unread;
        let last_changed = conv.last_message.as_ref() != d.last;

        if unread_changed {
            conv.unread_count = d.unread;
        }
        if last_changed {
            conv.last_message = d.last.cloned();
        }
        if unread_changed || last_changed {
            changed.push(conv.id);
        }
    }

    changed
}

/// Messages whose conversation does not exist.
pub fn orphaned_messages(conversations: &[Conversation], messages: &[Message]) -> Vec<MessageId> {
    let known: HashSet<ConversationId> = conversations.iter().map(|c| c.id).collect();
    messages
        .iter()
        .filter(|m| !known.contains(&m.conversation_id))
        .map(|m| m.id)
        .collect()
}

pub fn total_unread(conversations: &[Conversation]) -> u32 {
    conversations
        .iter()
        .fold(0u32, |acc, c| acc.saturating_add(c.unread_count))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use wayfarer_store::DeliveryStatus;

    use super::*;

    fn me() -> UserId {
        UserId::from("me")
    }

    fn msg(conv: &Conversation, from: &str, secs: i64, read: bool) -> Message {
        Message {
            id: MessageId::new(),
            conversation_id: conv.id,
            sender_id: UserId::from(from),
            content: format!("{from}@{secs}"),
            timestamp: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(secs),
            read,
            status: DeliveryStatus::Sent,
        }
    }

    fn brute_force_unread(conv: &Conversation, messages: &[Message]) -> u32 {
        messages
            .iter()
            .filter(|m| m.conversation_id == conv.id && !m.read && m.sender_id != me())
            .count() as u32
    }

    #[test]
    fn unread_excludes_own_and_read_messages() {
        let mut convs = vec![Conversation::direct(me(), UserId::from("ana"))];
        let messages = vec![
            msg(&convs[0], "ana", 1, false),
            msg(&convs[0], "ana", 2, true),
            msg(&convs[0], "me", 3, false),
            msg(&convs[0], "ana", 4, false),
        ];

        let changed = reconcile(&mut convs, &messages, &me());
        assert_eq!(changed, vec![convs[0].id]);
        assert_eq!(convs[0].unread_count, 2);
        assert_eq!(convs[0].unread_count, brute_force_unread(&convs[0], &messages));
    }

    #[test]
    fn last_message_is_latest_by_timestamp_not_position() {
        let mut convs = vec![Conversation::direct(me(), UserId::from("ana"))];
        let messages = vec![
            msg(&convs[0], "ana", 50, false),
            msg(&convs[0], "me", 10, false),
            msg(&convs[0], "ana", 30, false),
        ];

        reconcile(&mut convs, &messages, &me());
        assert_eq!(convs[0].last_message.as_ref().unwrap().id, messages[0].id);
    }

    #[test]
    fn timestamp_ties_go_to_the_later_message() {
        let mut convs = vec![Conversation::direct(me(), UserId::from("ana"))];
        let messages = vec![
            msg(&convs[0], "ana", 5, false),
            msg(&convs[0], "me", 5, false),
        ];

        reconcile(&mut convs, &messages, &me());
        assert_eq!(convs[0].last_message.as_ref().unwrap().id, messages[1].id);
    }

    #[test]
    fn only_affected_conversations_are_reported() {
        let mut convs = vec![
            Conversation::direct(me(), UserId::from("ana")),
            Conversation::direct(me(), UserId::from("ben")),
        ];
        let mut messages = vec![
            msg(&convs[0], "ana", 1, false),
            msg(&convs[1], "ben", 2, false),
        ];
        reconcile(&mut convs, &messages, &me());

        // second pass with nothing new changes nothing
        assert!(reconcile(&mut convs, &messages, &me()).is_empty());

        messages.push(msg(&convs[1], "ben", 3, false));
        let changed = reconcile(&mut convs, &messages, &me());
        assert_eq!(changed, vec![convs[1].id]);
        assert_eq!(convs[1].unread_count, 2);
        assert_eq!(convs[0].unread_count, 1);
    }

    #[test]
    fn marking_read_refreshes_last_message_copy() {
        let mut convs = vec![Conversation::direct(me(), UserId::from("ana"))];
        let mut messages = vec![msg(&convs[0], "ana", 1, false)];
        reconcile(&mut convs, &messages, &me());

        messages[0].read = true;
        let changed = reconcile(&mut convs, &messages, &me());
        assert_eq!(changed, vec![convs[0].id]);
        assert_eq!(convs[0].unread_count, 0);
        assert!(convs[0].last_message.as_ref().unwrap().read);
    }

    #[test]
    fn empty_conversation_is_cleared() {
        let mut conv = Conversation::direct(me(), UserId::from("ana"));
        conv.unread_count = 3;
        conv.last_message = Some(msg(&conv, "ana", 1, false));
        let mut convs = vec![conv];

        let changed = reconcile(&mut convs, &[], &me());
        assert_eq!(changed.len(), 1);
        assert_eq!(convs[0].unread_count, 0);
        assert!(convs[0].last_message.is_none());
    }

    #[test]
    fn matches_brute_force_on_mixed_input() {
        let mut convs: Vec<Conversation> = ["ana", "ben", "cy"]
            .iter()
            .map(|u| Conversation::direct(me(), UserId::from(*u)))
            .collect();

        let mut messages = Vec::new();
        for i in 0..60i64 {
            let conv = &convs[(i % 3) as usize];
            let from = if i % 4 == 0 { "me" } else { "other" };
            messages.push(msg(conv, from, (i * 7) % 23, i % 5 == 0));
        }

        reconcile(&mut convs, &messages, &me());
        for conv in &convs {
            assert_eq!(conv.unread_count, brute_force_unread(conv, &messages));
            let max_ts = messages
                .iter()
                .filter(|m| m.conversation_id == conv.id)
                .map(|m| m.timestamp)
                .max();
            assert_eq!(conv.last_message.as_ref().map(|m| m.timestamp), max_ts);
        }
        assert_eq!(
            total_unread(&convs),
            convs.iter().map(|c| c.unread_count).sum::<u32>()
        );
    }

    #[test]
    fn orphans_are_detected() {
        let convs = vec![Conversation::direct(me(), UserId::from("ana"))];
        let ghost = Conversation::direct(me(), UserId::from("ghost"));
        let messages = vec![msg(&convs[0], "ana", 1, false), msg(&ghost, "ghost", 2, false)];

        assert_eq!(orphaned_messages(&convs, &messages), vec![messages[1].id]);
    }
}
