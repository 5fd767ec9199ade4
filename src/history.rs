//! History adapter: local transcript → Gemini `contents` turns.
//!
//! The full transcript is replayed on every call. Nothing is filtered,
//! merged or truncated here.

use crate::message::{ChatTurn, Message, Role};

/// Map every message to a remote turn, preserving order.
pub fn adapt(messages: &[Message]) -> Vec<ChatTurn> {
    messages
        .iter()
        .map(|m| ChatTurn {
            role: m.role.remote(),
            text: m.content.clone(),
        })
        .collect()
}

/// Split off a trailing, not-yet-answered user message.
///
/// The pending message is sent as the new input and must not also appear
/// in the replayed history.
pub fn split_pending(messages: &[Message]) -> (&[Message], Option<&Message>) {
    match messages.split_last() {
        Some((last, rest)) if last.role == Role::User => (rest, Some(last)),
        _ => (messages, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::RemoteRole;

    fn transcript(roles: &[Role]) -> Vec<Message> {
        roles
            .iter()
            .enumerate()
            .map(|(i, role)| match role {
                Role::User => Message::user(format!("u{i}")),
                Role::Assistant => Message::assistant(format!("a{i}")),
            })
            .collect()
    }

    #[test]
    fn test_empty_history() {
        assert!(adapt(&[]).is_empty());
        let (history, pending) = split_pending(&[]);
        assert!(history.is_empty());
        assert!(pending.is_none());
    }

    #[test]
    fn test_adapt_preserves_order_and_maps_roles() {
        let messages = transcript(&[Role::User, Role::Assistant, Role::User]);
        let turns = adapt(&messages);
        assert_eq!(
            turns,
            vec![
                ChatTurn { role: RemoteRole::User, text: "u0".into() },
                ChatTurn { role: RemoteRole::Model, text: "a1".into() },
                ChatTurn { role: RemoteRole::User, text: "u2".into() },
            ]
        );
    }

    #[test]
    fn test_pending_user_message_is_excluded() {
        let messages = transcript(&[Role::User, Role::Assistant, Role::User]);
        let (history, pending) = split_pending(&messages);
        assert_eq!(history.len(), 2);
        assert_eq!(pending.map(|m| m.content.as_str()), Some("u2"));
        assert!(adapt(history).iter().all(|t| t.text != "u2"));
    }

    #[test]
    fn test_answered_history_has_no_pending() {
        let messages = transcript(&[Role::User, Role::Assistant]);
        let (history, pending) = split_pending(&messages);
        assert_eq!(history.len(), 2);
        assert!(pending.is_none());
    }

    #[test]
    fn test_length_property_over_role_sequences() {
        // Every role sequence up to length 6.
        for len in 0..=6usize {
            for bits in 0..(1u32 << len) {
                let roles: Vec<Role> = (0..len)
                    .map(|i| if bits & (1 << i) == 0 { Role::User } else { Role::Assistant })
                    .collect();
                let messages = transcript(&roles);
                let (history, _) = split_pending(&messages);
                let trailing_user = matches!(roles.last(), Some(Role::User));
                assert_eq!(adapt(history).len(), len - usize::from(trailing_user));
            }
        }
    }
}
