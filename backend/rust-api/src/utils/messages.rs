use crate::models::{ChatMessage, Role};

/// Number of non-system turns forwarded upstream per request.
pub const HISTORY_LIMIT: usize = 7;

/// Apply the sliding conversation window: system messages are always kept
/// (in order, ahead of the rest), everything else is cut down to the last
/// `limit` turns.
pub fn trim_history(messages: &[ChatMessage], limit: usize) -> Vec<ChatMessage> {
    let (system, other): (Vec<&ChatMessage>, Vec<&ChatMessage>) =
        messages.iter().partition(|m| m.role == Role::System);

    let start = other.len().saturating_sub(limit);

    system
        .into_iter()
        .chain(other.into_iter().skip(start))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(role: Role, content: &str) -> ChatMessage {
        ChatMessage {
            role,
            content: content.to_string(),
        }
    }

    #[test]
    fn short_history_is_untouched() {
        let messages = vec![msg(Role::User, "hola"), msg(Role::Assistant, "hola!")];
        assert_eq!(trim_history(&messages, HISTORY_LIMIT), messages);
    }

    #[test]
    fn keeps_only_last_n_non_system_turns() {
        let mut messages = Vec::new();
        for i in 0..10 {
            messages.push(msg(Role::User, &format!("turno {i}")));
        }

        let trimmed = trim_history(&messages, 7);
        assert_eq!(trimmed.len(), 7);
        assert_eq!(trimmed[0].content, "turno 3");
        assert_eq!(trimmed[6].content, "turno 9");
    }

    #[test]
    fn system_messages_survive_trimming() {
        let mut messages = vec![msg(Role::System, "persona")];
        for i in 0..10 {
            messages.push(msg(Role::User, &format!("turno {i}")));
        }
        messages.push(msg(Role::System, "recordatorio"));

        let trimmed = trim_history(&messages, 7);
        assert_eq!(trimmed.len(), 9);
        assert_eq!(trimmed[0].content, "persona");
        assert_eq!(trimmed[1].content, "recordatorio");
        assert_eq!(trimmed[2].content, "turno 3");
    }
}
