//! Conversation state.
//!
//! The message log is an append-only, chronological record of turns. It does
//! no I/O; the session owns the single instance for the lifetime of the
//! process.

use serde::{Deserialize, Serialize};

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered record of the conversation so far.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    turns: Vec<Turn>,
}

impl MessageLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a log seeded with a single system turn.
    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::system(prompt)],
        }
    }

    /// Add a turn at the end of the log.
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Content of the first system turn, or an empty string.
    ///
    /// Later system turns stay in the log but are never used as the prompt.
    pub fn system_prompt(&self) -> &str {
        self.turns
            .iter()
            .find(|t| t.role == Role::System)
            .map(|t| t.content.as_str())
            .unwrap_or("")
    }

    /// The last `n` non-system turns, oldest first.
    pub fn recent_turns(&self, n: usize) -> Vec<&Turn> {
        let mut recent: Vec<&Turn> = self
            .turns
            .iter()
            .rev()
            .filter(|t| t.role != Role::System)
            .take(n)
            .collect();
        recent.reverse();
        recent
    }

    /// Content of the most recent assistant turn, if any.
    pub fn last_assistant(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == Role::Assistant)
            .map(|t| t.content.as_str())
    }

    #[cfg(test)]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mixed_log() -> MessageLog {
        let mut log = MessageLog::with_system_prompt("be brief");
        log.append(Turn::user("one"));
        log.append(Turn::assistant("two"));
        log.append(Turn::system("late notice"));
        log.append(Turn::user("three"));
        log
    }

    #[test]
    fn test_system_prompt_uses_first_system_turn() {
        let log = mixed_log();
        assert_eq!(log.system_prompt(), "be brief");
    }

    #[test]
    fn test_system_prompt_empty_without_system_turn() {
        let mut log = MessageLog::new();
        log.append(Turn::user("hi"));
        assert_eq!(log.system_prompt(), "");
    }

    #[test]
    fn test_recent_turns_skips_system_and_keeps_order() {
        let log = mixed_log();
        let recent = log.recent_turns(10);
        let contents: Vec<_> = recent.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
        assert!(recent.iter().all(|t| t.role != Role::System));
    }

    #[test]
    fn test_recent_turns_is_bounded() {
        let log = mixed_log();
        let recent = log.recent_turns(2);
        let contents: Vec<_> = recent.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["two", "three"]);
        assert!(log.recent_turns(0).is_empty());
    }

    #[test]
    fn test_append_never_drops_system_turns() {
        let log = mixed_log();
        assert_eq!(log.len(), 5);
        assert_eq!(
            log.turns().iter().filter(|t| t.role == Role::System).count(),
            2
        );
    }

    #[test]
    fn test_last_assistant() {
        let mut log = MessageLog::new();
        assert!(log.last_assistant().is_none());
        log.append(Turn::assistant("first"));
        log.append(Turn::user("again"));
        log.append(Turn::assistant("second"));
        assert_eq!(log.last_assistant(), Some("second"));
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Turn::assistant("ok")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"ok"}"#);
    }
}
