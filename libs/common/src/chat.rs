//! Canonical chat message record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The post-persistence shape of a chat message, carried in
/// `receiveMessage` events. `user_name` is the sender's display name at
/// send time, denormalized so receivers can render without a user lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessageRecord {
    pub id: i64,
    pub project_id: String,
    pub user_id: String,
    pub user_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessageRecord {
    /// Literal mention test: does the content contain `@<display_name>`?
    pub fn mentions(&self, display_name: &str) -> bool {
        self.content.contains(&format!("@{display_name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn msg(content: &str) -> ChatMessageRecord {
        ChatMessageRecord {
            id: 1,
            project_id: "prj_1".to_string(),
            user_id: "usr_bob".to_string(),
            user_name: "Bob".to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn mention_is_a_literal_substring_test() {
        assert!(msg("hi @Alice").mentions("Alice"));
        assert!(msg("ping @Alice!").mentions("Alice"));
        assert!(!msg("hi alice").mentions("Alice"));
        // Prefix collisions are inherent to the literal rule.
        assert!(msg("hi @Alicette").mentions("Alice"));
    }
}
