//! Conversation types.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Speaker label used when a dialogue is quoted inside a prompt.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "使用者",
            Role::Assistant => "助理",
        }
    }
}

/// One message in the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// A generated answer and the location lines that were prepended to it.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    pub locations: Vec<String>,
    pub attempts: u32,
}
