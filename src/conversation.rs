use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{EMPTY_REPLY_MESSAGE, WELCOME_MESSAGE, WELCOME_TURN_ID};
use crate::provider::WireMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One rendered message of the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurn {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_results: Option<String>,
}

impl ChatTurn {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            image_url: None,
            search_results: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn welcome() -> Self {
        Self {
            id: WELCOME_TURN_ID.to_string(),
            ..Self::assistant(WELCOME_MESSAGE)
        }
    }

    pub fn is_welcome(&self) -> bool {
        self.id == WELCOME_TURN_ID
    }

    fn to_wire(&self) -> WireMessage {
        match self.role {
            Role::User => WireMessage::user(self.content.clone()),
            Role::Assistant => WireMessage::assistant(self.content.clone()),
        }
    }
}

/// What one orchestration cycle produced for the assistant turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_summary: Option<String>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn absorb(&mut self, outcome: ToolOutcome) {
        match outcome {
            ToolOutcome::Search(summary) => self.search_summary = Some(summary),
            ToolOutcome::Image(url) => self.image_url = Some(url),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.image_url.is_none() && self.search_summary.is_none()
    }
}

/// Result of a single tool invocation, folded into a [`Reply`].
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Search(String),
    Image(String),
}

/// Messages to send upstream for `turns`: the welcome turn is dropped.
pub fn outgoing_history(turns: &[ChatTurn]) -> Vec<WireMessage> {
    turns
        .iter()
        .filter(|turn| !turn.is_welcome())
        .map(ChatTurn::to_wire)
        .collect()
}

/// Append-only turn sequence, always opened by the welcome turn.
#[derive(Debug, Clone)]
pub struct Conversation {
    turns: Vec<ChatTurn>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            turns: vec![ChatTurn::welcome()],
        }
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Appends the user's turn and the assistant turn built from `reply`,
    /// returning the latter.
    pub fn record_exchange(&mut self, user_text: &str, reply: Reply) -> &ChatTurn {
        self.turns.push(ChatTurn::user(user_text));

        let content = if reply.is_empty() {
            EMPTY_REPLY_MESSAGE.to_string()
        } else {
            reply.text
        };
        let assistant = ChatTurn {
            image_url: reply.image_url,
            search_results: reply.search_summary,
            ..ChatTurn::assistant(content)
        };
        self.turns.push(assistant);
        &self.turns[self.turns.len() - 1]
    }
}
