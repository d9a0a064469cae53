#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

use chrono::Utc;
use serde_derive::Deserialize;
use serde_derive::Serialize;

use super::ChatItem;
use super::ChatRole;
use super::ContentCategory;

pub const UNTITLED: &str = "Untitled";

/// The local, editable working copy of a conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub category: ContentCategory,
    pub chats: Vec<ChatItem>,
    pub title: String,
    pub nonce: i64,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl Session {
    pub fn new(id: &str, category: ContentCategory) -> Session {
        return Session {
            id: id.to_string(),
            category,
            chats: vec![],
            title: UNTITLED.to_string(),
            nonce: Utc::now().timestamp_millis(),
            completed: false,
            summary: None,
        };
    }

    pub fn chat(&self, id: &str) -> Option<&ChatItem> {
        return self.chats.iter().find(|e| return e.id == id);
    }

    pub fn chat_mut(&mut self, id: &str) -> Option<&mut ChatItem> {
        return self.chats.iter_mut().find(|e| return e.id == id);
    }

    /// Appends a streamed title chunk. The placeholder title is dropped
    /// before the first chunk lands.
    pub fn append_title(&mut self, chunk: &str) {
        if self.title.eq_ignore_ascii_case(UNTITLED) {
            self.title.clear();
        }
        self.title += chunk;
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMetadata {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub transcript: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionChatItem {
    #[serde(default)]
    pub id: String,
    pub role: ChatRole,
    pub content: String,
}

impl From<&ChatItem> for SessionChatItem {
    fn from(item: &ChatItem) -> SessionChatItem {
        return SessionChatItem {
            id: item.id.to_string(),
            role: item.role,
            content: item.content.to_string(),
        };
    }
}

/// Server-side mirror of a session. Read-only on the client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionModel {
    pub id: String,
    pub category: ContentCategory,
    #[serde(default)]
    pub chats: Vec<SessionChatItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ChatMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl SessionModel {
    pub fn is_completed(&self) -> bool {
        return self.completed.unwrap_or(false);
    }

    pub fn title(&self) -> Option<&str> {
        return self
            .metadata
            .as_ref()
            .and_then(|metadata| return metadata.title.as_deref());
    }
}
