#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;

use chrono::SecondsFormat;
use chrono::Utc;
use serde_derive::Deserialize;
use serde_derive::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// A single entry of a session transcript. Assistant entries start out
/// `loading` with empty content and grow as the response streams in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatItem {
    pub id: String,
    pub role: ChatRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub loading: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl ChatItem {
    pub fn new(id: &str, role: ChatRole, content: &str) -> ChatItem {
        return ChatItem {
            id: id.to_string(),
            role,
            content: content.to_string(),
            loading: false,
            created_at: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        };
    }

    /// An empty assistant entry waiting on its first streamed chunk.
    pub fn pending(id: &str) -> ChatItem {
        let mut item = ChatItem::new(id, ChatRole::Assistant, "");
        item.loading = true;
        return item;
    }

    /// Appends a streamed chunk. The first chunk ends the loading state.
    pub fn append(&mut self, chunk: &str) {
        self.content += chunk;
        self.loading = false;
    }

    /// Shallow merge of the fields present in `update`. A cleared loading
    /// flag is never raised again.
    pub fn merge(&mut self, update: &ChatItemUpdate) {
        if let Some(role) = update.role {
            self.role = role;
        }
        if let Some(content) = &update.content {
            self.content = content.to_string();
        }
        if let Some(loading) = update.loading {
            if !loading || self.loading {
                self.loading = loading;
            }
        }
        if let Some(created_at) = &update.created_at {
            self.created_at = Some(created_at.to_string());
        }
    }
}

/// Partial `ChatItem` keyed by id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChatItemUpdate {
    pub id: String,
    pub role: Option<ChatRole>,
    pub content: Option<String>,
    pub loading: Option<bool>,
    pub created_at: Option<String>,
}

impl ChatItemUpdate {
    pub fn new(id: &str) -> ChatItemUpdate {
        return ChatItemUpdate {
            id: id.to_string(),
            ..ChatItemUpdate::default()
        };
    }

    pub fn content(mut self, content: &str) -> ChatItemUpdate {
        self.content = Some(content.to_string());
        return self;
    }

    pub fn loading(mut self, loading: bool) -> ChatItemUpdate {
        self.loading = Some(loading);
        return self;
    }

    pub fn role(mut self, role: ChatRole) -> ChatItemUpdate {
        self.role = Some(role);
        return self;
    }
}
