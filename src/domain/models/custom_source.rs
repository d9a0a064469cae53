#[cfg(test)]
#[path = "custom_source_test.rs"]
mod tests;

use serde_derive::Deserialize;
use serde_derive::Serialize;

/// Where a source came from. The tag decides which companion fields exist.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source_type")]
pub enum SourceKind {
    #[serde(rename = "link")]
    Link { url: String },
    #[serde(rename = "copy/paste")]
    CopyPaste,
    #[serde(rename = "file_upload")]
    FileUpload,
    #[serde(other)]
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    #[serde(rename = "text/plain")]
    TextPlain,
    #[serde(rename = "text/html")]
    TextHtml,
    #[serde(rename = "application/pdf")]
    Pdf,
    #[serde(rename = "application/vnd.openxmlformats-officedocument.wordprocessingml.document")]
    Docx,
}

/// Material a user attached to a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomSource {
    pub id: String,
    #[serde(flatten)]
    pub kind: SourceKind,
    pub content_type: ContentType,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl CustomSource {
    pub fn copy_paste(id: &str, text: &str) -> CustomSource {
        return CustomSource {
            id: id.to_string(),
            kind: SourceKind::CopyPaste,
            content_type: ContentType::TextPlain,
            content: text.to_string(),
            title: None,
            created_at: None,
            session_id: None,
        };
    }

    pub fn url(&self) -> Option<&str> {
        match &self.kind {
            SourceKind::Link { url } => return Some(url),
            _ => return None,
        }
    }

    /// Whether the source is visible to `session_id`. Sources written before
    /// ownership was recorded belong to whichever session they are stored under.
    pub fn belongs_to(&self, session_id: &str) -> bool {
        return self
            .session_id
            .as_deref()
            .map_or(true, |owner| return owner == session_id);
    }
}

/// Extracted content as returned by the source endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceContent {
    pub id: String,
    pub content: String,
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}
