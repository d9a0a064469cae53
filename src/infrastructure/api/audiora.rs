#[cfg(test)]
#[path = "audiora_test.rs"]
mod tests;

use std::path::Path;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use futures::StreamExt;
use reqwest::multipart::Form;
use reqwest::multipart::Part;
use serde_derive::Deserialize;
use serde_derive::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::ChatItem;
use crate::domain::models::ContentCategory;
use crate::domain::models::SessionChatItem;
use crate::domain::models::SourceContent;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    content_category: ContentCategory,
    chat_item: SessionChatItem,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionTitleRequest {
    category: ContentCategory,
    summary: String,
    session_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CopiedSourceRequest {
    session_id: String,
    text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UrlSourceRequest {
    url: String,
    session_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionRequest {
    session_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateAudiocastRequest {
    session_id: String,
    summary: String,
    category: ContentCategory,
}

/// Decodes a chunked body as UTF-8, holding back a multi-byte character
/// split across chunks until the rest of it arrives.
#[derive(Default)]
struct Utf8Chunks {
    pending: Vec<u8>,
}

impl Utf8Chunks {
    fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let valid_up_to = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            Err(err) => {
                if err.error_len().is_some() {
                    // Invalid bytes, not a split character.
                    let text = String::from_utf8_lossy(&self.pending).to_string();
                    self.pending.clear();
                    return text;
                }
                err.valid_up_to()
            }
        };

        let rest = self.pending.split_off(valid_up_to);
        let text = String::from_utf8_lossy(&self.pending).to_string();
        self.pending = rest;
        return text;
    }

    fn finish(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.pending).to_string();
        self.pending.clear();
        return text;
    }
}

/// Client for the Audiora HTTP API.
pub struct AudioraApi {
    url: String,
    client: reqwest::Client,
}

impl Default for AudioraApi {
    fn default() -> AudioraApi {
        return AudioraApi::new(&Config::get(ConfigKey::ApiURL));
    }
}

impl AudioraApi {
    pub fn new(url: &str) -> AudioraApi {
        return AudioraApi {
            url: url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        };
    }

    pub fn url(&self) -> &str {
        return &self.url;
    }

    async fn check_status(res: reqwest::Response, action: &str) -> Result<reqwest::Response> {
        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            tracing::error!(status, body = %body, "Failed to {action}");
            bail!(format!("Failed to {action}, status {status}"));
        }

        return Ok(res);
    }

    /// Forwards every decoded chunk of a streamed body to `tx`, returning the
    /// full text once the body ends.
    async fn stream_text(
        res: reqwest::Response,
        tx: &mpsc::UnboundedSender<String>,
    ) -> Result<String> {
        let mut decoder = Utf8Chunks::default();
        let mut full_text = String::new();
        let mut stream = res.bytes_stream();

        while let Some(bytes) = stream.next().await {
            let chunk = decoder.push(&bytes?);
            if chunk.is_empty() {
                continue;
            }
            full_text += &chunk;
            tx.send(chunk)?;
        }

        let chunk = decoder.finish();
        if !chunk.is_empty() {
            full_text += &chunk;
            tx.send(chunk)?;
        }

        return Ok(full_text);
    }

    pub async fn health_check(&self) -> Result<()> {
        let res = match self.client.get(&self.url).send().await {
            Ok(res) => res,
            Err(err) => {
                tracing::error!(error = ?err, "Audiora API is not reachable");
                bail!("Audiora API is not reachable at {}", self.url);
            }
        };

        AudioraApi::check_status(res, "health check the Audiora API").await?;
        return Ok(());
    }

    /// Sends a user message and streams the assistant's reply into `tx`.
    pub async fn chat(
        &self,
        session_id: &str,
        category: ContentCategory,
        item: &ChatItem,
        tx: &mpsc::UnboundedSender<String>,
    ) -> Result<String> {
        let req = ChatRequest {
            content_category: category,
            chat_item: SessionChatItem::from(item),
        };

        let res = self
            .client
            .post(format!("{url}/chat/{session_id}", url = self.url))
            .json(&req)
            .send()
            .await?;

        let res = AudioraApi::check_status(res, "send chat message").await?;
        return AudioraApi::stream_text(res, tx).await;
    }

    /// Streams a generated title for the session into `tx`.
    pub async fn session_title(
        &self,
        session_id: &str,
        category: ContentCategory,
        summary: &str,
        tx: &mpsc::UnboundedSender<String>,
    ) -> Result<String> {
        let req = SessionTitleRequest {
            category,
            summary: summary.to_string(),
            session_id: session_id.to_string(),
        };

        let res = self
            .client
            .post(format!("{url}/get-session-title", url = self.url))
            .json(&req)
            .send()
            .await?;

        let res = AudioraApi::check_status(res, "get session title").await?;
        return AudioraApi::stream_text(res, tx).await;
    }

    /// Stores pasted text as a custom source, returning the server's response.
    pub async fn save_copied_source(&self, session_id: &str, text: &str) -> Result<String> {
        let req = CopiedSourceRequest {
            session_id: session_id.to_string(),
            text: text.to_string(),
        };

        let res = self
            .client
            .post(format!("{url}/save-copied-source", url = self.url))
            .json(&req)
            .send()
            .await?;

        let res = AudioraApi::check_status(res, "save copied source").await?;
        return Ok(res.json::<String>().await?);
    }

    /// Stores a local file on the server, returning its public URL. Files the
    /// server already has are not uploaded again.
    pub async fn store_file_upload(
        &self,
        path: &Path,
        filename: &str,
        preserve: bool,
    ) -> Result<String> {
        let form = Form::new()
            .part("file", AudioraApi::file_part(path).await?)
            .text("filename", filename.to_string())
            .text("preserve", preserve.to_string());

        let res = self
            .client
            .post(format!("{url}/store-file-upload", url = self.url))
            .multipart(form)
            .send()
            .await?;

        let res = AudioraApi::check_status(res, "store file upload").await?;
        return Ok(res.json::<String>().await?);
    }

    /// Extracts the text of uploaded files and stores them as custom sources.
    pub async fn save_uploaded_sources(
        &self,
        session_id: &str,
        paths: &[&Path],
    ) -> Result<String> {
        let mut form = Form::new().text("sessionId", session_id.to_string());
        for path in paths {
            form = form.part("files", AudioraApi::file_part(path).await?);
        }

        let res = self
            .client
            .post(format!("{url}/save-uploaded-sources", url = self.url))
            .multipart(form)
            .send()
            .await?;

        let res = AudioraApi::check_status(res, "save uploaded sources").await?;
        return Ok(res.json::<String>().await?);
    }

    async fn file_part(path: &Path) -> Result<Part> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| return format!("Failed to read {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|e| return e.to_string_lossy().to_string())
            .unwrap_or_else(|| return "upload".to_string());

        return Ok(Part::bytes(bytes).file_name(filename));
    }

    /// Extracts a web page and stores it as a link source.
    pub async fn generate_url_source(&self, session_id: &str, url: &str) -> Result<SourceContent> {
        let req = UrlSourceRequest {
            url: url.to_string(),
            session_id: session_id.to_string(),
        };

        let res = self
            .client
            .post(format!("{url}/generate-url-source", url = self.url))
            .json(&req)
            .send()
            .await?;

        let res = AudioraApi::check_status(res, "generate url source").await?;
        return Ok(res.json::<SourceContent>().await?);
    }

    /// Raw custom source documents stored for a session.
    pub async fn custom_source_documents(&self, session_id: &str) -> Result<Vec<Value>> {
        let req = SessionRequest {
            session_id: session_id.to_string(),
        };

        let res = self
            .client
            .post(format!("{url}/get-custom-sources", url = self.url))
            .json(&req)
            .send()
            .await?;

        let res = AudioraApi::check_status(res, "get custom sources").await?;
        return Ok(res.json::<Vec<Value>>().await?);
    }

    /// Raw session document, `None` when the server has no such session.
    pub async fn session_document(&self, session_id: &str) -> Result<Option<Value>> {
        let res = self
            .client
            .get(format!("{url}/audiocast/{session_id}", url = self.url))
            .send()
            .await?;

        if res.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let res = AudioraApi::check_status(res, "get session").await?;
        let value = res.json::<Value>().await?;
        if value.is_null() {
            return Ok(None);
        }

        return Ok(Some(value));
    }

    /// Starts audiocast generation for a finished conversation.
    pub async fn generate_audiocast(
        &self,
        session_id: &str,
        category: ContentCategory,
        summary: &str,
    ) -> Result<String> {
        let req = GenerateAudiocastRequest {
            session_id: session_id.to_string(),
            summary: summary.to_string(),
            category,
        };

        let res = self
            .client
            .post(format!("{url}/audiocast/generate", url = self.url))
            .json(&req)
            .send()
            .await?;

        let res = AudioraApi::check_status(res, "generate audiocast").await?;
        return Ok(res.json::<String>().await?);
    }
}
