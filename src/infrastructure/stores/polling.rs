#[cfg(test)]
#[path = "polling_test.rs"]
mod tests;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::DocumentRef;
use crate::domain::models::DocumentSnapshot;
use crate::domain::models::ListenerRegistration;
use crate::domain::models::Query;
use crate::domain::models::QuerySnapshot;
use crate::domain::models::RemoteStore;
use crate::domain::models::SnapshotCallback;
use crate::domain::models::StoreName;
use crate::domain::services::db::CUSTOM_SOURCES_COLLECTION;
use crate::domain::services::db::SESSIONS_COLLECTION;
use crate::infrastructure::api::audiora::AudioraApi;

/// `RemoteStore` over the Audiora HTTP API. The API has no change feed, so
/// listeners re-fetch on an interval and rely on downstream deduplication.
/// The first failed request is delivered as the listener's terminal error.
pub struct PollingStore {
    api: Arc<AudioraApi>,
    interval: Duration,
}

impl Default for PollingStore {
    fn default() -> PollingStore {
        let interval = Config::get(ConfigKey::PollInterval)
            .parse::<u64>()
            .unwrap_or(2000);

        return PollingStore::new(AudioraApi::default(), Duration::from_millis(interval));
    }
}

/// Session id of an `audiora_sessions/<id>/custom_sources` path.
fn custom_sources_owner(collection: &str) -> Option<&str> {
    let rest = collection.strip_prefix(SESSIONS_COLLECTION)?.strip_prefix('/')?;
    let session_id = rest.strip_suffix(CUSTOM_SOURCES_COLLECTION)?.strip_suffix('/')?;
    if session_id.is_empty() || session_id.contains('/') {
        return None;
    }

    return Some(session_id);
}

fn to_document(index: usize, data: Value) -> DocumentSnapshot {
    let id = data
        .get("id")
        .and_then(|e| return e.as_str())
        .map(|e| return e.to_string())
        .unwrap_or_else(|| return index.to_string());

    return DocumentSnapshot::new(&id, Some(data));
}

impl PollingStore {
    pub fn new(api: AudioraApi, interval: Duration) -> PollingStore {
        return PollingStore {
            api: Arc::new(api),
            interval,
        };
    }

    /// Runs `fetch` now and then every interval until cancelled or failed.
    fn poll<S, F, Fut>(
        &self,
        source: String,
        callback: SnapshotCallback<S>,
        fetch: F,
    ) -> Result<ListenerRegistration>
    where
        S: Send + 'static,
        F: Fn(Arc<AudioraApi>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<S>> + Send + 'static,
    {
        let handle = Handle::try_current().context("Polling listeners need a tokio runtime")?;
        let token = CancellationToken::new();
        let child = token.clone();
        let api = self.api.clone();
        let interval = self.interval;

        handle.spawn(async move {
            loop {
                let res = tokio::select! {
                    _ = child.cancelled() => return,
                    res = fetch(api.clone()) => res,
                };

                let failed = res.is_err();
                callback(res);
                if failed {
                    tracing::warn!(source = %source, "Poll failed, stopping listener");
                    return;
                }

                tokio::select! {
                    _ = child.cancelled() => return,
                    _ = tokio::time::sleep(interval) => {},
                }
            }
        });

        return Ok(ListenerRegistration::new(move || {
            token.cancel();
        }));
    }
}

#[async_trait]
impl RemoteStore for PollingStore {
    fn name(&self) -> StoreName {
        return StoreName::Api;
    }

    fn on_document_snapshot(
        &self,
        reference: &DocumentRef,
        callback: SnapshotCallback<DocumentSnapshot>,
    ) -> Result<ListenerRegistration> {
        if reference.collection != SESSIONS_COLLECTION {
            bail!(format!("No API document for {reference}"));
        }

        let session_id = reference.id.to_string();
        return self.poll(reference.to_string(), callback, move |api| {
            let session_id = session_id.to_string();
            return async move {
                let data = api.session_document(&session_id).await?;
                return Ok(DocumentSnapshot::new(&session_id, data));
            };
        });
    }

    fn on_query_snapshot(
        &self,
        query: &Query,
        callback: SnapshotCallback<QuerySnapshot>,
    ) -> Result<ListenerRegistration> {
        let Some(session_id) = custom_sources_owner(&query.collection) else {
            bail!(format!("No API collection for {}", query.collection));
        };

        let session_id = session_id.to_string();
        let query = query.clone();
        return self.poll(query.to_string(), callback, move |api| {
            let session_id = session_id.to_string();
            let query = query.clone();
            return async move {
                let docs = api
                    .custom_source_documents(&session_id)
                    .await?
                    .into_iter()
                    .enumerate()
                    .map(|(index, data)| return to_document(index, data))
                    .collect::<Vec<DocumentSnapshot>>();

                return Ok(QuerySnapshot {
                    docs: query.apply(docs),
                });
            };
        });
    }

    #[allow(clippy::implicit_return)]
    async fn add_document(&self, collection: &str, data: Value) -> Result<String> {
        let Some(session_id) = custom_sources_owner(collection) else {
            bail!(format!("No API collection for {collection}"));
        };

        let source_type = data.get("source_type").and_then(|e| return e.as_str());
        let content = data.get("content").and_then(|e| return e.as_str());
        match (source_type, content) {
            (Some("copy/paste"), Some(content)) => {
                return self.api.save_copied_source(session_id, content).await;
            }
            _ => bail!("Only copy/paste sources can be written through the API"),
        }
    }
}
