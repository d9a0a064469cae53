#[cfg(test)]
#[path = "store_test.rs"]
mod tests;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use strum::EnumIter;
use strum::EnumVariantNames;
use strum::IntoEnumIterator;

use super::DocumentRef;
use super::Query;

#[derive(Clone, Debug, PartialEq, Eq, EnumIter, EnumVariantNames, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum StoreName {
    Api,
    Memory,
}

impl StoreName {
    pub fn parse(text: String) -> Option<StoreName> {
        return StoreName::iter().find(|e| return e.to_string() == text);
    }
}

/// The value of one document at a point in time. `data` is `None` when the
/// document does not exist.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentSnapshot {
    pub id: String,
    pub data: Option<Value>,
}

impl DocumentSnapshot {
    pub fn new(id: &str, data: Option<Value>) -> DocumentSnapshot {
        return DocumentSnapshot {
            id: id.to_string(),
            data,
        };
    }

    pub fn exists(&self) -> bool {
        return self.data.is_some();
    }
}

/// Every document matching a query, in query order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QuerySnapshot {
    pub docs: Vec<DocumentSnapshot>,
}

pub type SnapshotCallback<S> = Arc<dyn Fn(Result<S>) + Send + Sync>;

/// Handle to a live remote listener. The listener is detached exactly once,
/// either through `remove` or when the handle is dropped.
pub struct ListenerRegistration {
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl ListenerRegistration {
    pub fn new<F: FnOnce() + Send + 'static>(detach: F) -> ListenerRegistration {
        return ListenerRegistration {
            detach: Some(Box::new(detach)),
        };
    }

    pub fn noop() -> ListenerRegistration {
        return ListenerRegistration { detach: None };
    }

    pub fn remove(mut self) {
        self.detach_now();
    }

    fn detach_now(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        self.detach_now();
    }
}

/// A document/collection store with live change notification.
///
/// Listeners receive the current snapshot once attached and again on every
/// change. A listener error is terminal: no further snapshots follow for that
/// registration.
#[async_trait]
pub trait RemoteStore {
    fn name(&self) -> StoreName;

    fn on_document_snapshot(
        &self,
        reference: &DocumentRef,
        callback: SnapshotCallback<DocumentSnapshot>,
    ) -> Result<ListenerRegistration>;

    fn on_query_snapshot(
        &self,
        query: &Query,
        callback: SnapshotCallback<QuerySnapshot>,
    ) -> Result<ListenerRegistration>;

    /// Appends a document to a collection, returning the new document id.
    async fn add_document(&self, collection: &str, data: Value) -> Result<String>;
}

pub type RemoteStoreBox = Arc<dyn RemoteStore + Send + Sync>;

/// Durable string key/value storage for locally persisted state.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn keys(&self) -> Result<Vec<String>>;
}

pub type KeyValueStoreBox = Arc<dyn KeyValueStore + Send + Sync>;
