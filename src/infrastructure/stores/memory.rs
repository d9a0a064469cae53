#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::Weak;

use anyhow::anyhow;
use anyhow::bail;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::domain::models::DocumentRef;
use crate::domain::models::DocumentSnapshot;
use crate::domain::models::ListenerRegistration;
use crate::domain::models::Query;
use crate::domain::models::QuerySnapshot;
use crate::domain::models::RemoteStore;
use crate::domain::models::SnapshotCallback;
use crate::domain::models::StoreName;
use crate::domain::services::ids;

enum Listener {
    Document(DocumentRef, SnapshotCallback<DocumentSnapshot>),
    Query(Query, SnapshotCallback<QuerySnapshot>),
}

enum Delivery {
    Document(SnapshotCallback<DocumentSnapshot>, DocumentSnapshot),
    Query(SnapshotCallback<QuerySnapshot>, QuerySnapshot),
}

impl Delivery {
    fn send(self) {
        match self {
            Delivery::Document(callback, snapshot) => callback(Ok(snapshot)),
            Delivery::Query(callback, snapshot) => callback(Ok(snapshot)),
        }
    }
}

#[derive(Default)]
struct MemoryState {
    collections: BTreeMap<String, BTreeMap<String, Value>>,
    listeners: BTreeMap<u64, Listener>,
    next_listener_id: u64,
    attach_count: usize,
    fail_next_attach: Option<String>,
}

impl MemoryState {
    fn document_snapshot(&self, reference: &DocumentRef) -> DocumentSnapshot {
        let data = self
            .collections
            .get(&reference.collection)
            .and_then(|docs| return docs.get(&reference.id))
            .cloned();

        return DocumentSnapshot::new(&reference.id, data);
    }

    fn query_snapshot(&self, query: &Query) -> QuerySnapshot {
        let docs = self
            .collections
            .get(&query.collection)
            .map(|docs| {
                return docs
                    .iter()
                    .map(|(id, data)| return DocumentSnapshot::new(id, Some(data.clone())))
                    .collect::<Vec<DocumentSnapshot>>();
            })
            .unwrap_or_default();

        return QuerySnapshot {
            docs: query.apply(docs),
        };
    }

    /// Snapshots for every listener watching `collection`.
    fn deliveries(&self, collection: &str, id: Option<&str>) -> Vec<Delivery> {
        return self
            .listeners
            .values()
            .filter_map(|listener| match listener {
                Listener::Document(reference, callback) => {
                    if reference.collection != collection
                        || id.map_or(false, |id| return id != reference.id)
                    {
                        return None;
                    }
                    return Some(Delivery::Document(
                        callback.clone(),
                        self.document_snapshot(reference),
                    ));
                }
                Listener::Query(query, callback) => {
                    if query.collection != collection {
                        return None;
                    }
                    return Some(Delivery::Query(callback.clone(), self.query_snapshot(query)));
                }
            })
            .collect();
    }
}

/// In-process document store with live listeners.
///
/// Listeners get the current snapshot as soon as they attach and a fresh one
/// after every write to their collection. Callbacks always run outside the
/// store's lock, so they may read or write the store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

fn lock(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    return state.lock().unwrap_or_else(PoisonError::into_inner);
}

impl MemoryStore {
    pub fn set_document(&self, collection: &str, id: &str, data: Value) {
        let deliveries = {
            let mut state = lock(&self.state);
            state
                .collections
                .entry(collection.to_string())
                .or_default()
                .insert(id.to_string(), data);
            state.deliveries(collection, Some(id))
        };

        for delivery in deliveries {
            delivery.send();
        }
    }

    pub fn delete_document(&self, collection: &str, id: &str) {
        let deliveries = {
            let mut state = lock(&self.state);
            if let Some(docs) = state.collections.get_mut(collection) {
                docs.remove(id);
            }
            state.deliveries(collection, Some(id))
        };

        for delivery in deliveries {
            delivery.send();
        }
    }

    /// Re-delivers current snapshots without changing data, the way a
    /// metadata-only change does.
    pub fn touch(&self, collection: &str) {
        let deliveries = lock(&self.state).deliveries(collection, None);
        for delivery in deliveries {
            delivery.send();
        }
    }

    /// Fails and drops every listener on `collection`.
    pub fn fail_listeners(&self, collection: &str, message: &str) {
        let failed = {
            let mut state = lock(&self.state);
            let ids = state
                .listeners
                .iter()
                .filter(|(_, listener)| match listener {
                    Listener::Document(reference, _) => return reference.collection == collection,
                    Listener::Query(query, _) => return query.collection == collection,
                })
                .map(|(id, _)| return *id)
                .collect::<Vec<u64>>();

            ids.iter()
                .filter_map(|id| return state.listeners.remove(id))
                .collect::<Vec<Listener>>()
        };

        for listener in failed {
            match listener {
                Listener::Document(_, callback) => callback(Err(anyhow!(message.to_string()))),
                Listener::Query(_, callback) => callback(Err(anyhow!(message.to_string()))),
            }
        }
    }

    /// The next attach call fails with `message`.
    pub fn fail_next_attach(&self, message: &str) {
        lock(&self.state).fail_next_attach = Some(message.to_string());
    }

    /// Number of listeners ever attached.
    pub fn attach_count(&self) -> usize {
        return lock(&self.state).attach_count;
    }

    /// Number of listeners currently attached.
    pub fn listener_count(&self) -> usize {
        return lock(&self.state).listeners.len();
    }

    fn register(&self, listener: Listener) -> Result<ListenerRegistration> {
        let mut state = lock(&self.state);
        if let Some(message) = state.fail_next_attach.take() {
            bail!(message);
        }

        let id = state.next_listener_id;
        state.next_listener_id += 1;
        state.attach_count += 1;
        state.listeners.insert(id, listener);

        let weak: Weak<Mutex<MemoryState>> = Arc::downgrade(&self.state);
        let registration = ListenerRegistration::new(move || {
            if let Some(state) = weak.upgrade() {
                lock(&state).listeners.remove(&id);
            }
        });

        return Ok(registration);
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    fn name(&self) -> StoreName {
        return StoreName::Memory;
    }

    fn on_document_snapshot(
        &self,
        reference: &DocumentRef,
        callback: SnapshotCallback<DocumentSnapshot>,
    ) -> Result<ListenerRegistration> {
        let registration = self.register(Listener::Document(reference.clone(), callback.clone()))?;

        let snapshot = lock(&self.state).document_snapshot(reference);
        callback(Ok(snapshot));

        return Ok(registration);
    }

    fn on_query_snapshot(
        &self,
        query: &Query,
        callback: SnapshotCallback<QuerySnapshot>,
    ) -> Result<ListenerRegistration> {
        let registration = self.register(Listener::Query(query.clone(), callback.clone()))?;

        let snapshot = lock(&self.state).query_snapshot(query);
        callback(Ok(snapshot));

        return Ok(registration);
    }

    #[allow(clippy::implicit_return)]
    async fn add_document(&self, collection: &str, data: Value) -> Result<String> {
        if !data.is_object() {
            bail!("Documents must be JSON objects");
        }

        let id = ids::uuid();
        self.set_document(collection, &id, data);

        return Ok(id);
    }
}
