#[cfg(test)]
#[path = "db_test.rs"]
mod tests;

use dashmap::DashMap;

use super::live_snapshot::LiveSnapshot;
use super::projection::Projection;
use crate::domain::models::CustomSource;
use crate::domain::models::Direction;
use crate::domain::models::DocumentRef;
use crate::domain::models::Query;
use crate::domain::models::RemoteStoreBox;
use crate::domain::models::SessionModel;

pub const SESSIONS_COLLECTION: &str = "audiora_sessions";
pub const CUSTOM_SOURCES_COLLECTION: &str = "custom_sources";

pub fn custom_sources_path(session_id: &str) -> String {
    return format!("{SESSIONS_COLLECTION}/{session_id}/{CUSTOM_SOURCES_COLLECTION}");
}

/// Owns the remote projections. Every document or query identity gets one
/// `Projection`, so all consumers of the same session share one remote
/// listener.
pub struct Db {
    store: RemoteStoreBox,
    sessions: DashMap<String, Projection<Option<SessionModel>>>,
    custom_sources: DashMap<String, Projection<Vec<CustomSource>>>,
}

impl Db {
    pub fn new(store: RemoteStoreBox) -> Db {
        return Db {
            store,
            sessions: DashMap::new(),
            custom_sources: DashMap::new(),
        };
    }

    pub fn store(&self) -> &RemoteStoreBox {
        return &self.store;
    }

    /// The server's copy of a session, `None` while it does not exist or
    /// after the listener failed.
    pub fn session(&self, session_id: &str) -> Projection<Option<SessionModel>> {
        return self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                let reference = DocumentRef::new(SESSIONS_COLLECTION, session_id);
                return Projection::new(LiveSnapshot::<Option<SessionModel>>::document(
                    self.store.clone(),
                    reference,
                ));
            })
            .clone();
    }

    /// Sources attached to a session, oldest first. Starts with `None` until
    /// the first remote list arrives.
    pub fn custom_sources(&self, session_id: &str) -> Projection<Vec<CustomSource>> {
        return self
            .custom_sources
            .entry(session_id.to_string())
            .or_insert_with(|| {
                let query = Query::new(&custom_sources_path(session_id))
                    .order_by("created_at", Direction::Asc);
                return Projection::new(LiveSnapshot::<Vec<CustomSource>>::collection(
                    self.store.clone(),
                    query,
                ))
                    .start_with(None);
            })
            .clone();
    }
}
