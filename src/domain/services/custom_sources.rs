#[cfg(test)]
#[path = "custom_sources_test.rs"]
mod tests;

use super::db::Db;
use super::observable::Observable;
use super::observable::Unsubscriber;
use super::projection::Emission;
use super::projection::Subscription;
use crate::domain::models::CustomSource;

/// Sources attached to one session, mirrored from the remote projection.
///
/// `None` means the remote list has not arrived yet (or the listener failed).
/// Every remote emission replaces the list outright, optimistic additions
/// included.
pub struct CustomSourcesContext {
    session_id: String,
    sources: Observable<Option<Vec<CustomSource>>>,
    _subscription: Subscription,
}

impl CustomSourcesContext {
    pub fn new(session_id: &str, db: &Db) -> CustomSourcesContext {
        let sources = Observable::<Option<Vec<CustomSource>>>::new(None);
        let sink = sources.clone();
        let owner = session_id.to_string();
        let subscription = db.custom_sources(session_id).subscribe(move |emission| {
            if let Emission::Next(list) = emission {
                let list = list.map(|list| {
                    return list
                        .into_iter()
                        .filter(|e| return e.belongs_to(&owner))
                        .collect::<Vec<CustomSource>>();
                });
                sink.set(list);
            }
        });

        return CustomSourcesContext {
            session_id: session_id.to_string(),
            sources,
            _subscription: subscription,
        };
    }

    pub fn session_id(&self) -> &str {
        return &self.session_id;
    }

    pub fn sources(&self) -> Option<Vec<CustomSource>> {
        return self.sources.get();
    }

    pub fn observable(&self) -> &Observable<Option<Vec<CustomSource>>> {
        return &self.sources;
    }

    pub fn subscribe<F>(&self, callback: F) -> Unsubscriber
    where
        F: Fn(&Option<Vec<CustomSource>>) + Send + Sync + 'static,
    {
        return self.sources.subscribe(callback);
    }

    /// Shows `source` right away while its remote write is in flight.
    /// Dropped, returning false, while the list is still unknown.
    pub fn add_source(&self, source: CustomSource) -> bool {
        if self.sources.get().is_none() {
            tracing::debug!(
                session_id = %self.session_id,
                source_id = %source.id,
                "Sources not loaded yet, dropping optimistic add"
            );
            return false;
        }

        self.sources.update(move |sources| {
            if let Some(sources) = sources {
                sources.push(source);
            }
        });

        return true;
    }
}
