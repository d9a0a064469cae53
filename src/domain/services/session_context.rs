#[cfg(test)]
#[path = "session_context_test.rs"]
mod tests;

use anyhow::Result;

use super::db::Db;
use super::observable::Observable;
use super::observable::Persisted;
use super::projection::Projection;
use crate::domain::models::ChatItem;
use crate::domain::models::ChatItemUpdate;
use crate::domain::models::ContentCategory;
use crate::domain::models::CustomSource;
use crate::domain::models::KeyValueStoreBox;
use crate::domain::models::Session;
use crate::domain::models::SessionModel;

pub const SESSION_KEY: &str = "AUDIOCAST_SESSION";
pub const AUDIO_SOURCE_KEY: &str = "AUDIOCAST_SOURCE";

pub fn session_key(session_id: &str) -> String {
    return format!("{SESSION_KEY}_{session_id}");
}

pub fn audio_source_key(session_id: &str) -> String {
    return format!("{AUDIO_SOURCE_KEY}_{session_id}");
}

/// State for one conversation, built once per session id and handed to
/// whatever needs it.
///
/// The local `Session` is the editable working copy and this context is its
/// only writer. Every mutation is applied in memory and written through to
/// the key/value store straight away. The remote projections are read-only
/// mirrors of what the server holds.
pub struct SessionContext {
    session_id: String,
    session: Persisted<Option<Session>>,
    session_completed: Observable<bool>,
    fetching_source: Observable<bool>,
    audio_source: Persisted<String>,
    remote_session: Projection<Option<SessionModel>>,
    remote_sources: Projection<Vec<CustomSource>>,
}

impl SessionContext {
    pub fn new(session_id: &str, storage: KeyValueStoreBox, db: &Db) -> SessionContext {
        let session =
            Persisted::<Option<Session>>::load(storage.clone(), &session_key(session_id), None);
        let session_completed = session.observable().derived(|session| {
            return session.as_ref().map_or(false, |e| return e.completed);
        });
        let audio_source = Persisted::load(storage, &audio_source_key(session_id), String::new());

        return SessionContext {
            session_id: session_id.to_string(),
            session,
            session_completed,
            fetching_source: Observable::new(false),
            audio_source,
            remote_session: db.session(session_id),
            remote_sources: db.custom_sources(session_id),
        };
    }

    pub fn session_id(&self) -> &str {
        return &self.session_id;
    }

    pub fn session(&self) -> Option<Session> {
        return self.session.get();
    }

    pub fn observable(&self) -> &Observable<Option<Session>> {
        return self.session.observable();
    }

    pub fn session_completed(&self) -> &Observable<bool> {
        return &self.session_completed;
    }

    pub fn fetching_source(&self) -> &Observable<bool> {
        return &self.fetching_source;
    }

    pub fn audio_source(&self) -> &Persisted<String> {
        return &self.audio_source;
    }

    pub fn remote_session(&self) -> &Projection<Option<SessionModel>> {
        return &self.remote_session;
    }

    pub fn remote_sources(&self) -> &Projection<Vec<CustomSource>> {
        return &self.remote_sources;
    }

    /// Replaces whatever session was stored under this id with a fresh one.
    pub fn start_session(&self, category: ContentCategory) -> Result<Session> {
        let session = Session::new(&self.session_id, category);
        tracing::info!(session_id = %self.session_id, category = %category, "Starting session");
        self.session.set(Some(session.clone()))?;
        return Ok(session);
    }

    /// Appends to the transcript. Without a started session the item is
    /// returned untouched and nothing is stored.
    pub fn add_chat_item(&self, item: ChatItem) -> Result<ChatItem> {
        let appended = item.clone();
        self.mutate(move |session| {
            session.chats.push(item);
            return true;
        })?;

        return Ok(appended);
    }

    pub fn update_chat_item(&self, update: &ChatItemUpdate) -> Result<()> {
        return self.mutate(|session| {
            let Some(item) = session.chat_mut(&update.id) else {
                return false;
            };
            item.merge(update);
            return true;
        });
    }

    /// Appends a streamed chunk to an item's content and ends its loading
    /// state.
    pub fn update_chat_content(&self, chat_id: &str, chunk: &str) -> Result<()> {
        return self.mutate(|session| {
            let Some(item) = session.chat_mut(chat_id) else {
                return false;
            };
            item.append(chunk);
            return true;
        });
    }

    pub fn remove_chat_item(&self, chat_id: &str) -> Result<()> {
        return self.mutate(|session| {
            let count = session.chats.len();
            session.chats.retain(|e| return e.id != chat_id);
            return session.chats.len() != count;
        });
    }

    pub fn update_session_title(&self, chunk: &str) -> Result<()> {
        return self.mutate(|session| {
            session.append_title(chunk);
            return true;
        });
    }

    pub fn set_summary(&self, summary: &str) -> Result<()> {
        return self.mutate(|session| {
            session.summary = Some(summary.to_string());
            return true;
        });
    }

    pub fn set_completed(&self, completed: bool) -> Result<()> {
        return self.mutate(|session| {
            if session.completed == completed {
                return false;
            }
            session.completed = completed;
            return true;
        });
    }

    /// Applies `f` to the stored session. `f` reports whether it changed
    /// anything; misses neither notify subscribers nor touch storage.
    fn mutate<F: FnOnce(&mut Session) -> bool>(&self, f: F) -> Result<()> {
        let changed = self.session.update_if(|session| {
            let Some(session) = session else {
                return false;
            };
            return f(session);
        })?;

        if !changed {
            tracing::debug!(session_id = %self.session_id, "Session unchanged, ignoring update");
        }

        return Ok(());
    }
}

/// Every session persisted in `storage`, newest first.
pub fn list_sessions(storage: &KeyValueStoreBox) -> Result<Vec<Session>> {
    let prefix = format!("{SESSION_KEY}_");
    let mut sessions = vec![];
    for key in storage.keys()? {
        if !key.starts_with(&prefix) {
            continue;
        }

        let Some(payload) = storage.get(&key)? else {
            continue;
        };

        match serde_json::from_str::<Option<Session>>(&payload) {
            Ok(Some(session)) => sessions.push(session),
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(key = %key, err = ?err, "Skipping unreadable session");
            }
        }
    }

    sessions.sort_by(|a, b| return b.nonce.cmp(&a.nonce));
    return Ok(sessions);
}
