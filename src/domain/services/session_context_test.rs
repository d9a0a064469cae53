use std::sync::Arc;
use std::sync::Mutex;

use anyhow::Result;
use serde_json::json;

use super::list_sessions;
use super::SessionContext;
use crate::domain::models::ChatItem;
use crate::domain::models::ChatItemUpdate;
use crate::domain::models::ChatRole;
use crate::domain::models::ContentCategory;
use crate::domain::models::KeyValueStore;
use crate::domain::models::KeyValueStoreBox;
use crate::domain::models::RemoteStoreBox;
use crate::domain::models::Session;
use crate::domain::services::db::custom_sources_path;
use crate::domain::services::db::Db;
use crate::domain::services::projection::Emission;
use crate::infrastructure::stores::memory::MemoryStore;
use crate::infrastructure::stores::memory_kv::MemoryKeyValueStore;

struct Fixture {
    store: MemoryStore,
    storage: KeyValueStoreBox,
    db: Db,
}

impl Fixture {
    fn new() -> Fixture {
        let store = MemoryStore::default();
        let boxed: RemoteStoreBox = Arc::new(store.clone());
        return Fixture {
            store,
            storage: Arc::new(MemoryKeyValueStore::default()),
            db: Db::new(boxed),
        };
    }

    fn context(&self, session_id: &str) -> SessionContext {
        return SessionContext::new(session_id, self.storage.clone(), &self.db);
    }

    fn stored(&self, session_id: &str) -> Result<Option<Session>> {
        let payload = self.storage.get(&format!("AUDIOCAST_SESSION_{session_id}"))?;
        return Ok(payload
            .map(|e| return serde_json::from_str::<Option<Session>>(&e))
            .transpose()?
            .flatten());
    }
}

fn chat_ids(context: &SessionContext) -> Vec<String> {
    return context
        .session()
        .map(|session| return session.chats.iter().map(|e| return e.id.to_string()).collect())
        .unwrap_or_default();
}

#[test]
fn it_starts_a_fresh_session() -> Result<()> {
    let fixture = Fixture::new();
    let context = fixture.context("abc");

    let session = context.start_session(ContentCategory::Podcast)?;

    assert_eq!(session.id, "abc");
    assert_eq!(session.category, ContentCategory::Podcast);
    assert_eq!(session.title, "Untitled");
    assert!(session.chats.is_empty());
    assert!(session.nonce > 0);
    assert_eq!(fixture.stored("abc")?, Some(session));

    return Ok(());
}

#[test]
fn it_replaces_the_session_when_started_again() -> Result<()> {
    let fixture = Fixture::new();
    let context = fixture.context("abc");

    context.start_session(ContentCategory::Podcast)?;
    context.add_chat_item(ChatItem::new("a", ChatRole::User, "Hello"))?;
    context.update_session_title("Whales")?;
    context.start_session(ContentCategory::Sermon)?;

    let session = context.session().unwrap();
    assert_eq!(session.category, ContentCategory::Sermon);
    assert_eq!(session.title, "Untitled");
    assert!(session.chats.is_empty());

    return Ok(());
}

#[test]
fn it_ignores_chat_items_without_a_session() -> Result<()> {
    let fixture = Fixture::new();
    let context = fixture.context("abc");

    let item = context.add_chat_item(ChatItem::new("a", ChatRole::User, "Hello"))?;

    assert_eq!(item.id, "a");
    assert_eq!(context.session(), None);
    assert_eq!(fixture.storage.keys()?, Vec::<String>::new());

    return Ok(());
}

#[test]
fn it_appends_chat_items_in_order() -> Result<()> {
    let fixture = Fixture::new();
    let context = fixture.context("abc");
    context.start_session(ContentCategory::Lecture)?;

    let item = context.add_chat_item(ChatItem::new("a", ChatRole::User, "Hello"))?;
    context.add_chat_item(ChatItem::pending("b"))?;

    assert_eq!(item.content, "Hello");
    assert_eq!(chat_ids(&context), vec!["a".to_string(), "b".to_string()]);
    assert_eq!(fixture.stored("abc")?.unwrap().chats.len(), 2);

    return Ok(());
}

#[test]
fn it_streams_chat_content() -> Result<()> {
    let fixture = Fixture::new();
    let context = fixture.context("abc");
    context.start_session(ContentCategory::Podcast)?;
    context.add_chat_item(ChatItem::pending("a"))?;

    context.update_chat_content("a", "abc")?;
    context.update_chat_content("a", "def")?;
    context.update_chat_content("missing", "ghi")?;

    let session = context.session().unwrap();
    let item = session.chat("a").unwrap();
    assert_eq!(item.content, "abcdef");
    assert!(!item.loading);
    assert_eq!(session.chats.len(), 1);

    return Ok(());
}

#[test]
fn it_merges_chat_item_updates_in_place() -> Result<()> {
    let fixture = Fixture::new();
    let context = fixture.context("abc");
    context.start_session(ContentCategory::Podcast)?;
    context.add_chat_item(ChatItem::new("a", ChatRole::User, "One"))?;
    context.add_chat_item(ChatItem::pending("b"))?;
    context.add_chat_item(ChatItem::new("c", ChatRole::User, "Three"))?;

    context.update_chat_item(&ChatItemUpdate::new("b").content("Two").loading(false))?;
    context.update_chat_item(&ChatItemUpdate::new("b").loading(true))?;
    context.update_chat_item(&ChatItemUpdate::new("missing").content("Nope"))?;

    let session = context.session().unwrap();
    assert_eq!(chat_ids(&context), vec!["a".to_string(), "b".to_string(), "c".to_string()]);
    let item = session.chat("b").unwrap();
    assert_eq!(item.content, "Two");
    assert_eq!(item.role, ChatRole::Assistant);
    assert!(!item.loading);

    return Ok(());
}

#[test]
fn it_removes_chat_items() -> Result<()> {
    let fixture = Fixture::new();
    let context = fixture.context("abc");
    context.start_session(ContentCategory::Podcast)?;
    context.add_chat_item(ChatItem::new("a", ChatRole::User, "One"))?;
    context.add_chat_item(ChatItem::new("b", ChatRole::User, "Two"))?;

    context.remove_chat_item("a")?;
    assert_eq!(chat_ids(&context), vec!["b".to_string()]);

    context.remove_chat_item("a")?;
    assert_eq!(chat_ids(&context), vec!["b".to_string()]);

    return Ok(());
}

#[test]
fn it_leaves_subscribers_and_storage_alone_on_misses() -> Result<()> {
    let fixture = Fixture::new();
    let context = fixture.context("abc");
    context.start_session(ContentCategory::Podcast)?;
    context.add_chat_item(ChatItem::new("a", ChatRole::User, "One"))?;

    let calls = Arc::new(Mutex::new(0));
    let calls_clone = calls.clone();
    let _unsubscriber = context.observable().subscribe(move |_| {
        *calls_clone.lock().unwrap() += 1;
    });
    assert_eq!(*calls.lock().unwrap(), 1);

    context.remove_chat_item("a")?;
    assert_eq!(*calls.lock().unwrap(), 2);

    fixture.storage.set("AUDIOCAST_SESSION_abc", "untouched")?;
    context.remove_chat_item("a")?;
    context.update_chat_content("missing", "chunk")?;
    context.update_chat_item(&ChatItemUpdate::new("missing").content("x"))?;

    assert_eq!(*calls.lock().unwrap(), 2);
    assert_eq!(
        fixture.storage.get("AUDIOCAST_SESSION_abc")?,
        Some("untouched".to_string())
    );

    return Ok(());
}

#[test]
fn it_streams_the_session_title() -> Result<()> {
    let fixture = Fixture::new();
    let context = fixture.context("abc");
    context.start_session(ContentCategory::Podcast)?;

    context.update_session_title("Hello")?;
    assert_eq!(context.session().unwrap().title, "Hello");

    context.update_session_title(" World")?;
    assert_eq!(context.session().unwrap().title, "Hello World");

    return Ok(());
}

#[test]
fn it_derives_session_completed() -> Result<()> {
    let fixture = Fixture::new();
    let context = fixture.context("abc");

    let received = Arc::new(Mutex::new(vec![]));
    let received_clone = received.clone();
    let _unsubscriber = context.session_completed().subscribe(move |completed: &bool| {
        received_clone.lock().unwrap().push(*completed);
    });

    context.start_session(ContentCategory::Podcast)?;
    context.set_summary("A show about whales.")?;
    context.set_completed(true)?;

    assert_eq!(*received.lock().unwrap(), vec![false, true]);
    assert_eq!(
        context.session().unwrap().summary,
        Some("A show about whales.".to_string())
    );

    return Ok(());
}

#[test]
fn it_restores_persisted_state() -> Result<()> {
    let fixture = Fixture::new();
    let context = fixture.context("abc");
    context.start_session(ContentCategory::Interview)?;
    context.add_chat_item(ChatItem::new("a", ChatRole::User, "Hi"))?;
    context.audio_source().set("https://cdn.audiora.app/abc.mp3".to_string())?;
    context.fetching_source().set(true);

    let restored = fixture.context("abc");

    assert_eq!(restored.session(), context.session());
    assert_eq!(restored.audio_source().get(), "https://cdn.audiora.app/abc.mp3");
    assert!(!restored.fetching_source().get());

    return Ok(());
}

#[test]
fn it_keeps_sessions_apart() -> Result<()> {
    let fixture = Fixture::new();
    let first = fixture.context("abc");
    let second = fixture.context("xyz");

    first.start_session(ContentCategory::Podcast)?;
    first.add_chat_item(ChatItem::new("a", ChatRole::User, "Hi"))?;

    assert_eq!(second.session(), None);
    assert_eq!(second.session_id(), "xyz");

    return Ok(());
}

#[test]
fn it_exposes_remote_projections_read_only() -> Result<()> {
    let fixture = Fixture::new();
    fixture.store.set_document(
        "audiora_sessions",
        "abc",
        test_utils::session_document("abc", "podcast"),
    );
    fixture.store.set_document(
        &custom_sources_path("abc"),
        "s1",
        test_utils::copy_paste_source("s1", "abc", "Notes", "2024-05-01"),
    );
    let context = fixture.context("abc");

    let titles = Arc::new(Mutex::new(vec![]));
    let titles_clone = titles.clone();
    let _session = context.remote_session().subscribe(move |emission| {
        if let Emission::Next(Some(Some(session))) = emission {
            titles_clone.lock().unwrap().push(session.title().map(|e| return e.to_string()));
        }
    });
    let _sources = context.remote_sources().subscribe(|_| {});

    assert_eq!(*titles.lock().unwrap(), vec![Some("Whale tales".to_string())]);
    assert_eq!(
        context.remote_sources().latest().map(|e| return e.len()),
        Some(1)
    );
    assert_eq!(context.session(), None);

    fixture.store.set_document("audiora_sessions", "abc", json!({ "id": "abc", "category": "podcast" }));
    assert_eq!(titles.lock().unwrap().len(), 2);

    return Ok(());
}

#[test]
fn it_lists_sessions_newest_first() -> Result<()> {
    let fixture = Fixture::new();
    let older = fixture.context("older");
    let newer = fixture.context("newer");
    older.start_session(ContentCategory::Podcast)?;
    newer.start_session(ContentCategory::Sermon)?;

    let mut session = newer.session().unwrap();
    session.nonce = older.session().unwrap().nonce + 1;
    fixture
        .storage
        .set("AUDIOCAST_SESSION_newer", &serde_json::to_string(&Some(session))?)?;
    fixture.storage.set("AUDIOCAST_SESSION_broken", "{")?;
    fixture.storage.set("AUDIOCAST_SOURCE_newer", "\"\"")?;

    let ids = list_sessions(&fixture.storage)?
        .into_iter()
        .map(|e| return e.id)
        .collect::<Vec<String>>();
    assert_eq!(ids, vec!["newer".to_string(), "older".to_string()]);

    return Ok(());
}
