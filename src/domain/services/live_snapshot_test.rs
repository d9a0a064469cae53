use std::sync::Arc;
use std::sync::Mutex;

use anyhow::Result;
use futures::StreamExt;
use serde_derive::Deserialize;
use serde_json::json;

use super::LiveSnapshot;
use crate::domain::models::Direction;
use crate::domain::models::DocumentRef;
use crate::domain::models::Query;
use crate::domain::models::RemoteStoreBox;
use crate::infrastructure::stores::memory::MemoryStore;

#[derive(Clone, Debug, PartialEq, Deserialize)]
struct Note {
    title: String,
}

fn setup() -> (MemoryStore, RemoteStoreBox) {
    let store = MemoryStore::default();
    let boxed: RemoteStoreBox = Arc::new(store.clone());
    return (store, boxed);
}

#[test]
fn it_emits_document_values_and_absence() -> Result<()> {
    let (store, boxed) = setup();
    let live = LiveSnapshot::<Option<Note>>::document(boxed, DocumentRef::new("notes", "a"));
    assert_eq!(live.identity(), "notes/a");

    let received = Arc::new(Mutex::new(vec![]));
    let received_clone = received.clone();
    let _registration = live.attach(move |res: Result<Option<Note>>| {
        received_clone.lock().unwrap().push(res.unwrap());
    })?;

    store.set_document("notes", "a", json!({ "title": "Hello" }));
    store.delete_document("notes", "a");

    assert_eq!(
        *received.lock().unwrap(),
        vec![
            None,
            Some(Note {
                title: "Hello".to_string()
            }),
            None
        ]
    );

    return Ok(());
}

#[test]
fn it_emits_the_ordered_collection_on_every_change() -> Result<()> {
    let (store, boxed) = setup();
    let query = Query::new("notes").order_by("created_at", Direction::Asc);
    let live = LiveSnapshot::<Vec<Note>>::collection(boxed, query);

    let received = Arc::new(Mutex::new(vec![]));
    let received_clone = received.clone();
    let _registration = live.attach(move |res: Result<Vec<Note>>| {
        let titles = res
            .unwrap()
            .into_iter()
            .map(|e| return e.title)
            .collect::<Vec<String>>();
        received_clone.lock().unwrap().push(titles);
    })?;

    store.set_document("notes", "z", json!({ "title": "First", "created_at": "1" }));
    store.set_document("notes", "y", json!({ "title": "Second", "created_at": "2" }));

    assert_eq!(
        *received.lock().unwrap(),
        vec![
            vec![],
            vec!["First".to_string()],
            vec!["First".to_string(), "Second".to_string()],
        ]
    );

    return Ok(());
}

#[test]
fn it_opens_one_listener_per_attach() -> Result<()> {
    let (store, boxed) = setup();
    let live = LiveSnapshot::<Option<Note>>::document(boxed, DocumentRef::new("notes", "a"));

    let first = live.attach(|_: Result<Option<Note>>| {})?;
    let second = live.clone().attach(|_: Result<Option<Note>>| {})?;
    assert_eq!(store.attach_count(), 2);
    assert_eq!(store.listener_count(), 2);

    first.remove();
    drop(second);
    assert_eq!(store.listener_count(), 0);

    return Ok(());
}

#[test]
fn it_stops_after_the_first_error() -> Result<()> {
    let (store, boxed) = setup();
    let live = LiveSnapshot::<Option<Note>>::document(boxed, DocumentRef::new("notes", "a"));

    let received = Arc::new(Mutex::new(vec![]));
    let received_clone = received.clone();
    let _registration = live.attach(move |res: Result<Option<Note>>| {
        received_clone.lock().unwrap().push(res.is_ok());
    })?;

    store.set_document("notes", "a", json!({ "wrong": true }));
    store.set_document("notes", "a", json!({ "title": "Fine" }));

    assert_eq!(*received.lock().unwrap(), vec![true, false]);

    return Ok(());
}

#[test]
fn it_fails_to_attach_when_the_store_refuses() -> Result<()> {
    let (store, boxed) = setup();
    store.fail_next_attach("permission denied");
    let live = LiveSnapshot::<Option<Note>>::document(boxed, DocumentRef::new("notes", "a"));

    let res = live.attach(|_: Result<Option<Note>>| {});
    assert_eq!(res.err().unwrap().to_string(), "permission denied");

    return Ok(());
}

#[tokio::test]
async fn it_streams_values_until_cancelled() -> Result<()> {
    let (store, boxed) = setup();
    store.set_document("notes", "a", json!({ "title": "One" }));
    let live = LiveSnapshot::<Option<Note>>::document(boxed, DocumentRef::new("notes", "a"));

    let mut stream = live.stream();
    store.set_document("notes", "a", json!({ "title": "Two" }));

    let first = stream.next().await.unwrap()?;
    let second = stream.next().await.unwrap()?;
    assert_eq!(first.unwrap().title, "One");
    assert_eq!(second.unwrap().title, "Two");

    stream.cancel();
    assert_eq!(store.listener_count(), 0);
    assert!(stream.next().await.is_none());

    return Ok(());
}

#[tokio::test]
async fn it_ends_the_stream_after_an_error() -> Result<()> {
    let (store, boxed) = setup();
    let live = LiveSnapshot::<Option<Note>>::document(boxed, DocumentRef::new("notes", "a"));

    let mut stream = live.stream();
    store.fail_listeners("notes", "network down");

    assert!(stream.next().await.unwrap()?.is_none());
    let err = stream.next().await.unwrap().err().unwrap();
    assert_eq!(err.to_string(), "network down");
    assert!(stream.next().await.is_none());

    return Ok(());
}
