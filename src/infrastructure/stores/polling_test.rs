use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use mockito::Matcher;
use serde_json::json;
use tokio::sync::mpsc;

use super::custom_sources_owner;
use super::PollingStore;
use crate::domain::models::Direction;
use crate::domain::models::DocumentRef;
use crate::domain::models::DocumentSnapshot;
use crate::domain::models::Query;
use crate::domain::models::QuerySnapshot;
use crate::domain::models::RemoteStore;
use crate::infrastructure::api::audiora::AudioraApi;

fn store(url: &str) -> PollingStore {
    return PollingStore::new(AudioraApi::new(url), Duration::from_millis(10));
}

#[test]
fn it_parses_custom_source_paths() {
    assert_eq!(custom_sources_owner("audiora_sessions/abc/custom_sources"), Some("abc"));
    assert_eq!(custom_sources_owner("audiora_sessions//custom_sources"), None);
    assert_eq!(custom_sources_owner("audiora_sessions/a/b/custom_sources"), None);
    assert_eq!(custom_sources_owner("other/abc/custom_sources"), None);
}

#[test]
fn it_requires_a_runtime() {
    let store = store("http://localhost:1");
    let res = store.on_document_snapshot(
        &DocumentRef::new("audiora_sessions", "abc"),
        Arc::new(|_: Result<DocumentSnapshot>| {}),
    );

    assert!(res.is_err());
}

#[tokio::test]
async fn it_rejects_unknown_collections() -> Result<()> {
    let store = store("http://localhost:1");

    let document = store.on_document_snapshot(
        &DocumentRef::new("users", "abc"),
        Arc::new(|_: Result<DocumentSnapshot>| {}),
    );
    let query = store.on_query_snapshot(
        &Query::new("audiora_sessions"),
        Arc::new(|_: Result<QuerySnapshot>| {}),
    );

    assert_eq!(document.err().unwrap().to_string(), "No API document for users/abc");
    assert_eq!(query.err().unwrap().to_string(), "No API collection for audiora_sessions");

    return Ok(());
}

#[tokio::test]
async fn it_polls_session_documents() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/audiocast/abc")
        .with_status(200)
        .with_body(test_utils::session_document("abc", "podcast").to_string())
        .expect_at_least(2)
        .create_async()
        .await;

    let store = store(&server.url());
    let (tx, mut rx) = mpsc::unbounded_channel::<Result<DocumentSnapshot>>();
    let registration = store.on_document_snapshot(
        &DocumentRef::new("audiora_sessions", "abc"),
        Arc::new(move |res: Result<DocumentSnapshot>| {
            let _ = tx.send(res);
        }),
    )?;

    let first = rx.recv().await.unwrap()?;
    let second = rx.recv().await.unwrap()?;
    registration.remove();

    assert!(first.exists());
    assert_eq!(first.id, "abc");
    assert_eq!(first, second);
    mock.assert_async().await;

    return Ok(());
}

#[tokio::test]
async fn it_reports_missing_sessions_as_absent() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/audiocast/abc")
        .with_status(404)
        .create_async()
        .await;

    let store = store(&server.url());
    let (tx, mut rx) = mpsc::unbounded_channel::<Result<DocumentSnapshot>>();
    let _registration = store.on_document_snapshot(
        &DocumentRef::new("audiora_sessions", "abc"),
        Arc::new(move |res: Result<DocumentSnapshot>| {
            let _ = tx.send(res);
        }),
    )?;

    let first = rx.recv().await.unwrap()?;
    assert!(!first.exists());

    return Ok(());
}

#[tokio::test]
async fn it_stops_polling_after_a_failure() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/audiocast/abc")
        .with_status(500)
        .expect(1)
        .create_async()
        .await;

    let store = store(&server.url());
    let (tx, mut rx) = mpsc::unbounded_channel::<Result<DocumentSnapshot>>();
    let _registration = store.on_document_snapshot(
        &DocumentRef::new("audiora_sessions", "abc"),
        Arc::new(move |res: Result<DocumentSnapshot>| {
            let _ = tx.send(res);
        }),
    )?;

    let first = rx.recv().await.unwrap();
    assert!(first.is_err());
    assert!(rx.recv().await.is_none());
    mock.assert_async().await;

    return Ok(());
}

#[tokio::test]
async fn it_polls_ordered_custom_sources() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let body = json!([
        test_utils::copy_paste_source("late", "abc", "Later", "2024-05-02"),
        test_utils::link_source("early", "abc", "https://example.com", "2024-05-01"),
    ]);
    let mock = server
        .mock("POST", "/get-custom-sources")
        .match_body(Matcher::Json(json!({ "sessionId": "abc" })))
        .with_status(200)
        .with_body(body.to_string())
        .expect_at_least(1)
        .create_async()
        .await;

    let store = store(&server.url());
    let (tx, mut rx) = mpsc::unbounded_channel::<Result<QuerySnapshot>>();
    let registration = store.on_query_snapshot(
        &Query::new("audiora_sessions/abc/custom_sources").order_by("created_at", Direction::Asc),
        Arc::new(move |res: Result<QuerySnapshot>| {
            let _ = tx.send(res);
        }),
    )?;

    let snapshot = rx.recv().await.unwrap()?;
    registration.remove();

    let ids = snapshot
        .docs
        .iter()
        .map(|e| return e.id.to_string())
        .collect::<Vec<String>>();
    assert_eq!(ids, vec!["early".to_string(), "late".to_string()]);
    mock.assert_async().await;

    return Ok(());
}

#[tokio::test]
async fn it_saves_copied_sources() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/save-copied-source")
        .match_body(Matcher::Json(json!({ "sessionId": "abc", "text": "Pasted notes" })))
        .with_status(200)
        .with_body("\"Saved\"")
        .create_async()
        .await;

    let store = store(&server.url());
    let res = store
        .add_document(
            "audiora_sessions/abc/custom_sources",
            json!({ "source_type": "copy/paste", "content_type": "text/plain", "content": "Pasted notes" }),
        )
        .await?;

    assert_eq!(res, "Saved");
    mock.assert_async().await;

    return Ok(());
}

#[tokio::test]
async fn it_rejects_other_writes() -> Result<()> {
    let store = store("http://localhost:1");
    let res = store
        .add_document(
            "audiora_sessions/abc/custom_sources",
            json!({ "source_type": "link", "url": "https://example.com" }),
        )
        .await;

    assert!(res.is_err());

    return Ok(());
}
