use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;

use super::AttachmentsContext;
use crate::domain::models::UploadItem;
use crate::domain::models::UploadItemUpdate;
use crate::domain::services::observable::Observable;

fn item(id: &str) -> UploadItem {
    return UploadItem::new(id, Path::new("whales.pdf"));
}

fn ids(items: &[UploadItem]) -> Vec<String> {
    return items.iter().map(|e| return e.id.to_string()).collect();
}

#[test]
fn it_adds_upload_items_in_order() {
    let context = AttachmentsContext::new("abc");
    context.add_upload_item(item("abc-1"));
    context.add_upload_item(item("abc-2"));

    assert_eq!(ids(&context.session_items().get()), vec!["abc-1", "abc-2"]);
}

#[test]
fn it_merges_updates_into_the_matching_item() {
    let context = AttachmentsContext::new("abc");
    context.add_upload_item(item("abc-1"));
    context.add_upload_item(item("abc-2"));

    let updated = context.update_upload_item(
        "abc-2",
        &UploadItemUpdate::default()
            .loading(false)
            .url("https://cdn.example.com/whales.pdf"),
    );
    assert!(updated);

    let items = context.session_items().get();
    assert!(items[0].loading);
    assert!(!items[1].loading);
    assert_eq!(items[1].url, Some("https://cdn.example.com/whales.pdf".to_string()));
}

#[test]
fn it_removes_upload_items() {
    let context = AttachmentsContext::new("abc");
    context.add_upload_item(item("abc-1"));
    context.add_upload_item(item("abc-2"));

    assert!(context.remove_upload_item("abc-1"));
    assert_eq!(ids(&context.session_items().get()), vec!["abc-2"]);
}

#[test]
fn it_ignores_unknown_items_without_notifying() {
    let context = AttachmentsContext::new("abc");
    context.add_upload_item(item("abc-1"));

    let calls = Arc::new(Mutex::new(0));
    let calls_clone = calls.clone();
    let _unsubscriber = context.items().subscribe(move |_| {
        *calls_clone.lock().unwrap() += 1;
    });

    assert!(!context.remove_upload_item("abc-9"));
    assert!(!context.update_upload_item("abc-9", &UploadItemUpdate::default().errored(true)));

    assert_eq!(*calls.lock().unwrap(), 1);
    assert_eq!(ids(&context.items().get()), vec!["abc-1"]);
}

#[test]
fn it_only_exposes_the_sessions_own_uploads() {
    let shared = Observable::new(vec![]);
    let first = AttachmentsContext::with_items("abc", shared.clone());
    let second = AttachmentsContext::with_items("def", shared.clone());

    let received = Arc::new(Mutex::new(vec![]));
    let received_clone = received.clone();
    let _unsubscriber = first.subscribe(move |items| {
        received_clone.lock().unwrap().push(ids(items));
    });

    first.add_upload_item(item("abc-1"));
    second.add_upload_item(item("def-1"));

    assert_eq!(ids(&shared.get()), vec!["abc-1", "def-1"]);
    assert_eq!(ids(&second.session_items().get()), vec!["def-1"]);
    assert_eq!(
        *received.lock().unwrap(),
        vec![Vec::<String>::new(), vec!["abc-1".to_string()]]
    );
}
