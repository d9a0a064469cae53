use anyhow::Result;

use super::ChatItem;
use super::ChatItemUpdate;
use super::ChatRole;

#[test]
fn it_creates_pending_assistant_items() {
    let item = ChatItem::pending("a");
    assert_eq!(item.role, ChatRole::Assistant);
    assert_eq!(item.content, "");
    assert!(item.loading);
    assert!(item.created_at.is_some());
}

#[test]
fn it_appends_and_clears_loading() {
    let mut item = ChatItem::pending("a");
    item.append("abc");
    item.append("def");

    assert_eq!(item.content, "abcdef");
    assert!(!item.loading);
}

#[test]
fn it_merges_only_present_fields() {
    let mut item = ChatItem::new("a", ChatRole::User, "Hello");
    item.merge(&ChatItemUpdate::new("a").content("Hi"));

    assert_eq!(item.id, "a");
    assert_eq!(item.role, ChatRole::User);
    assert_eq!(item.content, "Hi");
}

#[test]
fn it_never_raises_a_cleared_loading_flag() {
    let mut item = ChatItem::pending("a");
    item.merge(&ChatItemUpdate::new("a").loading(false));
    assert!(!item.loading);

    item.merge(&ChatItemUpdate::new("a").loading(true));
    assert!(!item.loading);
}

#[test]
fn it_serializes_without_optional_fields() -> Result<()> {
    let mut item = ChatItem::new("a", ChatRole::Assistant, "Hi");
    item.created_at = None;

    insta::assert_snapshot!(serde_json::to_string(&item)?, @r###"{"id":"a","role":"assistant","content":"Hi"}"###);

    let parsed: ChatItem = serde_json::from_str(r#"{"id":"b","role":"user","content":"Yo"}"#)?;
    assert!(!parsed.loading);
    assert_eq!(parsed.created_at, None);

    return Ok(());
}
