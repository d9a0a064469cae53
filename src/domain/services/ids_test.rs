use std::collections::HashSet;

use super::uuid;
use super::uuid_with_length;

#[test]
fn it_generates_twenty_base62_characters() {
    let id = uuid();
    assert_eq!(id.len(), 20);
    assert!(id.chars().all(|e| return e.is_ascii_alphanumeric()));
}

#[test]
fn it_generates_custom_lengths() {
    assert_eq!(uuid_with_length(8).len(), 8);
    assert_eq!(uuid_with_length(0), "");
}

#[test]
fn it_does_not_repeat() {
    let ids = (0..1000).map(|_| return uuid()).collect::<HashSet<String>>();
    assert_eq!(ids.len(), 1000);
}
