use super::get_summary;
use super::is_final_response;
use super::share_title;
use super::shareable_link;
use super::FINAL_RESPONSE_PREFIX;
use super::FINAL_RESPONSE_SUFFIX;
use crate::domain::models::ChatItem;
use crate::domain::models::ChatRole;

#[test]
fn it_detects_final_responses() {
    let content = test_utils::final_response("A show about whales.");
    let final_response = ChatItem::new("1", ChatRole::Assistant, &content);
    let question = ChatItem::new("2", ChatRole::Assistant, "What tone would you like?");

    assert!(is_final_response(&final_response));
    assert!(!is_final_response(&question));
}

#[test]
fn it_extracts_the_summary() {
    let content = test_utils::final_response("A 10 minute podcast about whales.");
    insta::assert_snapshot!(get_summary(&content), @"A 10 minute podcast about whales.");
}

#[test]
fn it_extracts_the_summary_ignoring_case() {
    let content = format!(
        "{} Two hosts discuss tea. {}",
        FINAL_RESPONSE_PREFIX.to_uppercase(),
        FINAL_RESPONSE_SUFFIX.to_lowercase()
    );
    assert_eq!(get_summary(&content), "Two hosts discuss tea.");
}

#[test]
fn it_keeps_plain_content() {
    assert_eq!(get_summary("  Just text  "), "Just text");
}

#[test]
fn it_builds_shareable_links() {
    insta::assert_snapshot!(shareable_link("https://audiora.app/", "abc123"), @"https://audiora.app/audiocast/abc123");
}

#[test]
fn it_builds_share_titles() {
    assert_eq!(
        share_title("Whales"),
        "Listen to this AI-generated audio 🎧 about Whales 🔥\n"
    );
}

#[test]
fn it_drops_the_first_newline_run_in_share_titles() {
    assert_eq!(
        share_title("Deep\n\nsea\nlife"),
        "Listen to this AI-generated audio 🎧 about Deepsea\nlife 🔥\n"
    );
}
