#[cfg(test)]
#[path = "summary_test.rs"]
mod tests;

use crate::domain::models::ChatItem;

pub const FINAL_RESPONSE_PREFIX: &str = "Ok, thanks for clarifying!";
pub const FINAL_RESPONSE_SUFFIX: &str =
    "Please click the button below to start generating the audiocast.";

/// Whether the assistant has finished gathering requirements and the
/// conversation can move on to generation.
pub fn is_final_response(item: &ChatItem) -> bool {
    return item.content.contains(FINAL_RESPONSE_SUFFIX);
}

/// Removes every ASCII case-insensitive occurrence of `pattern`.
fn remove_ignore_case(content: &str, pattern: &str) -> String {
    let haystack = content.to_ascii_lowercase();
    let needle = pattern.to_ascii_lowercase();

    let mut res = String::with_capacity(content.len());
    let mut last = 0;
    for (start, _) in haystack.match_indices(&needle) {
        res += &content[last..start];
        last = start + needle.len();
    }
    res += &content[last..];

    return res;
}

/// The summary inside a final response, without the canned prefix and
/// suffix.
pub fn get_summary(content: &str) -> String {
    let content = remove_ignore_case(content, FINAL_RESPONSE_PREFIX);
    let content = remove_ignore_case(&content, FINAL_RESPONSE_SUFFIX);
    return content.trim().to_string();
}

pub fn shareable_link(origin: &str, session_id: &str) -> String {
    return format!("{}/audiocast/{session_id}", origin.trim_end_matches('/'));
}

pub fn share_title(session_title: &str) -> String {
    let title = format!("Listen to this AI-generated audio 🎧 about {session_title} 🔥");

    // Only the first run of newlines is dropped.
    let title = match title.find('\n') {
        Some(start) => {
            let end = title[start..]
                .find(|e: char| return e != '\n')
                .map_or(title.len(), |offset| return start + offset);
            format!("{}{}", &title[..start], &title[end..])
        }
        None => title,
    };

    return title + "\n";
}
