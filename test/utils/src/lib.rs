use serde_json::json;
use serde_json::Value;

/// Assistant reply that closes the clarification phase of a chat.
pub fn final_response(summary: &str) -> String {
    return format!(
        "Ok, thanks for clarifying! {summary}\n\nPlease click the button below to start generating the audiocast."
    );
}

/// A session document as the server stores it.
pub fn session_document(id: &str, category: &str) -> Value {
    return json!({
        "id": id,
        "category": category,
        "chats": [
            { "id": "c1", "role": "user", "content": "A show about whales" },
            { "id": "c2", "role": "assistant", "content": final_response("A show about whales.") },
        ],
        "completed": true,
        "metadata": {
            "source": "Whales are large marine mammals.",
            "transcript": "Host: Welcome to the show.",
            "title": "Whale tales",
        },
        "created_at": "2024-05-01T10:00:00.000Z",
    });
}

/// A pasted-text custom source document.
pub fn copy_paste_source(id: &str, session_id: &str, content: &str, created_at: &str) -> Value {
    return json!({
        "id": id,
        "source_type": "copy/paste",
        "content_type": "text/plain",
        "content": content,
        "session_id": session_id,
        "created_at": created_at,
    });
}

/// A link custom source document.
pub fn link_source(id: &str, session_id: &str, url: &str, created_at: &str) -> Value {
    return json!({
        "id": id,
        "source_type": "link",
        "url": url,
        "content_type": "text/html",
        "content": format!("Extracted from {url}"),
        "title": "Linked page",
        "session_id": session_id,
        "created_at": created_at,
    });
}
