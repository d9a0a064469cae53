pub mod attachments;
pub mod custom_sources;
pub mod db;
pub mod ids;
pub mod live_snapshot;
pub mod observable;
pub mod projection;
pub mod session_context;
pub mod summary;
