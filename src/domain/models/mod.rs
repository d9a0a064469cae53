mod category;
mod chat;
mod custom_source;
mod query;
mod session;
mod slash_commands;
mod store;
mod upload;

pub use category::*;
pub use chat::*;
pub use custom_source::*;
pub use query::*;
pub use session::*;
pub use slash_commands::*;
pub use store::*;
pub use upload::*;
