pub mod document;
pub mod message;

pub use document::ConversationDocument;
pub use message::{Message, Role};
