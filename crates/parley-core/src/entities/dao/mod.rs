pub mod conversation;
pub mod message;

pub use conversation::{Conversation, derive_title};
pub use message::{Message, Role};
