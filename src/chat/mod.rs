pub mod bridge;
pub mod message;

pub use bridge::{ChatBatchConfig, ChatSource, ChatSourceError, LiveChatBridge};
pub use message::ChatMessage;
