pub mod handler;
pub mod tts_client;

pub use handler::{SayConfig, SayHandler};
pub use tts_client::TtsClient;
