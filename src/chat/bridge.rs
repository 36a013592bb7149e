//! Connects to an external live-chat source, batches danmaku, and fans
//! out `ChatMessage` records to `/ws/danmaku` subscribers.
//!
//! The source SDK (transport, auth, QR-code login) is an external
//! collaborator behind the `ChatSource` trait; a concrete connector
//! drives its own credential refresh and persists the result wherever
//! it is told to.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::ws::hub::WsHub;

use super::message::{extract_emotes, ChatMessage, RawChatEvent};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[async_trait]
pub trait ChatSource: Send {
    async fn connect(&mut self) -> Result<(), ChatSourceError>;
    /// Awaits the next event; `None` signals the connection ended.
    async fn next_event(&mut self) -> Option<RawChatEvent>;
}

#[derive(Debug, thiserror::Error)]
pub enum ChatSourceError {
    #[error("chat source connection failed: {0}")]
    Connection(String),
    #[error("chat source authentication failed: {0}")]
    Authentication(String),
}

#[derive(Debug, Clone)]
pub struct ChatBatchConfig {
    pub room: String,
    pub trigger_count: usize,
    pub trigger_time: Duration,
}

impl Default for ChatBatchConfig {
    fn default() -> Self {
        Self { room: "default".to_string(), trigger_count: 5, trigger_time: Duration::from_secs(10) }
    }
}

pub struct LiveChatBridge {
    config: ChatBatchConfig,
    ws_hub: Arc<WsHub>,
}

impl LiveChatBridge {
    pub fn new(config: ChatBatchConfig, ws_hub: Arc<WsHub>) -> Self {
        Self { config, ws_hub }
    }

    /// Runs until the source reports a fatal error or is cancelled.
    /// Connection errors sleep `RECONNECT_DELAY` and retry in place.
    pub async fn run(&self, mut source: Box<dyn ChatSource>) {
        loop {
            if let Err(err) = source.connect().await {
                warn!(%err, "chat source connect failed, retrying");
                tokio::time::sleep(RECONNECT_DELAY).await;
                continue;
            }
            info!(room = %self.config.room, "chat source connected");
            self.drain(&mut *source).await;
            warn!("chat source disconnected, reconnecting");
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    async fn drain(&self, source: &mut dyn ChatSource) {
        let mut queue: Vec<ChatMessage> = Vec::new();
        let mut deadline: Option<tokio::time::Instant> = None;

        loop {
            let sleep = async {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                event = source.next_event() => {
                    let Some(event) = event else {
                        return;
                    };
                    self.handle_event(event, &mut queue, &mut deadline).await;
                }
                _ = sleep => {
                    self.flush(&mut queue);
                    deadline = None;
                }
            }
        }
    }

    async fn handle_event(&self, event: RawChatEvent, queue: &mut Vec<ChatMessage>, deadline: &mut Option<tokio::time::Instant>) {
        match event {
            RawChatEvent::Danmaku { uid, username, text, timestamp } => {
                let (text, image_urls) = extract_emotes(&text);
                let message = ChatMessage {
                    room: self.config.room.clone(),
                    uid,
                    username,
                    text,
                    timestamp,
                    image_urls,
                    is_trigger: false,
                    is_system: false,
                };
                if queue.is_empty() {
                    *deadline = Some(tokio::time::Instant::now() + self.config.trigger_time);
                }
                queue.push(message);
                if queue.len() >= self.config.trigger_count {
                    self.flush(queue);
                    *deadline = None;
                }
            }
            RawChatEvent::Interact { uid, username, timestamp } => {
                let message = ChatMessage {
                    room: self.config.room.clone(),
                    uid,
                    username,
                    text: String::new(),
                    timestamp,
                    image_urls: Vec::new(),
                    is_trigger: false,
                    is_system: true,
                };
                self.ws_hub.broadcast_json_to_path("/ws/danmaku", message).await;
            }
            RawChatEvent::SuperChat { uid, username, text, timestamp } => {
                let message = ChatMessage {
                    room: self.config.room.clone(),
                    uid,
                    username,
                    text,
                    timestamp,
                    image_urls: Vec::new(),
                    is_trigger: true,
                    is_system: true,
                };
                self.ws_hub.broadcast_json_to_path("/ws/danmaku", message).await;
            }
            RawChatEvent::Gift { uid, username, gift_name, count, timestamp } => {
                let message = ChatMessage {
                    room: self.config.room.clone(),
                    uid,
                    username,
                    text: format!("{count}x {gift_name}"),
                    timestamp,
                    image_urls: Vec::new(),
                    is_trigger: true,
                    is_system: true,
                };
                self.ws_hub.broadcast_json_to_path("/ws/danmaku", message).await;
            }
        }
    }

    fn flush(&self, queue: &mut Vec<ChatMessage>) {
        if queue.is_empty() {
            return;
        }
        if let Some(last) = queue.last_mut() {
            last.is_trigger = true;
        }
        let hub = self.ws_hub.clone();
        let batch = std::mem::take(queue);
        tokio::spawn(async move {
            for message in batch {
                hub.broadcast_json_to_path("/ws/danmaku", message).await;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(is_trigger: bool) -> ChatMessage {
        ChatMessage {
            room: "r".into(),
            uid: "1".into(),
            username: "u".into(),
            text: "hi".into(),
            timestamp: 0,
            image_urls: vec![],
            is_trigger,
            is_system: false,
        }
    }

    #[test]
    fn flush_marks_only_last_message() {
        let bridge = LiveChatBridge::new(ChatBatchConfig::default(), Arc::new(WsHub::new()));
        let mut queue = vec![msg(false), msg(false), msg(false)];
        bridge.flush(&mut queue);
        assert!(queue.is_empty());
    }

    #[test]
    fn emote_extraction_strips_image_urls() {
        let (text, urls) = extract_emotes("hello http://example.com/e.png world");
        assert_eq!(text, "hello  world".trim());
        assert_eq!(urls, vec!["http://example.com/e.png".to_string()]);
    }
}
