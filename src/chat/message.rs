//! The uniform chat message record fanned out to `/ws/danmaku` subscribers.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub room: String,
    pub uid: String,
    pub username: String,
    pub text: String,
    pub timestamp: i64,
    #[serde(rename = "image_urls")]
    pub image_urls: Vec<String>,
    #[serde(rename = "is_trigger")]
    pub is_trigger: bool,
    #[serde(rename = "is_system")]
    pub is_system: bool,
}

/// A raw event from the external live-chat source, prior to batching.
/// The source SDK itself is out of scope; this is the boundary a concrete
/// connector must translate its wire events into.
#[derive(Debug, Clone)]
pub enum RawChatEvent {
    Danmaku { uid: String, username: String, text: String, timestamp: i64 },
    Interact { uid: String, username: String, timestamp: i64 },
    SuperChat { uid: String, username: String, text: String, timestamp: i64 },
    Gift { uid: String, username: String, gift_name: String, count: u32, timestamp: i64 },
}

/// Extracts inline emote URLs from danmaku text, returning the stripped
/// text and the extracted URLs in order of appearance.
pub fn extract_emotes(text: &str) -> (String, Vec<String>) {
    let mut urls = Vec::new();
    let mut stripped = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("http") {
        stripped.push_str(&rest[..start]);
        let candidate = &rest[start..];
        let end = candidate.find(char::is_whitespace).unwrap_or(candidate.len());
        let (url, after) = candidate.split_at(end);
        if url.ends_with(".png") || url.ends_with(".jpg") || url.ends_with(".gif") || url.ends_with(".webp") {
            urls.push(url.to_string());
        } else {
            stripped.push_str(url);
        }
        rest = after;
    }
    stripped.push_str(rest);
    (stripped.trim().to_string(), urls)
}
