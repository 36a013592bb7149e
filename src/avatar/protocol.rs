//! Wire shapes for the avatar host's JSON-over-WebSocket API.
//!
//! The host is a fixed external vendor API (see `spec.md` §1, "Out of
//! scope") — every request carries `apiName`/`apiVersion`/`requestID`/
//! `messageType`, every response echoes `requestID` and carries an
//! `errorID` inside `data` on failure. These types only describe that
//! envelope; `data` payloads stay `serde_json::Value` since the set of
//! request/response shapes is fixed by the vendor, not by us.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const API_NAME: &str = "VTubeStudioPublicAPI";
pub const API_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize)]
pub struct Envelope<'a> {
    #[serde(rename = "apiName")]
    pub api_name: &'a str,
    #[serde(rename = "apiVersion")]
    pub api_version: &'a str,
    #[serde(rename = "requestID")]
    pub request_id: Uuid,
    #[serde(rename = "messageType")]
    pub message_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl<'a> Envelope<'a> {
    pub fn new(message_type: &'a str, data: Option<Value>) -> Self {
        Self {
            api_name: API_NAME,
            api_version: API_VERSION,
            request_id: Uuid::new_v4(),
            message_type,
            data,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "requestID")]
    pub request_id: Option<Uuid>,
    #[serde(rename = "messageType")]
    pub message_type: String,
    #[serde(default)]
    pub data: Value,
}

impl InboundMessage {
    pub fn error(&self) -> Option<(i32, String)> {
        let id = self.data.get("errorID")?.as_i64()? as i32;
        let message = self
            .data
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error")
            .to_string();
        Some((id, message))
    }
}
