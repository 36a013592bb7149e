//! Crate-wide error taxonomy.
//!
//! Mirrors the error classes named in the orchestration design: transport
//! failures are retried by the affected component, structured API errors
//! and malformed responses are propagated to the caller, and validation
//! failures are turned into a `{status: "error"}` control-frame reply
//! rather than closing the socket.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AvatarError {
    #[error("connection to avatar host closed")]
    ConnectionClosed,

    #[error("avatar host rejected authentication")]
    AuthenticationFailed,

    #[error("avatar host returned error {id}: {message}")]
    Api { id: i32, message: String },

    #[error("request timed out or returned a malformed response: {0}")]
    Response(String),

    #[error("websocket transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("failed to decode avatar host payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("text-to-speech failure: {0}")]
    Tts(#[from] TtsError),
}

#[derive(Debug, Error)]
pub enum TtsError {
    #[error("tts backend returned HTTP {0}")]
    Http(u16),

    #[error("tts request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("tts audio stream ended before playback started")]
    NeverStarted,
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("missing required parameter: {0}")]
    MissingParameter(String),

    #[error("unsupported value expression: {0}")]
    BadExpression(String),

    #[error("template file {0} failed to parse: {1}")]
    Parse(String, String),

    #[error("no template named {0}")]
    NotFound(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// A control-WebSocket frame failed schema validation. Kept as a distinct
/// type (rather than a `String`) so handlers can't accidentally propagate
/// it as a fatal error — it always becomes a `{status: "error"}` reply.
#[derive(Debug, Error)]
#[error("invalid action frame: {0}")]
pub struct ValidationError(pub String);
