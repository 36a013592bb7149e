//! HTTP + WebSocket front door: the control socket, the two broadcast
//! sockets, and the static asset mount.
//!
//! `/ws/animate_control` is the only socket that reads frames; `/ws/subtitles`
//! and `/ws/danmaku` are pure fan-out and only need a connection registered
//! in the hub so `WsHub::broadcast_*` can reach them.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::audio::AudioPlayer;
use crate::avatar::AvatarClient;
use crate::error::ValidationError;
use crate::preformed::AnimationTemplatePlayer;
use crate::scheduler::action::{AnimationAction, ExpressionAction, PlayPreformAnimationAction, SayAction, SoundPlayAction};
use crate::scheduler::{Action, ActionScheduler};
use crate::ws::hub::WsHub;

const CONTROL_PATH: &str = "/ws/animate_control";
const SUBTITLES_PATH: &str = "/ws/subtitles";
const DANMAKU_PATH: &str = "/ws/danmaku";

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<ActionScheduler>,
    pub templates: Arc<AnimationTemplatePlayer>,
    pub avatar: Arc<AvatarClient>,
    pub audio: Arc<AudioPlayer>,
    pub ws_hub: Arc<WsHub>,
}

pub fn router(state: AppState, static_dir: PathBuf) -> Router {
    Router::new()
        .route(CONTROL_PATH, get(control_handler))
        .route(SUBTITLES_PATH, get(subtitles_handler))
        .route(DANMAKU_PATH, get(danmaku_handler))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// One inbound control-socket frame. Mirrors the `Action` wire shape for
/// the action-bearing variants; the remaining variants are queries or
/// commands that don't go through the action queue.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
enum ControlFrame {
    Say(SayAction),
    Animation(AnimationAction),
    Expression(ExpressionAction),
    SoundPlay(SoundPlayAction),
    Execute {
        #[serde(rename = "loop", default)]
        loop_count: u32,
    },
    PlayPreformAnimation(PlayPreformAnimationAction),
    ListPreformedAnimations,
    GetExpressions,
    GetSounds,
}

#[derive(Serialize)]
struct ControlReply {
    status: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl ControlReply {
    fn ok(message: impl Into<String>, data: Option<Value>) -> Self {
        Self { status: "success", message: message.into(), data }
    }

    fn err(message: impl Into<String>) -> Self {
        Self { status: "error", message: message.into(), data: None }
    }
}

async fn control_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_control_socket(socket, state))
}

async fn handle_control_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let conn_id = state.ws_hub.connect(CONTROL_PATH, tx);

    let forward = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        let Message::Text(text) = message else { continue };
        let reply = handle_control_frame(&state, &text).await;
        let envelope = match serde_json::to_string(&reply) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(%err, "failed to serialize control reply");
                continue;
            }
        };
        if state.ws_hub.send_to_connection(CONTROL_PATH, conn_id, Message::Text(envelope)).is_err() {
            break;
        }
    }

    state.ws_hub.disconnect(CONTROL_PATH, conn_id);
    forward.abort();
}

async fn handle_control_frame(state: &AppState, text: &str) -> ControlReply {
    let frame: ControlFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(err) => return ControlReply::err(ValidationError(err.to_string()).to_string()),
    };

    match frame {
        ControlFrame::Say(action) => {
            let estimate = state.scheduler.add_action(Action::Say(action));
            ControlReply::ok("queued", Some(json!({ "estimated_completion": estimate })))
        }
        ControlFrame::Animation(action) => {
            let estimate = state.scheduler.add_action(Action::Animation(action));
            ControlReply::ok("queued", Some(json!({ "estimated_completion": estimate })))
        }
        ControlFrame::Expression(action) => {
            let estimate = state.scheduler.add_action(Action::Expression(action));
            ControlReply::ok("queued", Some(json!({ "estimated_completion": estimate })))
        }
        ControlFrame::SoundPlay(action) => {
            let estimate = state.scheduler.add_action(Action::SoundPlay(action));
            ControlReply::ok("queued", Some(json!({ "estimated_completion": estimate })))
        }
        ControlFrame::Execute { loop_count } => {
            let scheduler = state.scheduler.clone();
            tokio::spawn(async move {
                scheduler.execute_queue(loop_count).await;
            });
            ControlReply::ok("executing", None)
        }
        ControlFrame::PlayPreformAnimation(action) => match state.templates.play(&action.name, &action.params, action.delay) {
            Ok(estimate) => ControlReply::ok("queued", Some(json!({ "estimated_completion": estimate }))),
            Err(err) => {
                warn!(name = %action.name, %err, "preformed animation expansion failed");
                ControlReply::ok("queued", Some(json!({ "estimated_completion": 0.0 })))
            }
        },
        ControlFrame::ListPreformedAnimations => {
            let list = state.templates.list_preformed_animations();
            ControlReply::ok("ok", Some(json!(list)))
        }
        ControlFrame::GetExpressions => match state.avatar.get_expressions(None).await {
            Ok(expressions) => ControlReply::ok("ok", Some(json!(expressions))),
            Err(err) => ControlReply::err(format!("failed to fetch expressions: {err}")),
        },
        ControlFrame::GetSounds => {
            let sounds = state.audio.list_sounds();
            ControlReply::ok("ok", Some(json!(sounds)))
        }
    }
}

async fn subtitles_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| fanout_socket(socket, state.ws_hub, SUBTITLES_PATH))
}

async fn danmaku_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| fanout_socket(socket, state.ws_hub, DANMAKU_PATH))
}

/// A pure broadcast subscriber: registers in the hub, forwards hub
/// messages to the socket, and drops its registration once the peer
/// disconnects or sends anything (these sockets take no input).
async fn fanout_socket(socket: WebSocket, ws_hub: Arc<WsHub>, path: &'static str) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let conn_id = ws_hub.connect(path, tx);
    info!(path, conn_id, "fan-out subscriber connected");

    let forward = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    while stream.next().await.is_some() {}

    ws_hub.disconnect(path, conn_id);
    forward.abort();
}
