//! Stateful client of the avatar host's public WebSocket API.
//!
//! One receive loop per connection correlates responses to outstanding
//! requests by `requestID` and fans out subscribed events on a broadcast
//! channel so handlers never block the receive loop. Reconnection is the
//! caller's responsibility (`connect_and_authenticate` is safe to retry);
//! on a closed socket every pending request fails with
//! `AvatarError::ConnectionClosed` and the cached token is kept for the
//! next attempt.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

type ConnectedFlag = Arc<AtomicBool>;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::protocol::{Envelope, InboundMessage};
use crate::error::AvatarError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const EVENT_CHANNEL_CAPACITY: usize = 256;

type PendingSlot = oneshot::Sender<Result<Value, AvatarError>>;
type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct AvatarClient {
    endpoint: String,
    plugin_name: String,
    plugin_developer: String,
    plugin_icon: Option<String>,

    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    pending: Arc<Mutex<HashMap<Uuid, PendingSlot>>>,
    events: broadcast::Sender<(String, Value)>,
    connected: ConnectedFlag,
    token: Mutex<Option<String>>,
}

impl AvatarClient {
    pub fn new(endpoint: impl Into<String>, plugin_name: impl Into<String>, plugin_developer: impl Into<String>) -> Self {
        let (events, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            endpoint: endpoint.into(),
            plugin_name: plugin_name.into(),
            plugin_developer: plugin_developer.into(),
            plugin_icon: None,
            outbound: Mutex::new(None),
            pending: Arc::new(Mutex::new(HashMap::new())),
            events,
            connected: Arc::new(AtomicBool::new(false)),
            token: Mutex::new(None),
        }
    }

    pub fn with_icon(mut self, icon_base64: impl Into<String>) -> Self {
        self.plugin_icon = Some(icon_base64.into());
        self
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<(String, Value)> {
        self.events.subscribe()
    }

    /// Opens the socket and starts the background receive loop. Does not
    /// authenticate — call `connect_and_authenticate` for the full
    /// startup sequence.
    async fn connect(&self) -> Result<(), AvatarError> {
        let (ws, _resp) = connect_async(&self.endpoint).await?;
        let (mut write, mut read) = ws.split();

        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        *self.outbound.lock() = Some(tx);
        self.connected.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if write.send(msg).await.is_err() {
                    break;
                }
            }
        });

        let pending = self.pending.clone();
        let events = self.events.clone();
        let connected_flag = self.connected.clone();

        tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        Self::dispatch_inbound(&text, &pending, &events);
                    }
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
            connected_flag.store(false, Ordering::SeqCst);
            let mut pending = pending.lock();
            for (_, slot) in pending.drain() {
                let _ = slot.send(Err(AvatarError::ConnectionClosed));
            }
            warn!("avatar host connection closed");
        });

        Ok(())
    }

    fn dispatch_inbound(text: &str, pending: &Arc<Mutex<HashMap<Uuid, PendingSlot>>>, events: &broadcast::Sender<(String, Value)>) {
        let parsed: InboundMessage = match serde_json::from_str(text) {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "failed to decode avatar host frame, dropping");
                return;
            }
        };

        if let Some(id) = parsed.request_id {
            let slot = pending.lock().remove(&id);
            if let Some(slot) = slot {
                let result = match parsed.error() {
                    Some((err_id, message)) => Err(AvatarError::Api { id: err_id, message }),
                    None => Ok(parsed.data),
                };
                let _ = slot.send(result);
                return;
            }
        }

        // Not a correlated response — either a subscribed event or
        // something we don't recognize. Fan out regardless; handlers
        // with no matching subscription simply never see it.
        let _ = events.send((parsed.message_type, parsed.data));
    }

    async fn send_request(&self, message_type: &str, data: Option<Value>) -> Result<Value, AvatarError> {
        let envelope = Envelope::new(message_type, data);
        let request_id = envelope.request_id;
        let text = serde_json::to_string(&envelope)?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(request_id, tx);

        let sent = {
            let guard = self.outbound.lock();
            match guard.as_ref() {
                Some(sender) => sender.send(Message::Text(text)).is_ok(),
                None => false,
            }
        };
        if !sent {
            self.pending.lock().remove(&request_id);
            return Err(AvatarError::ConnectionClosed);
        }

        match tokio::time::timeout(REQUEST_TIMEOUT, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(AvatarError::Response("response channel dropped".into())),
            Err(_) => {
                self.pending.lock().remove(&request_id);
                Err(AvatarError::Response(format!("{message_type} timed out after {REQUEST_TIMEOUT:?}")))
            }
        }
    }

    /// §4.1 startup sequence: connect, query API state, acquire/reuse a
    /// token, authenticate. Returns `Ok(false)` (not an error) if the
    /// host explicitly rejects the token — the caller decides whether
    /// that is fatal.
    pub async fn connect_and_authenticate(&self, cached_token: Option<String>) -> Result<bool, AvatarError> {
        self.connect().await?;

        let state = self.send_request("APIStateRequest", None).await?;
        if state.get("currentSessionAuthenticated").and_then(Value::as_bool).unwrap_or(false) {
            info!("already authenticated in this session");
            return Ok(true);
        }

        let mut token = cached_token.or_else(|| self.token.lock().clone());
        if token.is_none() {
            let mut data = json!({
                "pluginName": self.plugin_name,
                "pluginDeveloper": self.plugin_developer,
            });
            if let Some(icon) = &self.plugin_icon {
                data["pluginIcon"] = json!(icon);
            }
            let response = self.send_request("AuthenticationTokenRequest", Some(data)).await?;
            token = response.get("authenticationToken").and_then(Value::as_str).map(str::to_string);
        }

        let Some(token) = token else {
            return Err(AvatarError::Response("host did not return an authentication token".into()));
        };

        let auth = self
            .send_request(
                "AuthenticationRequest",
                Some(json!({
                    "pluginName": self.plugin_name,
                    "pluginDeveloper": self.plugin_developer,
                    "authenticationToken": token,
                })),
            )
            .await?;

        let authenticated = auth.get("authenticated").and_then(Value::as_bool).unwrap_or(false);
        if authenticated {
            *self.token.lock() = Some(token);
        }
        Ok(authenticated)
    }

    pub fn cached_token(&self) -> Option<String> {
        self.token.lock().clone()
    }

    pub async fn disconnect(&self) {
        *self.outbound.lock() = None;
        self.connected.store(false, Ordering::SeqCst);
    }

    // --- Typed operations -------------------------------------------------

    pub async fn api_state(&self) -> Result<Value, AvatarError> {
        self.send_request("APIStateRequest", None).await
    }

    pub async fn statistics(&self) -> Result<Value, AvatarError> {
        self.send_request("StatisticsRequest", None).await
    }

    pub async fn folder_info(&self) -> Result<Value, AvatarError> {
        self.send_request("VTSFolderInfoRequest", None).await
    }

    pub async fn current_model(&self) -> Result<Value, AvatarError> {
        self.send_request("CurrentModelRequest", None).await
    }

    pub async fn available_models(&self) -> Result<Vec<Value>, AvatarError> {
        let data = self.send_request("AvailableModelsRequest", None).await?;
        Ok(data.get("availableModels").and_then(Value::as_array).cloned().unwrap_or_default())
    }

    pub async fn load_model(&self, model_id: &str) -> Result<Value, AvatarError> {
        self.send_request("ModelLoadRequest", Some(json!({ "modelID": model_id }))).await
    }

    pub async fn move_model(&self, time_in_seconds: f64, relative: bool, position_x: Option<f64>, position_y: Option<f64>, rotation: Option<f64>, size: Option<f64>) -> Result<Value, AvatarError> {
        self.send_request(
            "MoveModelRequest",
            Some(json!({
                "timeInSeconds": time_in_seconds,
                "valuesAreRelativeToModel": relative,
                "positionX": position_x,
                "positionY": position_y,
                "rotation": rotation,
                "size": size,
            })),
        )
        .await
    }

    pub async fn available_input_parameters(&self) -> Result<Vec<Value>, AvatarError> {
        let data = self.send_request("InputParameterListRequest", None).await?;
        let mut params: Vec<Value> = data.get("defaultParameters").and_then(Value::as_array).cloned().unwrap_or_default();
        params.extend(data.get("customParameters").and_then(Value::as_array).cloned().unwrap_or_default());
        Ok(params)
    }

    pub async fn live2d_parameters(&self) -> Result<Vec<Value>, AvatarError> {
        let data = self.send_request("Live2DParameterListRequest", None).await?;
        Ok(data.get("parameters").and_then(Value::as_array).cloned().unwrap_or_default())
    }

    pub async fn get_parameter_value(&self, parameter_name: &str) -> Result<Value, AvatarError> {
        self.send_request("ParameterValueRequest", Some(json!({ "name": parameter_name }))).await
    }

    pub async fn set_parameter_value(&self, parameter_name: &str, value: f64, mode: &str) -> Result<(), AvatarError> {
        self.send_request(
            "InjectParameterDataRequest",
            Some(json!({
                "parameterValues": [{ "id": parameter_name, "value": value }],
                "mode": mode,
                "faceFound": false,
            })),
        )
        .await?;
        Ok(())
    }

    pub async fn create_parameter(&self, parameter_name: &str, min_value: f64, max_value: f64, default_value: f64, explanation: Option<&str>) -> Result<Value, AvatarError> {
        self.send_request(
            "ParameterCreationRequest",
            Some(json!({
                "parameterName": parameter_name,
                "explanation": explanation.unwrap_or_default(),
                "min": min_value,
                "max": max_value,
                "defaultValue": default_value,
            })),
        )
        .await
    }

    pub async fn get_expressions(&self, expression_file: Option<&str>) -> Result<Vec<Value>, AvatarError> {
        let data = self
            .send_request("ExpressionStateRequest", Some(json!({ "expressionFile": expression_file, "details": true })))
            .await?;
        Ok(data.get("expressions").and_then(Value::as_array).cloned().unwrap_or_default())
    }

    pub async fn activate_expression(&self, expression_file: &str, active: bool) -> Result<(), AvatarError> {
        self.send_request(
            "ExpressionActivationRequest",
            Some(json!({ "expressionFile": expression_file, "active": active })),
        )
        .await?;
        Ok(())
    }

    pub async fn get_hotkeys(&self, model_id: Option<&str>) -> Result<Vec<Value>, AvatarError> {
        let data = self.send_request("HotkeysInCurrentModelRequest", Some(json!({ "modelID": model_id }))).await?;
        Ok(data.get("availableHotkeys").and_then(Value::as_array).cloned().unwrap_or_default())
    }

    pub async fn trigger_hotkey(&self, hotkey_id: &str) -> Result<Value, AvatarError> {
        self.send_request("HotkeyTriggerRequest", Some(json!({ "hotkeyID": hotkey_id }))).await
    }

    pub async fn face_found(&self) -> Result<bool, AvatarError> {
        let data = self.send_request("FaceFoundRequest", None).await?;
        Ok(data.get("found").and_then(Value::as_bool).unwrap_or(false))
    }

    pub async fn subscribe_event(&self, event_name: &str, config: Option<Value>) -> Result<(), AvatarError> {
        self.send_request(
            "EventSubscriptionRequest",
            Some(json!({ "eventName": event_name, "subscribe": true, "config": config.unwrap_or_else(|| json!({})) })),
        )
        .await?;
        Ok(())
    }

    pub async fn unsubscribe_event(&self, event_name: &str) -> Result<(), AvatarError> {
        self.send_request("EventSubscriptionRequest", Some(json!({ "eventName": event_name, "subscribe": false }))).await?;
        Ok(())
    }
}

#[allow(dead_code)]
fn _assert_send_sync() {
    fn assert<T: Send + Sync>() {}
    assert::<AvatarClient>();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_roundtrips_request_id() {
        let env = Envelope::new("ParameterValueRequest", Some(json!({ "name": "FaceAngleX" })));
        let text = serde_json::to_string(&env).unwrap();
        let parsed: InboundMessage = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.request_id, Some(env.request_id));
        assert_eq!(parsed.message_type, "ParameterValueRequest");
    }

    #[test]
    fn inbound_error_is_extracted() {
        let text = r#"{"requestID":"5b1c2b2a-6e2a-4f2e-8b2a-6e2a4f2e8b2a","messageType":"APIError","data":{"errorID":50,"message":"nope"}}"#;
        let parsed: InboundMessage = serde_json::from_str(text).unwrap();
        assert_eq!(parsed.error(), Some((50, "nope".to_string())));
    }
}
