//! Couples TTS synthesis to the lip-sync controller and subtitle broadcast.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;
use serde_json::json;
use tokio::sync::{watch, Mutex as AsyncMutex, Notify};
use tracing::warn;
use uuid::Uuid;

use crate::controllers::{ControllerContext, ControllerManager, OneShotArgs};
use crate::error::{AvatarError, TtsError};
use crate::scheduler::action::SayAction;
use crate::scheduler::TtsLatch;
use crate::ws::hub::WsHub;

use super::tts_client::TtsClient;

#[derive(Debug, Clone)]
pub struct SayConfig {
    pub tts_model: String,
    pub tts_lang: String,
}

impl Default for SayConfig {
    fn default() -> Self {
        Self { tts_model: "default".to_string(), tts_lang: "en".to_string() }
    }
}

struct Signal {
    fired: AtomicBool,
    notify: Notify,
}

impl Signal {
    fn new() -> Self {
        Self { fired: AtomicBool::new(false), notify: Notify::new() }
    }

    fn fire(&self) {
        if !self.fired.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    async fn wait(&self) {
        if self.fired.load(Ordering::SeqCst) {
            return;
        }
        let notified = self.notify.notified();
        tokio::pin!(notified);
        if self.fired.load(Ordering::SeqCst) {
            return;
        }
        notified.await;
    }

    fn is_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

pub struct SayHandler {
    config: SayConfig,
    tts: TtsClient,
    controllers: Arc<ControllerManager>,
    ctx: ControllerContext,
    ws_hub: Arc<WsHub>,
    tts_runner_lock: AsyncMutex<()>,
}

impl SayHandler {
    pub fn new(config: SayConfig, tts: TtsClient, controllers: Arc<ControllerManager>, ctx: ControllerContext, ws_hub: Arc<WsHub>) -> Self {
        Self { config, tts, controllers, ctx, ws_hub, tts_runner_lock: AsyncMutex::new(()) }
    }

    pub async fn handle(&self, action: &SayAction, latch: Option<Arc<TtsLatch>>) -> Result<(), AvatarError> {
        if action.tts_text.is_empty() {
            if let Some(latch) = &latch {
                latch.wait().await;
            }
            self.broadcast_say(action).await;
            return Ok(());
        }

        let _permit = self.tts_runner_lock.lock().await;

        let (loudness_tx, loudness_rx) = watch::channel::<Option<f64>>(None);
        let mouth_sync_ctx = self.ctx.clone();
        let controllers = self.controllers.clone();
        let mouth_sync_task = tokio::spawn(async move {
            let _ = controllers.execute_oneshot("MouthSync", &mouth_sync_ctx, OneShotArgs::MouthSync { loudness_rx }).await;
        });

        let started = Arc::new(Signal::new());
        let finished = Arc::new(Signal::new());

        let request_id = Uuid::new_v4().to_string();
        match self.tts.stream(&self.config.tts_model, &action.tts_text, &self.config.tts_lang, &request_id).await {
            Ok(mut chunks) => {
                let started = started.clone();
                let finished = finished.clone();
                tokio::spawn(async move {
                    let mut first = true;
                    while let Some(chunk) = chunks.next().await {
                        match chunk {
                            Ok(bytes) => {
                                if first {
                                    started.fire();
                                    first = false;
                                }
                                let lufs = estimate_lufs(&bytes);
                                // `watch::Sender::send` always overwrites the current
                                // value rather than queuing, so a sample that arrives
                                // before MouthSync drains the last one simply replaces
                                // it (drop-oldest) instead of being rejected.
                                let _ = loudness_tx.send(Some(lufs));
                            }
                            Err(err) => {
                                warn!(%err, "tts stream error");
                                break;
                            }
                        }
                    }
                    finished.fire();
                });
            }
            Err(TtsError::Http(status)) => {
                warn!(status, "tts backend returned an error status");
                finished.fire();
            }
            Err(err) => {
                warn!(%err, "tts request failed");
                finished.fire();
            }
        }

        tokio::select! {
            _ = started.wait() => {}
            _ = finished.wait() => {}
        }

        if finished.is_fired() && !started.is_fired() {
            let _ = mouth_sync_task.await;
            return Err(TtsError::NeverStarted.into());
        }

        if let Some(latch) = &latch {
            latch.set();
        }

        self.broadcast_say(action).await;

        finished.wait().await;
        self.ws_hub.broadcast_json_to_path("/ws/subtitles", json!({ "type": "finished" })).await;

        let _ = mouth_sync_task.await;
        Ok(())
    }

    async fn broadcast_say(&self, action: &SayAction) {
        self.ws_hub
            .broadcast_json_to_path(
                "/ws/subtitles",
                json!({
                    "type": "say",
                    "text": action.text,
                    "tts_text": action.tts_text,
                }),
            )
            .await;
    }
}

/// A crude perceptual-loudness estimate: RMS of the chunk's bytes
/// interpreted as little-endian 16-bit PCM, expressed in decibels
/// relative to full scale. This is the "LUFS" convention exposed to
/// MouthSync's threshold tunable — not a true ITU-R BS.1770 measurement.
fn estimate_lufs(bytes: &[u8]) -> f64 {
    if bytes.len() < 2 {
        return -100.0;
    }
    let samples: Vec<i16> = bytes.chunks_exact(2).map(|c| i16::from_le_bytes([c[0], c[1]])).collect();
    if samples.is_empty() {
        return -100.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64).powi(2)).sum();
    let rms = (sum_sq / samples.len() as f64).sqrt();
    if rms <= 0.0 {
        -100.0
    } else {
        20.0 * (rms / i16::MAX as f64).log10()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_estimates_very_low_loudness() {
        let silence = vec![0u8; 64];
        assert!(estimate_lufs(&silence) < -50.0);
    }

    #[test]
    fn full_scale_square_wave_estimates_near_zero() {
        let mut bytes = Vec::new();
        for i in 0..100 {
            let v: i16 = if i % 2 == 0 { i16::MAX } else { i16::MIN };
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        assert!(estimate_lufs(&bytes) > -3.0);
    }
}
