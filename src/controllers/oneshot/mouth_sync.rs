//! Lip-sync: consumes loudness samples from a queue and drives the mouth
//! open parameter in lockstep with speech audio.
//!
//! The LUFS threshold convention is decoder-specific; it is exposed here
//! as a plain configurable tunable rather than assumed.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::controllers::{ControllerContext, OneShotArgs, OneShotController};
use crate::error::AvatarError;
use crate::tween::easing::{linear, out_quad};

const MOUTH_SYNC_PRIORITY: i32 = 2;
const SAMPLE_PERIOD: Duration = Duration::from_millis(50);
const RELEASE_DURATION: f64 = 0.2;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MouthSyncConfig {
    pub open_param: String,
    pub open_min: f64,
    pub open_max: f64,
    pub loudness_threshold: f64,
}

impl Default for MouthSyncConfig {
    fn default() -> Self {
        Self {
            open_param: "MouthOpen".to_string(),
            open_min: 0.0,
            open_max: 1.0,
            loudness_threshold: -35.0,
        }
    }
}

pub struct MouthSyncController {
    config: MouthSyncConfig,
}

impl MouthSyncController {
    pub fn new(config: MouthSyncConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl OneShotController for MouthSyncController {
    fn name(&self) -> &str {
        "MouthSync"
    }

    async fn execute(&self, ctx: &ControllerContext, args: OneShotArgs) -> Result<(), AvatarError> {
        let mut loudness_rx = match args {
            OneShotArgs::MouthSync { loudness_rx } => loudness_rx,
            _ => return Ok(()),
        };

        let cfg = &self.config;
        loop {
            // End-of-stream has no sentinel value on a watch channel; it's
            // signalled by the sender dropping, which `changed()` surfaces
            // as an error. A bare timeout just means no new sample arrived
            // this period — keep driving the mouth from the last one.
            match tokio::time::timeout(SAMPLE_PERIOD, loudness_rx.changed()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => break,
                Err(_) => {}
            }

            let Some(lufs) = *loudness_rx.borrow_and_update() else {
                break;
            };

            let target = if lufs >= cfg.loudness_threshold {
                rand::thread_rng().gen_range(cfg.open_min..=cfg.open_max)
            } else {
                cfg.open_min
            };

            ctx.tweener.tween(&cfg.open_param, target, 0.05, linear, None, MOUTH_SYNC_PRIORITY).await;
        }

        ctx.tweener
            .tween(&cfg.open_param, cfg.open_min, RELEASE_DURATION, out_quad, None, MOUTH_SYNC_PRIORITY)
            .await;
        Ok(())
    }
}
