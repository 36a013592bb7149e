//! Idle blink loop: both eyes close together, hold, open together, rest.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::controllers::{ControllerContext, IdleCycle};
use crate::error::AvatarError;
use crate::tween::easing::{out_sine, in_sine};

const IDLE_PRIORITY: i32 = 0;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BlinkConfig {
    pub left_eye_param: String,
    pub right_eye_param: String,
    pub open_min: f64,
    pub open_max: f64,
    pub close_duration: f64,
    pub closed_hold: f64,
    pub open_duration: f64,
    pub min_interval: f64,
    pub max_interval: f64,
}

impl Default for BlinkConfig {
    fn default() -> Self {
        Self {
            left_eye_param: "EyeOpenLeft".to_string(),
            right_eye_param: "EyeOpenRight".to_string(),
            open_min: 0.0,
            open_max: 1.0,
            close_duration: 0.1,
            closed_hold: 0.08,
            open_duration: 0.15,
            min_interval: 2.0,
            max_interval: 6.0,
        }
    }
}

pub struct BlinkCycle {
    config: BlinkConfig,
}

impl BlinkCycle {
    pub fn new(config: BlinkConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl IdleCycle for BlinkCycle {
    async fn run_cycle(&self, ctx: &ControllerContext) -> Result<(), AvatarError> {
        let cfg = &self.config;
        let tweener = &ctx.tweener;

        tokio::join!(
            tweener.tween(&cfg.left_eye_param, cfg.open_min, cfg.close_duration, out_sine, None, IDLE_PRIORITY),
            tweener.tween(&cfg.right_eye_param, cfg.open_min, cfg.close_duration, out_sine, None, IDLE_PRIORITY),
        );

        tokio::time::sleep(Duration::from_secs_f64(cfg.closed_hold)).await;

        tokio::join!(
            tweener.tween(&cfg.left_eye_param, cfg.open_max, cfg.open_duration, in_sine, None, IDLE_PRIORITY),
            tweener.tween(&cfg.right_eye_param, cfg.open_max, cfg.open_duration, in_sine, None, IDLE_PRIORITY),
        );

        let rest = {
            let mut rng = rand::thread_rng();
            rng.gen_range(cfg.min_interval..=cfg.max_interval)
        };
        tokio::time::sleep(Duration::from_secs_f64(rest)).await;
        Ok(())
    }
}
