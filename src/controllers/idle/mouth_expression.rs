//! Idle mouth micro-expression: small random smile/open wobble.

use async_trait::async_trait;
use rand::Rng;

use crate::controllers::{ControllerContext, IdleCycle};
use crate::error::AvatarError;
use crate::tween::easing;

const IDLE_PRIORITY: i32 = 0;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MouthExpressionConfig {
    pub smile_param: String,
    pub open_param: String,
    pub smile_min: f64,
    pub smile_max: f64,
    pub open_min: f64,
    pub open_max: f64,
    pub min_duration: f64,
    pub max_duration: f64,
}

impl Default for MouthExpressionConfig {
    fn default() -> Self {
        Self {
            smile_param: "MouthSmile".to_string(),
            open_param: "MouthOpen".to_string(),
            smile_min: 0.0,
            smile_max: 0.3,
            open_min: 0.0,
            open_max: 0.1,
            min_duration: 1.5,
            max_duration: 4.0,
        }
    }
}

pub struct MouthExpressionCycle {
    config: MouthExpressionConfig,
}

impl MouthExpressionCycle {
    pub fn new(config: MouthExpressionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl IdleCycle for MouthExpressionCycle {
    async fn run_cycle(&self, ctx: &ControllerContext) -> Result<(), AvatarError> {
        let cfg = &self.config;
        let (smile, open, duration, ease) = {
            let mut rng = rand::thread_rng();
            (
                rng.gen_range(cfg.smile_min..=cfg.smile_max),
                rng.gen_range(cfg.open_min..=cfg.open_max),
                rng.gen_range(cfg.min_duration..=cfg.max_duration),
                easing::weighted_random(),
            )
        };

        tokio::join!(
            ctx.tweener.tween(&cfg.smile_param, smile, duration, ease, None, IDLE_PRIORITY),
            ctx.tweener.tween(&cfg.open_param, open, duration, ease, None, IDLE_PRIORITY),
        );
        Ok(())
    }
}
