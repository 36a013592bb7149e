//! Idle breathing loop: a single parameter oscillates between inhale and exhale extremes.

use async_trait::async_trait;

use crate::controllers::{ControllerContext, IdleCycle};
use crate::error::AvatarError;
use crate::tween::easing::in_out_sine;

const IDLE_PRIORITY: i32 = 0;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BreathingConfig {
    pub breath_param: String,
    pub breath_min: f64,
    pub breath_max: f64,
    pub inhale_duration: f64,
    pub exhale_duration: f64,
}

impl Default for BreathingConfig {
    fn default() -> Self {
        Self {
            breath_param: "FaceAngleY".to_string(),
            breath_min: 0.0,
            breath_max: 1.0,
            inhale_duration: 2.0,
            exhale_duration: 2.5,
        }
    }
}

pub struct BreathingCycle {
    config: BreathingConfig,
}

impl BreathingCycle {
    pub fn new(config: BreathingConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl IdleCycle for BreathingCycle {
    async fn run_cycle(&self, ctx: &ControllerContext) -> Result<(), AvatarError> {
        let cfg = &self.config;
        ctx.tweener
            .tween(&cfg.breath_param, cfg.breath_max, cfg.inhale_duration, in_out_sine, None, IDLE_PRIORITY)
            .await;
        ctx.tweener
            .tween(&cfg.breath_param, cfg.breath_min, cfg.exhale_duration, in_out_sine, None, IDLE_PRIORITY)
            .await;
        Ok(())
    }
}
