//! Idle body sway with optional eye-follow. Z maps to eye-y *inversely*:
//! rising Z sends the gaze down.

use async_trait::async_trait;
use rand::Rng;

use crate::controllers::{ControllerContext, IdleCycle};
use crate::error::AvatarError;
use crate::tween::easing;

const IDLE_PRIORITY: i32 = 0;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BodySwingConfig {
    pub body_x_param: String,
    pub body_z_param: String,
    pub eye_left_x_param: String,
    pub eye_right_x_param: String,
    pub eye_left_y_param: String,
    pub eye_right_y_param: String,
    pub eye_follow: bool,
    pub x_min: f64,
    pub x_max: f64,
    pub z_min: f64,
    pub z_max: f64,
    pub eye_x_min: f64,
    pub eye_x_max: f64,
    pub eye_y_min: f64,
    pub eye_y_max: f64,
    pub min_duration: f64,
    pub max_duration: f64,
}

impl Default for BodySwingConfig {
    fn default() -> Self {
        Self {
            body_x_param: "FaceAngleX".to_string(),
            body_z_param: "FaceAngleZ".to_string(),
            eye_left_x_param: "EyeLeftX".to_string(),
            eye_right_x_param: "EyeRightX".to_string(),
            eye_left_y_param: "EyeLeftY".to_string(),
            eye_right_y_param: "EyeRightY".to_string(),
            eye_follow: true,
            x_min: -8.0,
            x_max: 8.0,
            z_min: -6.0,
            z_max: 6.0,
            eye_x_min: -1.0,
            eye_x_max: 1.0,
            eye_y_min: -1.0,
            eye_y_max: 1.0,
            min_duration: 2.0,
            max_duration: 5.0,
        }
    }
}

pub struct BodySwingCycle {
    config: BodySwingConfig,
}

impl BodySwingCycle {
    pub fn new(config: BodySwingConfig) -> Self {
        Self { config }
    }

    fn lerp(value: f64, from_lo: f64, from_hi: f64, to_lo: f64, to_hi: f64) -> f64 {
        if (from_hi - from_lo).abs() < f64::EPSILON {
            return to_lo;
        }
        let t = (value - from_lo) / (from_hi - from_lo);
        to_lo + t * (to_hi - to_lo)
    }
}

#[async_trait]
impl IdleCycle for BodySwingCycle {
    async fn run_cycle(&self, ctx: &ControllerContext) -> Result<(), AvatarError> {
        let cfg = &self.config;
        let (target_x, target_z, duration, ease) = {
            let mut rng = rand::thread_rng();
            (
                rng.gen_range(cfg.x_min..=cfg.x_max),
                rng.gen_range(cfg.z_min..=cfg.z_max),
                rng.gen_range(cfg.min_duration..=cfg.max_duration),
                easing::weighted_random(),
            )
        };

        let mut futures: Vec<std::pin::Pin<Box<dyn std::future::Future<Output = bool> + Send + '_>>> = vec![
            Box::pin(ctx.tweener.tween(&cfg.body_x_param, target_x, duration, ease, None, IDLE_PRIORITY)),
            Box::pin(ctx.tweener.tween(&cfg.body_z_param, target_z, duration, ease, None, IDLE_PRIORITY)),
        ];

        if cfg.eye_follow {
            let eye_x = Self::lerp(target_x, cfg.x_min, cfg.x_max, cfg.eye_x_min, cfg.eye_x_max);
            // Inverted: rising Z maps to a decreasing eye-y (gaze down).
            let eye_y = Self::lerp(target_z, cfg.z_min, cfg.z_max, cfg.eye_y_max, cfg.eye_y_min);
            futures.push(Box::pin(ctx.tweener.tween(&cfg.eye_left_x_param, eye_x, duration, ease, None, IDLE_PRIORITY)));
            futures.push(Box::pin(ctx.tweener.tween(&cfg.eye_right_x_param, eye_x, duration, ease, None, IDLE_PRIORITY)));
            futures.push(Box::pin(ctx.tweener.tween(&cfg.eye_left_y_param, eye_y, duration, ease, None, IDLE_PRIORITY)));
            futures.push(Box::pin(ctx.tweener.tween(&cfg.eye_right_y_param, eye_y, duration, ease, None, IDLE_PRIORITY)));
        }

        futures::future::join_all(futures).await;
        Ok(())
    }
}
