//! Queued actions dispatched by the ActionScheduler.

use serde::{Deserialize, Serialize};
use serde_json::Map;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SayAction {
    pub text: String,
    #[serde(default)]
    pub tts_text: String,
    pub volume: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationAction {
    pub parameter: String,
    #[serde(default)]
    pub from: Option<f64>,
    pub target: f64,
    pub duration: f64,
    #[serde(default)]
    pub delay: f64,
    #[serde(default = "default_easing")]
    pub easing: String,
    #[serde(default)]
    pub priority: Option<i32>,
}

fn default_easing() -> String {
    "linear".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpressionAction {
    pub name: String,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub delay: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoundPlayAction {
    pub path: String,
    #[serde(default)]
    pub duration: f64,
    #[serde(default = "default_volume")]
    pub volume: f64,
    #[serde(default = "default_speed")]
    pub speed: f64,
    #[serde(default)]
    pub delay: f64,
}

fn default_volume() -> f64 {
    1.0
}

fn default_speed() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayPreformAnimationAction {
    pub name: String,
    #[serde(default)]
    pub params: Map<String, serde_json::Value>,
    #[serde(default)]
    pub delay: f64,
}

/// One element of an action batch. Carries an implicit insertion-order
/// index by virtue of its position in the scheduler's queue; temporal
/// order within a batch is governed by each action's own `delay`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Action {
    Say(SayAction),
    Animation(AnimationAction),
    Expression(ExpressionAction),
    SoundPlay(SoundPlayAction),
}

impl Action {
    pub fn delay(&self) -> f64 {
        match self {
            Action::Say(_) => 0.0,
            Action::Animation(a) => a.delay,
            Action::Expression(a) => a.delay,
            Action::SoundPlay(a) => a.delay,
        }
    }

    /// Estimated completion time added by `add_action`: delay plus any
    /// statically-known duration. `Say` returns 0 — true duration is not
    /// known until TTS streams.
    pub fn estimated_completion(&self) -> f64 {
        match self {
            Action::Say(_) => 0.0,
            Action::Animation(a) => a.delay + a.duration,
            Action::Expression(a) => a.delay + a.duration,
            Action::SoundPlay(a) => a.delay + a.duration,
        }
    }

    pub fn has_tts_text(&self) -> bool {
        matches!(self, Action::Say(s) if !s.tts_text.is_empty())
    }
}
