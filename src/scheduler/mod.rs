//! Ingests user-submitted action batches and dispatches them to handlers.
//!
//! `add_action` only ever touches the pending queue; `execute_queue`
//! snapshots and clears it atomically, then runs the snapshot `loop + 1`
//! times. Within one iteration every action runs concurrently, aligned
//! only by its own `delay`; the next iteration starts only once every
//! task of the current one has resolved.

pub mod action;
pub mod latch;

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::audio::AudioPlayer;
use crate::avatar::AvatarClient;
use crate::error::AvatarError;
use crate::say::SayHandler;
use crate::tween::{easing, Tweener};

pub use action::Action;
pub use latch::TtsLatch;

pub struct ActionScheduler {
    queue: std::sync::Mutex<Vec<Action>>,
    tweener: Arc<Tweener>,
    avatar: Arc<AvatarClient>,
    audio: Arc<AudioPlayer>,
    say_handler: Arc<SayHandler>,
}

impl ActionScheduler {
    pub fn new(tweener: Arc<Tweener>, avatar: Arc<AvatarClient>, audio: Arc<AudioPlayer>, say_handler: Arc<SayHandler>) -> Arc<Self> {
        Arc::new(Self {
            queue: std::sync::Mutex::new(Vec::new()),
            tweener,
            avatar,
            audio,
            say_handler,
        })
    }

    /// Appends to the pending queue; returns an estimated completion time
    /// in seconds. A concurrent `add_action` during `execute_queue` targets
    /// the next batch, never the one currently running (the snapshot taken
    /// at `execute_queue` time owns its own copy).
    pub fn add_action(&self, action: Action) -> f64 {
        let estimate = action.estimated_completion();
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).push(action);
        estimate
    }

    pub async fn execute_queue(self: &Arc<Self>, loop_count: u32) {
        let snapshot: Vec<Action> = {
            let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *queue)
        };

        if snapshot.is_empty() {
            return;
        }

        for _ in 0..=loop_count {
            self.run_iteration(&snapshot).await;
        }
    }

    async fn run_iteration(self: &Arc<Self>, actions: &[Action]) {
        let latch = if actions.iter().any(Action::has_tts_text) { Some(Arc::new(TtsLatch::new())) } else { None };

        let mut tasks = Vec::with_capacity(actions.len());
        for action in actions.iter().cloned() {
            let this = self.clone();
            let latch = latch.clone();
            tasks.push(tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs_f64(action.delay().max(0.0))).await;
                if let Err(err) = this.dispatch(action, latch).await {
                    warn!(%err, "action handler failed, continuing batch");
                }
            }));
        }

        for task in tasks {
            if let Err(err) = task.await {
                warn!(%err, "action task panicked");
            }
        }
    }

    async fn dispatch(&self, action: Action, latch: Option<Arc<TtsLatch>>) -> Result<(), AvatarError> {
        match action {
            Action::Animation(a) => {
                let ease = easing::by_name(&a.easing);
                let priority = a.priority.unwrap_or(0).max(1);
                self.tweener.tween(&a.parameter, a.target, a.duration, ease, a.from, priority).await;
                Ok(())
            }
            Action::Expression(e) => {
                self.avatar.activate_expression(&e.name, true).await?;
                if e.duration > 0.0 {
                    tokio::time::sleep(Duration::from_secs_f64(e.duration)).await;
                    self.avatar.activate_expression(&e.name, false).await?;
                }
                Ok(())
            }
            Action::SoundPlay(s) => {
                self.audio.play(&s).await;
                Ok(())
            }
            Action::Say(s) => self.say_handler.handle(&s, latch).await,
        }
    }
}
