//! Controller lifecycle: idle loops and one-shot effects built on the Tweener.
//!
//! `start` is idempotent, `stop` cooperatively cancels and awaits the
//! running task, `stop_without_wait` signals cancellation and returns
//! immediately. A cycle's error is logged and swallowed so the loop keeps
//! running; a connection-lost error from the avatar client ends the
//! controller cleanly without being logged as a failure.

pub mod idle;
pub mod oneshot;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex as AsyncMutex, Notify};
use tokio::task::JoinHandle;
use tracing::{error, warn};

use crate::avatar::AvatarClient;
use crate::error::AvatarError;
use crate::tween::Tweener;

#[derive(Clone)]
pub struct ControllerContext {
    pub tweener: Arc<Tweener>,
    pub avatar: Arc<AvatarClient>,
}

/// One iteration of an idle controller's loop.
#[async_trait]
pub trait IdleCycle: Send + Sync + 'static {
    async fn run_cycle(&self, ctx: &ControllerContext) -> Result<(), AvatarError>;
}

pub struct IdleController {
    name: String,
    ctx: ControllerContext,
    cycle: Box<dyn IdleCycle>,
    running: Arc<AtomicBool>,
    stop: Arc<Notify>,
    task: AsyncMutex<Option<JoinHandle<()>>>,
}

impl IdleController {
    pub fn new(name: impl Into<String>, ctx: ControllerContext, cycle: impl IdleCycle) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            ctx,
            cycle: Box::new(cycle),
            running: Arc::new(AtomicBool::new(false)),
            stop: Arc::new(Notify::new()),
            task: AsyncMutex::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let this = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = this.stop.notified() => break,
                    result = this.cycle.run_cycle(&this.ctx) => {
                        match result {
                            Ok(()) => {}
                            Err(AvatarError::ConnectionClosed) => {
                                break;
                            }
                            Err(err) => {
                                warn!(controller = %this.name, %err, "controller cycle failed, resuming");
                            }
                        }
                    }
                }
            }
            this.running.store(false, Ordering::SeqCst);
        });
        *self.task.lock().await = Some(handle);
    }

    pub async fn stop(self: &Arc<Self>) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        self.stop.notify_one();
        if let Some(handle) = self.task.lock().await.take() {
            if let Err(err) = handle.await {
                error!(controller = %self.name, %err, "idle controller task panicked");
            }
        }
    }

    pub fn stop_without_wait(self: &Arc<Self>) {
        self.stop.notify_one();
    }
}

/// Runs once per invocation, to completion or cancellation.
#[async_trait]
pub trait OneShotController: Send + Sync + 'static {
    fn name(&self) -> &str;
    async fn execute(&self, ctx: &ControllerContext, args: OneShotArgs) -> Result<(), AvatarError>;
}

pub enum OneShotArgs {
    MouthSync { loudness_rx: tokio::sync::watch::Receiver<Option<f64>> },
    ExpressionApply { expressions: Vec<(String, bool)> },
}

pub struct ControllerManager {
    idle: Vec<Arc<IdleController>>,
    oneshot: Vec<Arc<dyn OneShotController>>,
}

impl ControllerManager {
    pub fn new() -> Self {
        Self { idle: Vec::new(), oneshot: Vec::new() }
    }

    pub fn register_idle(&mut self, controller: Arc<IdleController>) {
        self.idle.push(controller);
    }

    pub fn register_oneshot(&mut self, controller: Arc<dyn OneShotController>) {
        self.oneshot.push(controller);
    }

    pub fn get_idle(&self, name: &str) -> Option<Arc<IdleController>> {
        self.idle.iter().find(|c| c.name() == name).cloned()
    }

    pub fn get_oneshot(&self, name: &str) -> Option<Arc<dyn OneShotController>> {
        self.oneshot.iter().find(|c| c.name() == name).cloned()
    }

    pub async fn start_all_idle(&self) {
        for controller in &self.idle {
            controller.start().await;
        }
    }

    pub fn stop_all_idle(&self) {
        for controller in &self.idle {
            controller.stop_without_wait();
        }
    }

    pub async fn pause_idle(&self) {
        self.stop_all_idle();
    }

    pub async fn execute_oneshot(&self, name: &str, ctx: &ControllerContext, args: OneShotArgs) -> Result<(), AvatarError> {
        match self.get_oneshot(name) {
            Some(controller) => controller.execute(ctx, args).await,
            None => {
                warn!(controller = name, "no such one-shot controller");
                Ok(())
            }
        }
    }
}

impl Default for ControllerManager {
    fn default() -> Self {
        Self::new()
    }
}
