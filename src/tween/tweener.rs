//! Priority-arbitrated parameter tweening with a keep-alive refresh loop.
//!
//! One mutex guards `ControlledParameters` and `ActiveTweens` together;
//! it is only ever held across bookkeeping, never across a write to the
//! avatar host. A displaced tween is not forcibly aborted — its step loop
//! re-checks ownership by generation number before every write and before
//! removing its own entry, so a superseded task simply stops mutating
//! state on its next iteration instead of being torn down mid-flight.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::easing::EasingFn;
use crate::avatar::AvatarClient;

const DEFAULT_FPS: f64 = 60.0;
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_millis(800);

struct ActiveTween {
    generation: u64,
    priority: i32,
}

struct Inner {
    controlled: HashMap<String, f64>,
    active: HashMap<String, ActiveTween>,
    next_generation: u64,
}

pub struct Tweener {
    avatar: Arc<AvatarClient>,
    inner: Mutex<Inner>,
    keep_alive_stop: Notify,
}

impl Tweener {
    pub fn new(avatar: Arc<AvatarClient>) -> Arc<Self> {
        Arc::new(Self {
            avatar,
            inner: Mutex::new(Inner {
                controlled: HashMap::new(),
                active: HashMap::new(),
                next_generation: 0,
            }),
            keep_alive_stop: Notify::new(),
        })
    }

    /// Request a tween of `param` to `end` over `duration` seconds, with
    /// `start` defaulting to the parameter's last committed value (or 0.0
    /// if never set). Returns `false` if a higher-or-equal priority tween
    /// is already active on this parameter (rejected, not an error).
    pub async fn tween(self: &Arc<Self>, param: &str, end: f64, duration: f64, easing: EasingFn, start: Option<f64>, priority: i32) -> bool {
        let (generation, start_value, fast_path) = {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(existing) = inner.active.get(param) {
                if priority <= existing.priority {
                    return false;
                }
            }
            let generation = inner.next_generation;
            inner.next_generation += 1;
            let start_value = start.unwrap_or_else(|| inner.controlled.get(param).copied().unwrap_or(0.0));
            let fast = duration <= 0.0 || (start_value - end).abs() < f64::EPSILON;
            if fast {
                inner.controlled.insert(param.to_string(), end);
                inner.active.remove(param);
            } else {
                inner.active.insert(param.to_string(), ActiveTween { generation, priority });
            }
            (generation, start_value, fast)
        };

        if fast_path {
            self.write_to_host(param, end).await;
            return true;
        }

        let steps = (duration * DEFAULT_FPS).round().max(1.0) as i64;
        let interval = Duration::from_secs_f64(duration / steps as f64);
        let start_time = Instant::now();

        for k in 1..=steps {
            let t = k as f64 / steps as f64;
            let v = start_value + (end - start_value) * easing(t);

            let owns_param = {
                let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
                match inner.active.get(param) {
                    Some(active) if active.generation == generation => {
                        inner.controlled.insert(param.to_string(), v);
                        if k == steps {
                            inner.active.remove(param);
                        }
                        true
                    }
                    _ => false,
                }
            };

            if !owns_param {
                debug!(param, "tween superseded, stopping");
                return true;
            }

            self.write_to_host(param, v).await;
            tokio::time::sleep_until(start_time + interval * k as u32).await;
        }

        true
    }

    /// Immediately set a parameter outside the tween admission protocol,
    /// displacing any active tween on it regardless of priority.
    pub async fn set_immediate(self: &Arc<Self>, param: &str, value: f64) {
        {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner.active.remove(param);
            inner.controlled.insert(param.to_string(), value);
        }
        self.write_to_host(param, value).await;
    }

    async fn write_to_host(&self, param: &str, value: f64) {
        if let Err(err) = self.avatar.set_parameter_value(param, value, "set").await {
            warn!(param, %err, "failed to write parameter to avatar host");
        }
    }

    /// Clears `ControlledParameters`. In-flight tweens are left running —
    /// they will stop refreshing the cleared entry on their own cleanup
    /// paths once they notice it is gone.
    pub fn release_all(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.controlled.clear();
    }

    pub fn current_value(&self, param: &str) -> Option<f64> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.controlled.get(param).copied()
    }

    /// Spawns the keep-alive task. Call once at startup; `stop_keep_alive`
    /// cancels it.
    pub fn start_keep_alive(self: &Arc<Self>) {
        let this = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(KEEP_ALIVE_INTERVAL);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        this.keep_alive_tick().await;
                    }
                    _ = this.keep_alive_stop.notified() => {
                        debug!("keep-alive loop stopped");
                        return;
                    }
                }
            }
        });
    }

    pub fn stop_keep_alive(&self) {
        self.keep_alive_stop.notify_one();
    }

    async fn keep_alive_tick(&self) {
        let to_refresh: Vec<(String, f64)> = {
            let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner
                .controlled
                .iter()
                .filter(|(param, _)| !inner.active.contains_key(*param))
                .map(|(param, value)| (param.clone(), *value))
                .collect()
        };
        for (param, value) in to_refresh {
            self.write_to_host(&param, value).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> Arc<AvatarClient> {
        Arc::new(AvatarClient::new("ws://127.0.0.1:0", "test-plugin", "test-dev"))
    }

    #[tokio::test]
    async fn fast_path_writes_end_value_without_looping() {
        let tweener = Tweener::new(test_client());
        let admitted = tweener.tween("FaceAngleX", 5.0, 0.0, crate::tween::easing::linear, None, 0).await;
        assert!(admitted);
        assert_eq!(tweener.current_value("FaceAngleX"), Some(5.0));
    }

    #[tokio::test]
    async fn equal_priority_is_rejected() {
        let tweener = Tweener::new(test_client());
        let t1 = tweener.clone();
        tokio::spawn(async move {
            t1.tween("FaceAngleX", 10.0, 1.0, crate::tween::easing::linear, Some(0.0), 1).await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        let admitted = tweener.tween("FaceAngleX", -10.0, 0.1, crate::tween::easing::linear, Some(0.0), 1).await;
        assert!(!admitted);
    }

    #[tokio::test]
    async fn higher_priority_displaces_lower() {
        let tweener = Tweener::new(test_client());
        let t1 = tweener.clone();
        tokio::spawn(async move {
            t1.tween("FaceAngleX", 10.0, 2.0, crate::tween::easing::linear, Some(0.0), 0).await;
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        let admitted = tweener.tween("FaceAngleX", -10.0, 0.05, crate::tween::easing::linear, Some(0.0), 1).await;
        assert!(admitted);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(tweener.current_value("FaceAngleX"), Some(-10.0));
    }

    #[tokio::test]
    async fn release_all_clears_controlled_parameters() {
        let tweener = Tweener::new(test_client());
        tweener.tween("FaceAngleX", 5.0, 0.0, crate::tween::easing::linear, None, 0).await;
        assert!(tweener.current_value("FaceAngleX").is_some());
        tweener.release_all();
        assert_eq!(tweener.current_value("FaceAngleX"), None);
    }
}
