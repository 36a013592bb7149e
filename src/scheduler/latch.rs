//! The per-iteration TTS-start latch.
//!
//! Lazily allocated only when an iteration contains at least one `Say`
//! with non-empty `tts_text`. The first such `Say` whose audio actually
//! begins playing sets it; every non-TTS `Say` in the same iteration
//! waits on it before broadcasting its subtitle.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

pub struct TtsLatch {
    set: AtomicBool,
    notify: Notify,
}

impl TtsLatch {
    pub fn new() -> Self {
        Self { set: AtomicBool::new(false), notify: Notify::new() }
    }

    /// Idempotent: only the first caller actually flips the latch.
    pub fn set(&self) {
        if !self.set.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    pub async fn wait(&self) {
        if self.set.load(Ordering::SeqCst) {
            return;
        }
        let notified = self.notify.notified();
        tokio::pin!(notified);
        if self.set.load(Ordering::SeqCst) {
            return;
        }
        notified.await;
    }
}

impl Default for TtsLatch {
    fn default() -> Self {
        Self::new()
    }
}
