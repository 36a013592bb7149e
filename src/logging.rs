//! Tracing setup.
//!
//! One global subscriber, configured from `RUST_LOG` (defaulting to
//! `info`), initialized once at startup.

use tracing_subscriber::{EnvFilter, FmtSubscriber};

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        // Already installed (e.g. in tests run in the same process) — not fatal.
        tracing::warn!("tracing subscriber already installed");
    }
}
