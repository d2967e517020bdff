//! RAII watcher for stop requests made through the state store.
//!
//! A `courier stop` issued from another process only flips `should_stop` in
//! the persisted sending document. [`StopWatch`] polls that flag in the
//! background and cancels the job's [`CancellationToken`], so sleeps that are
//! raced against the token (flood waits, cooldown ticks, per-message delay)
//! end promptly instead of at the next persist.
//!
//! # Example
//! ```rust,no_run
//! use std::time::Duration;
//! use courier_client::{StateStore, StopWatch};
//! use tokio_util::sync::CancellationToken;
//!
//! async fn job(store: StateStore) {
//!     let token = CancellationToken::new();
//!     let _watch = StopWatch::start(store, token.clone(), Duration::from_secs(2));
//!     token.cancelled().await;
//!     // `_watch` is dropped here, polling stops.
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::store::StateStore;

// ─── StopWatch ────────────────────────────────────────────────────────────────

/// Polls the store every `interval` until dropped or the token fires.
pub struct StopWatch {
    stop: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl StopWatch {
    /// Start polling `store` and cancel `token` once a stop is requested.
    pub fn start(store: StateStore, token: CancellationToken, interval: Duration) -> Self {
        let stop  = Arc::new(Notify::new());
        let stop2 = stop.clone();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        match store.load_sending() {
                            Ok(state) if state.is_sending && state.should_stop => {
                                tracing::info!("[stop_watch] stop requested through the store");
                                token.cancel();
                                break;
                            }
                            Ok(_) => {}
                            Err(e) => tracing::warn!("[stop_watch] failed to poll sending state: {e}"),
                        }
                    }
                    _ = token.cancelled() => break,
                    _ = stop2.notified() => break,
                }
            }
        });

        Self { stop, task: Some(task) }
    }

    /// Stop polling without waiting for the drop.
    pub fn cancel(&mut self) {
        self.stop.notify_one();
    }
}

impl Drop for StopWatch {
    fn drop(&mut self) {
        self.stop.notify_one();
        if let Some(t) = self.task.take() {
            t.abort();
        }
    }
}
