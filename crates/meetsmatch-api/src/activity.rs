//! Fire-and-forget last-active updates.
//!
//! Callers hand a user id to [`ActivityTracker::record`] and move on. A
//! single worker drains a bounded queue into the store. Each user is written
//! at most once per de-duplication window.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use meetsmatch_core::config::ActivityConfig;
use meetsmatch_core::db::unix_timestamp;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::storage::{DatabaseError, MatchDatabase};

/// Where activity timestamps end up.
#[async_trait]
pub trait ActivitySink: Send + Sync + 'static {
    async fn touch(&self, user_id: &str, at: i64) -> Result<bool, DatabaseError>;
}

#[async_trait]
impl ActivitySink for MatchDatabase {
    async fn touch(&self, user_id: &str, at: i64) -> Result<bool, DatabaseError> {
        self.touch_last_active(user_id, at).await
    }
}

struct Dedup {
    seen: Mutex<HashMap<String, Instant>>,
    window: Duration,
    max_entries: usize,
}

impl Dedup {
    /// Claim the slot for `user_id` unless it was claimed within the window.
    fn claim(&self, user_id: &str, now: Instant) -> bool {
        let Ok(mut seen) = self.seen.lock() else {
            return false;
        };
        if let Some(last) = seen.get(user_id) {
            if now.saturating_duration_since(*last) < self.window {
                return false;
            }
        }
        if seen.len() >= self.max_entries {
            debug!(entries = seen.len(), "Activity de-dup map full, clearing");
            seen.clear();
        }
        seen.insert(user_id.to_string(), now);
        true
    }

    fn release(&self, user_id: &str) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.remove(user_id);
        }
    }

    fn prune(&self, now: Instant) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.retain(|_, last| now.saturating_duration_since(*last) < self.window);
        }
    }

    fn len(&self) -> usize {
        self.seen.lock().map_or(0, |s| s.len())
    }
}

/// Bounded background writer for last-active timestamps.
pub struct ActivityTracker {
    tx: mpsc::Sender<String>,
    dedup: Arc<Dedup>,
    shutdown: CancellationToken,
    worker: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl ActivityTracker {
    /// Start the worker on the current runtime.
    pub fn spawn(sink: Arc<dyn ActivitySink>, config: &ActivityConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let dedup = Arc::new(Dedup {
            seen: Mutex::new(HashMap::new()),
            window: config.dedup_window(),
            max_entries: config.dedup_max_entries.max(1),
        });
        let shutdown = CancellationToken::new();

        let worker = tokio::spawn(run_worker(
            rx,
            sink,
            Arc::clone(&dedup),
            shutdown.clone(),
        ));

        Self {
            tx,
            dedup,
            shutdown,
            worker: tokio::sync::Mutex::new(Some(worker)),
        }
    }

    /// Queue a last-active update for `user_id`. Never blocks.
    ///
    /// Returns `false` when the update was de-duplicated, the queue was full,
    /// or the tracker is shutting down.
    pub fn record(&self, user_id: &str) -> bool {
        if self.shutdown.is_cancelled() || !self.dedup.claim(user_id, Instant::now()) {
            return false;
        }
        match self.tx.try_send(user_id.to_string()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(user_id, "Activity queue full, dropping update");
                self.dedup.release(user_id);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Number of users currently inside the de-dup window.
    pub fn tracked_users(&self) -> usize {
        self.dedup.len()
    }

    /// Stop accepting updates and wait for queued ones to be written.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        if let Some(worker) = self.worker.lock().await.take() {
            if let Err(e) = worker.await {
                warn!(error = %e, "Activity worker terminated abnormally");
            }
        }
    }
}

async fn touch(sink: &dyn ActivitySink, user_id: &str) {
    match sink.touch(user_id, unix_timestamp()).await {
        Ok(true) => {}
        Ok(false) => debug!(user_id, "Activity for unknown user ignored"),
        Err(e) => warn!(user_id, error = %e, "Failed to update last active"),
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<String>,
    sink: Arc<dyn ActivitySink>,
    dedup: Arc<Dedup>,
    shutdown: CancellationToken,
) {
    let mut prune = tokio::time::interval(dedup.window.max(Duration::from_secs(1)));
    prune.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            msg = rx.recv() => match msg {
                Some(user_id) => touch(sink.as_ref(), &user_id).await,
                None => break,
            },
            _ = prune.tick() => dedup.prune(Instant::now()),
            () = shutdown.cancelled() => {
                rx.close();
                let mut drained = 0usize;
                while let Some(user_id) = rx.recv().await {
                    touch(sink.as_ref(), &user_id).await;
                    drained += 1;
                }
                info!(drained, "Activity tracker drained");
                break;
            }
        }
    }
}
