/// Periodic persistence of the bandit's arm statistics
///
/// A background task snapshots the bandit on a fixed interval and once more
/// on shutdown. At startup the latest snapshot is loaded back if it matches
/// the configured dimension.
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::bandit::{BanditSnapshot, LinUcb};
use crate::{
    db::{Cache, CacheKey},
    error::AppResult,
};

/// Where bandit snapshots are kept between runs
#[async_trait::async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn load(&self) -> AppResult<Option<BanditSnapshot>>;

    async fn save(&self, snapshot: &BanditSnapshot) -> AppResult<()>;
}

/// Keeps the latest snapshot under a single non-expiring Redis key
pub struct RedisSnapshotStore {
    cache: Cache,
}

impl RedisSnapshotStore {
    pub fn new(cache: Cache) -> Self {
        Self { cache }
    }
}

#[async_trait::async_trait]
impl SnapshotStore for RedisSnapshotStore {
    async fn load(&self) -> AppResult<Option<BanditSnapshot>> {
        self.cache.get_from_cache(&CacheKey::BanditSnapshot).await
    }

    async fn save(&self, snapshot: &BanditSnapshot) -> AppResult<()> {
        self.cache
            .set(&CacheKey::BanditSnapshot, snapshot, None)
            .await
    }
}

/// Loads the stored snapshot into `bandit`
///
/// Returns the number of arms restored. A missing, unreadable or incompatible
/// snapshot leaves the bandit at its initial state.
pub async fn restore_bandit(bandit: &LinUcb, store: &dyn SnapshotStore) -> usize {
    let snapshot = match store.load().await {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => {
            tracing::info!("No bandit checkpoint found, starting fresh");
            return 0;
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load bandit checkpoint, starting fresh");
            return 0;
        }
    };

    match bandit.restore(&snapshot) {
        Ok(restored) => {
            tracing::info!(
                restored,
                taken_at = %snapshot.taken_at,
                "Restored bandit checkpoint"
            );
            restored
        }
        Err(e) => {
            tracing::warn!(error = %e, "Discarding incompatible bandit checkpoint");
            0
        }
    }
}

/// Stops the checkpoint task after a final save
pub struct CheckpointHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl CheckpointHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Checkpoint task panicked");
        }
    }
}

/// Spawns the task saving `bandit` to `store` every `interval`
pub fn spawn_checkpointer(
    bandit: Arc<LinUcb>,
    store: Arc<dyn SnapshotStore>,
    interval: Duration,
) -> CheckpointHandle {
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let saved_updates = total_updates(&bandit.snapshot());
    let task = tokio::spawn(checkpoint_task(
        bandit,
        store,
        interval,
        saved_updates,
        shutdown_rx,
    ));
    CheckpointHandle { shutdown_tx, task }
}

async fn checkpoint_task(
    bandit: Arc<LinUcb>,
    store: Arc<dyn SnapshotStore>,
    interval: Duration,
    mut saved_updates: u64,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    tracing::info!(interval_secs = interval.as_secs(), "Checkpoint task started");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // First tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let snapshot = bandit.snapshot();
                let updates = total_updates(&snapshot);
                if updates == saved_updates {
                    tracing::trace!("No bandit updates since last checkpoint");
                    continue;
                }
                if save(store.as_ref(), &snapshot).await {
                    saved_updates = updates;
                }
            }
            _ = shutdown_rx.recv() => {
                let snapshot = bandit.snapshot();
                if total_updates(&snapshot) != saved_updates {
                    save(store.as_ref(), &snapshot).await;
                }
                tracing::info!("Checkpoint task stopped");
                break;
            }
        }
    }
}

async fn save(store: &dyn SnapshotStore, snapshot: &BanditSnapshot) -> bool {
    match store.save(snapshot).await {
        Ok(()) => {
            tracing::debug!(arms = snapshot.arms.len(), "Saved bandit checkpoint");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to save bandit checkpoint");
            false
        }
    }
}

fn total_updates(snapshot: &BanditSnapshot) -> u64 {
    snapshot.arms.iter().map(|arm| arm.updates).sum()
}
