//! Expiring comic cache keyed by canonical comic number.
//!
//! Every access goes through one exclusive lock: `get` refreshes the
//! last-access time, so reads mutate too. The lock is only held for a map
//! operation and is never held across a fetch.

use super::Comic;
use crate::config::CacheConfig;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

/// A cached comic with its last access time
struct ComicCacheEntry {
    comic: Comic,
    last_accessed: Instant,
}

/// Outcome of one sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub removed: usize,
    pub remaining: usize,
}

/// Comic cache with inactivity-based expiry
pub struct ComicCache {
    entries: Mutex<HashMap<u64, ComicCacheEntry>>,
    expiry: Duration,
}

impl ComicCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_expiry(config.expiry())
    }

    pub fn with_expiry(expiry: Duration) -> Self {
        ComicCache {
            entries: Mutex::new(HashMap::new()),
            expiry,
        }
    }

    /// Get a cached comic, refreshing its last access time on a hit
    pub async fn get(&self, id: u64) -> Option<Comic> {
        let mut entries = self.entries.lock().await;
        entries.get_mut(&id).map(|entry| {
            entry.last_accessed = Instant::now();
            entry.comic.clone()
        })
    }

    /// Insert or overwrite a comic
    pub async fn set(&self, id: u64, comic: Comic) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            id,
            ComicCacheEntry {
                comic,
                last_accessed: Instant::now(),
            },
        );
    }

    /// Insert `comic` unless `id` is already cached.
    ///
    /// Returns the comic now cached under `id` and whether this call inserted
    /// it. When another resolution got there first, the cached comic wins and
    /// `comic` is dropped.
    pub async fn get_or_insert(&self, id: u64, comic: Comic) -> (Comic, bool) {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        match entries.get_mut(&id) {
            Some(entry) => {
                entry.last_accessed = now;
                (entry.comic.clone(), false)
            }
            None => {
                entries.insert(
                    id,
                    ComicCacheEntry {
                        comic: comic.clone(),
                        last_accessed: now,
                    },
                );
                (comic, true)
            }
        }
    }

    /// Remove entries idle for longer than the expiry window, under one lock.
    pub async fn sweep(&self) -> SweepStats {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| now.saturating_duration_since(entry.last_accessed) <= self.expiry);
        SweepStats {
            removed: before - entries.len(),
            remaining: entries.len(),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

/// Handle to a running sweeper task.
///
/// The sweeper also stops when the handle is dropped, so the process entry
/// point keeps it alive for the lifetime of the server.
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the sweeper to stop and wait for it to exit
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

/// Spawn the background task that sweeps `cache` every `interval`
pub fn spawn_sweeper(cache: Arc<ComicCache>, interval: Duration) -> SweeperHandle {
    let (shutdown, mut shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let stats = cache.sweep().await;
                    if stats.removed > 0 {
                        debug!(removed = stats.removed, remaining = stats.remaining, "Comic cache swept");
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("Comic cache sweeper stopped");
    });

    SweeperHandle { shutdown, task }
}
