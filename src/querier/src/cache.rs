//! TTL-bounded snapshot cache, one slot per telemetry type.
//!
//! A slot holds `(data, generated_at)`; readers get a clone while the
//! snapshot is fresh, and the populate path re-checks freshness under the
//! write lock so near-simultaneous cache misses regenerate at most once
//! per expiry window (last write wins).

use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::error::QuerierError;

/// The telemetry families the cache tracks independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TelemetryType {
    Metrics,
    Traces,
    Logs,
    Alerts,
}

struct Snapshot<T> {
    data: T,
    generated_at: Instant,
}

impl<T> Snapshot<T> {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.generated_at.elapsed() < ttl
    }
}

pub(crate) struct CacheSlot<T> {
    inner: RwLock<Option<Snapshot<T>>>,
}

impl<T: Clone> CacheSlot<T> {
    pub(crate) fn new() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }

    pub(crate) async fn invalidate(&self) {
        *self.inner.write().await = None;
    }

    /// Return a fresh snapshot, regenerating through `produce` on miss or
    /// expiry.
    pub(crate) async fn get_or_populate<F>(
        &self,
        ttl: Duration,
        produce: F,
    ) -> Result<T, QuerierError>
    where
        F: FnOnce() -> Result<T, QuerierError>,
    {
        {
            let slot = self.inner.read().await;
            if let Some(snapshot) = slot.as_ref() {
                if snapshot.is_fresh(ttl) {
                    return Ok(snapshot.data.clone());
                }
            }
        }

        let mut slot = self.inner.write().await;
        // Re-check after taking the write lock: a concurrent miss may have
        // repopulated while we waited.
        if let Some(snapshot) = slot.as_ref() {
            if snapshot.is_fresh(ttl) {
                return Ok(snapshot.data.clone());
            }
        }

        let data = produce()?;
        *slot = Some(Snapshot {
            data: data.clone(),
            generated_at: Instant::now(),
        });
        Ok(data)
    }

    /// Mutate the current snapshot in place without touching its TTL.
    /// Returns `None` when no snapshot exists.
    pub(crate) async fn mutate<F, R>(&self, mutate: F) -> Option<R>
    where
        F: FnOnce(&mut T) -> R,
    {
        let mut slot = self.inner.write().await;
        slot.as_mut().map(|snapshot| mutate(&mut snapshot.data))
    }
}
