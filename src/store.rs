use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::models::{now_millis, Fix};

/// In-memory mapping of vehicle ID to its latest fix.
///
/// Cheap to clone; all clones share the same map. Holds at most one fix per vehicle.
#[derive(Debug, Clone, Default)]
pub struct LocationStore {
    inner: Arc<RwLock<HashMap<String, Entry>>>,
}

#[derive(Debug)]
struct Entry {
    fix: Fix,

    /// Server clock at the time the fix was stored, Unix milliseconds.
    received_at: i64,
}

impl LocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the vehicle's fix, returning the previous one.
    pub async fn upsert(&self, fix: Fix) -> Option<Fix> {
        self.upsert_with(fix, now_millis(), |_| {}).await
    }

    /// Replaces the vehicle's fix and calls `announce` before the lock is released,
    /// so announcements come out in the same order as the writes.
    pub async fn upsert_with(&self, fix: Fix, received_at: i64, announce: impl FnOnce(&Fix)) -> Option<Fix> {
        let mut inner = self.inner.write().await;
        announce(&fix);
        let entry = Entry { fix, received_at };
        inner.insert(entry.fix.jeep_id.clone(), entry).map(|previous| previous.fix)
    }

    pub async fn get(&self, jeep_id: &str) -> Option<Fix> {
        self.inner.read().await.get(jeep_id).map(|entry| entry.fix.clone())
    }

    pub async fn snapshot(&self) -> HashMap<String, Fix> {
        let inner = self.inner.read().await;
        inner.iter().map(|(jeep_id, entry)| (jeep_id.clone(), entry.fix.clone())).collect()
    }

    /// All fixes ordered by vehicle ID.
    pub async fn fixes(&self) -> Vec<Fix> {
        let mut fixes: Vec<Fix> = self.inner.read().await.values().map(|entry| entry.fix.clone()).collect();
        fixes.sort_unstable_by(|left, right| left.jeep_id.cmp(&right.jeep_id));
        fixes
    }

    /// Drops every fix received strictly before `cutoff` (Unix milliseconds), calling
    /// `announce` for each of them under the same lock.
    pub async fn remove_received_before(&self, cutoff: i64, mut announce: impl FnMut(&Fix)) -> Vec<Fix> {
        let mut inner = self.inner.write().await;
        let stale: Vec<String> = inner
            .iter()
            .filter(|(_, entry)| entry.received_at < cutoff)
            .map(|(jeep_id, _)| jeep_id.clone())
            .collect();
        let removed: Vec<Fix> = stale
            .iter()
            .filter_map(|jeep_id| inner.remove(jeep_id))
            .map(|entry| entry.fix)
            .collect();
        removed.iter().for_each(&mut announce);
        removed
    }
}
