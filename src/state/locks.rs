use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::{
    sync::{Mutex, OwnedMutexGuard},
    time::timeout,
};

use crate::dao::models::CourtId;

/// Upper bound on waiting for another operation on the same court.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Registry of per-court async mutexes.
///
/// Operations on different courts never contend; operations on the same court
/// run one at a time in arrival order (tokio mutexes are fair).
pub struct CourtLocks {
    locks: DashMap<CourtId, Arc<Mutex<()>>>,
    acquire_timeout: Duration,
}

impl CourtLocks {
    /// Registry whose acquisitions give up after `acquire_timeout`.
    pub fn new(acquire_timeout: Duration) -> Self {
        Self {
            locks: DashMap::new(),
            acquire_timeout,
        }
    }

    /// Wait for exclusive access to `court_id`. Returns `None` on timeout.
    pub async fn acquire(&self, court_id: CourtId) -> Option<OwnedMutexGuard<()>> {
        let lock = self
            .locks
            .entry(court_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        timeout(self.acquire_timeout, lock.lock_owned()).await.ok()
    }
}

impl Default for CourtLocks {
    fn default() -> Self {
        Self::new(DEFAULT_ACQUIRE_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_court_waits_other_court_does_not() {
        let locks = CourtLocks::new(Duration::from_millis(50));
        let held = locks.acquire(1).await.unwrap();

        assert!(locks.acquire(2).await.is_some());
        assert!(locks.acquire(1).await.is_none());

        drop(held);
        assert!(locks.acquire(1).await.is_some());
    }
}
