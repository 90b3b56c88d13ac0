//! Per-incident lock table
//!
//! At most one mutation per incident is in flight inside a process. Entries
//! exist only while someone holds or waits for the lock.

use dashmap::DashMap;
use safeline_types::IncidentId;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct IncidentLocks {
    table: DashMap<IncidentId, Arc<Mutex<()>>>,
}

impl IncidentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to one incident
    pub async fn acquire(&self, id: &IncidentId) -> IncidentLockGuard<'_> {
        let mutex = self.table.entry(id.clone()).or_default().clone();
        let guard = mutex.lock_owned().await;
        IncidentLockGuard {
            locks: self,
            id: id.clone(),
            guard: Some(guard),
        }
    }

    /// Number of incidents currently locked or awaited
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Held lock on one incident; released on drop
#[derive(Debug)]
pub struct IncidentLockGuard<'a> {
    locks: &'a IncidentLocks,
    id: IncidentId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for IncidentLockGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the table's own reference left: nobody is waiting
        self.locks
            .table
            .remove_if(&self.id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_entry_removed_when_uncontended() {
        let locks = IncidentLocks::new();
        let id = IncidentId::generate();
        {
            let _guard = locks.acquire(&id).await;
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_second_acquirer_waits() {
        let locks = Arc::new(IncidentLocks::new());
        let id = IncidentId::generate();

        let guard = locks.acquire(&id).await;

        let waiter = {
            let locks = locks.clone();
            let id = id.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&id).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_distinct_incidents_do_not_block() {
        let locks = IncidentLocks::new();
        let a = IncidentId::generate();
        let b = IncidentId::generate();

        let _ga = locks.acquire(&a).await;
        let _gb = locks.acquire(&b).await;
        assert_eq!(locks.len(), 2);
    }
}
