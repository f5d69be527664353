use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::errors::ServiceError;

/// In-process lock registry serializing mutations per commission.
///
/// State transitions and adjustments on the same commission are mutually
/// exclusive; different commissions proceed in parallel. Acquisition is
/// bounded: a waiter that cannot get the lock in time fails with
/// `ServiceError::Timeout`, which callers treat differently from
/// `ConcurrentModification` when deciding whether to retry.
#[derive(Debug, Default)]
pub struct CommissionLockRegistry {
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl CommissionLockRegistry {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Acquires the lock for `commission_id`, waiting at most `wait`.
    pub async fn acquire(
        &self,
        commission_id: Uuid,
        wait: Duration,
    ) -> Result<OwnedMutexGuard<()>, ServiceError> {
        let lock = self.locks.entry(commission_id).or_default().clone();
        tokio::time::timeout(wait, lock.lock_owned())
            .await
            .map_err(|_| {
                ServiceError::Timeout(format!(
                    "commission {} lock not acquired within {:?}",
                    commission_id, wait
                ))
            })
    }
}
