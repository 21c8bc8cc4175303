//! Per-account mutual exclusion.
//!
//! Settlement, rotation and client-seed updates of one account run one at a
//! time; different accounts never contend.

use crate::games::types::AccountId;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockTable = DashMap<AccountId, Arc<Mutex<()>>>;

#[derive(Clone, Default)]
pub struct AccountLocks {
    locks: Arc<LockTable>,
}

/// Exclusive access to one account. Dropping it releases the lock and
/// forgets the account once nobody else is waiting on it.
pub struct AccountGuard {
    guard: Option<OwnedMutexGuard<()>>,
    account_id: AccountId,
    locks: Arc<LockTable>,
}

impl Drop for AccountGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters hold a clone of the mutex, so the table's copy is the last one only when idle
        self.locks
            .remove_if(&self.account_id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `account_id`. Released when the guard drops.
    pub async fn lock(&self, account_id: AccountId) -> AccountGuard {
        let mutex = self
            .locks
            .entry(account_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        AccountGuard {
            guard: Some(mutex.lock_owned().await),
            account_id,
            locks: self.locks.clone(),
        }
    }

    pub fn tracked_accounts(&self) -> usize {
        self.locks.len()
    }
}
