//! Persistence boundary for accounts, wagers and seed rotations.
//!
//! Every commit is atomic: either the whole state transition is visible or
//! none of it is.

pub mod memory;
pub mod rocks;

pub use memory::MemoryStore;
pub use rocks::RocksStore;

use crate::config::{StorageBackend, StorageConfig};
use crate::errors::StoreResult;
use crate::games::types::{Account, AccountId, SeedPair, SeedRotationRecord, Wager};
use async_trait::async_trait;
use std::sync::Arc;

/// Open the backend selected by `config`
pub fn open(config: &StorageConfig) -> StoreResult<Arc<dyn GameStore>> {
    Ok(match config.backend {
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
        StorageBackend::Rocks => {
            std::fs::create_dir_all(&config.data_directory)
                .map_err(|e| crate::errors::StoreError::Backend(e.to_string()))?;
            Arc::new(RocksStore::open(&config.data_directory)?)
        }
    })
}

#[async_trait]
pub trait GameStore: Send + Sync {
    /// Insert a new account. Fails with `AlreadyExists` when the username is taken.
    async fn insert_account(&self, account: &Account) -> StoreResult<()>;

    async fn get_account(&self, account_id: AccountId) -> StoreResult<Option<Account>>;

    async fn find_account_by_username(&self, username: &str) -> StoreResult<Option<Account>>;

    /// Replace the client seed of the active pair, leaving hash and nonce alone
    async fn update_client_seed(&self, account_id: AccountId, client_seed: &str) -> StoreResult<Account>;

    /// Insert `wager` and advance the account (nonce +1, balance += profit, stats)
    /// in one atomic write.
    ///
    /// Fails with `Conflict` when the account's nonce or active seed no longer
    /// matches the wager.
    async fn commit_wager(&self, wager: &Wager) -> StoreResult<Account>;

    /// Wagers for an account, newest first
    async fn list_wagers(&self, account_id: AccountId, limit: usize, offset: usize) -> StoreResult<Vec<Wager>>;

    /// Persist `record` and install `next_seeds` as the active pair atomically
    async fn commit_rotation(&self, record: &SeedRotationRecord, next_seeds: SeedPair) -> StoreResult<Account>;

    async fn find_rotation_by_hash(&self, server_seed_hash: &str) -> StoreResult<Option<SeedRotationRecord>>;

    /// Rotation records for an account, newest first
    async fn list_rotations(&self, account_id: AccountId, limit: usize) -> StoreResult<Vec<SeedRotationRecord>>;

    /// True when some account currently uses this server seed hash
    async fn is_active_server_seed_hash(&self, server_seed_hash: &str) -> StoreResult<bool>;
}
