//! RocksDB-backed store.
//!
//! Key layout:
//! - `account:id:{uuid}` bincode `Account`
//! - `account:username:{name}` account id bytes
//! - `account:active_hash:{hash}` account id bytes
//! - `wager:{uuid}:{inv_seq(be)}` bincode `Wager`, newest first
//! - `rotation:{uuid}:{inv_seq(be)}` bincode `SeedRotationRecord`, newest first
//! - `rotation:hash:{hash}` bincode `SeedRotationRecord`

use super::GameStore;
use crate::errors::{StoreError, StoreResult};
use crate::games::types::{Account, AccountId, SeedPair, SeedRotationRecord, Wager};
use crate::storage::{BatchOp, OptimizedStorage};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tokio::sync::Mutex;
use uuid::Uuid;

const ACCOUNT_PREFIX: &str = "account:id:";
const USERNAME_PREFIX: &str = "account:username:";
const ACTIVE_HASH_PREFIX: &str = "account:active_hash:";
const WAGER_PREFIX: &str = "wager:";
const ROTATION_PREFIX: &str = "rotation:";
const ROTATION_HASH_PREFIX: &str = "rotation:hash:";

fn account_key(account_id: AccountId) -> Vec<u8> {
    format!("{}{}", ACCOUNT_PREFIX, account_id).into_bytes()
}

fn username_key(username: &str) -> Vec<u8> {
    format!("{}{}", USERNAME_PREFIX, username).into_bytes()
}

fn active_hash_key(hash: &str) -> Vec<u8> {
    format!("{}{}", ACTIVE_HASH_PREFIX, hash).into_bytes()
}

fn rotation_hash_key(hash: &str) -> Vec<u8> {
    format!("{}{}", ROTATION_HASH_PREFIX, hash).into_bytes()
}

fn history_prefix(prefix: &str, account_id: AccountId) -> Vec<u8> {
    format!("{}{}:", prefix, account_id).into_bytes()
}

fn history_key(prefix: &str, account_id: AccountId, seq: u64) -> Vec<u8> {
    // Inverted sequence so a forward scan yields newest first
    let mut key = history_prefix(prefix, account_id);
    key.extend_from_slice(&(u64::MAX - seq).to_be_bytes());
    key
}

fn encode<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    Ok(bincode::deserialize(bytes)?)
}

fn decode_account_id(bytes: &[u8]) -> StoreResult<AccountId> {
    Uuid::from_slice(bytes).map_err(|e| StoreError::Corrupted(format!("account id: {}", e)))
}

pub struct RocksStore {
    storage: OptimizedStorage,
    // Serializes read-modify-write commits
    write_lock: Mutex<()>,
}

impl RocksStore {
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        Ok(Self::new(OptimizedStorage::new(path)?))
    }

    pub fn new(storage: OptimizedStorage) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    fn load_account(&self, account_id: AccountId) -> StoreResult<Option<Account>> {
        let Some(bytes) = self.storage.get(&account_key(account_id))? else {
            return Ok(None);
        };
        let account: Account = decode(&bytes)?;
        if !account.seeds.is_consistent() {
            return Err(StoreError::Corrupted(format!(
                "account {} seed hash does not match its seed",
                account_id
            )));
        }
        Ok(Some(account))
    }

    fn require_account(&self, account_id: AccountId) -> StoreResult<Account> {
        self.load_account(account_id)?
            .ok_or_else(|| StoreError::NotFound(format!("account {}", account_id)))
    }

    fn scan_history<T: DeserializeOwned>(
        &self,
        prefix: &str,
        account_id: AccountId,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<T>> {
        self.storage
            .scan_prefix(&history_prefix(prefix, account_id), offset, limit)?
            .iter()
            .map(|(_, value)| decode(value))
            .collect()
    }
}

#[async_trait]
impl GameStore for RocksStore {
    async fn insert_account(&self, account: &Account) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        if self.storage.get(&username_key(&account.username))?.is_some() {
            return Err(StoreError::AlreadyExists(format!("username {}", account.username)));
        }
        if self.storage.get(&account_key(account.account_id))?.is_some() {
            return Err(StoreError::AlreadyExists(format!("account {}", account.account_id)));
        }

        let id_bytes = account.account_id.as_bytes().to_vec();
        self.storage.batch_write(vec![
            BatchOp::Put(account_key(account.account_id), encode(account)?),
            BatchOp::Put(username_key(&account.username), id_bytes.clone()),
            BatchOp::Put(active_hash_key(account.seeds.server_seed_hash()), id_bytes),
        ])
    }

    async fn get_account(&self, account_id: AccountId) -> StoreResult<Option<Account>> {
        self.load_account(account_id)
    }

    async fn find_account_by_username(&self, username: &str) -> StoreResult<Option<Account>> {
        match self.storage.get(&username_key(username))? {
            Some(bytes) => self.load_account(decode_account_id(&bytes)?),
            None => Ok(None),
        }
    }

    async fn update_client_seed(&self, account_id: AccountId, client_seed: &str) -> StoreResult<Account> {
        let _guard = self.write_lock.lock().await;
        let mut account = self.require_account(account_id)?;
        account.seeds = account.seeds.with_client_seed(client_seed.to_string());
        self.storage.put(&account_key(account_id), &encode(&account)?)?;
        Ok(account)
    }

    async fn commit_wager(&self, wager: &Wager) -> StoreResult<Account> {
        let _guard = self.write_lock.lock().await;
        let current = self.require_account(wager.account_id)?;
        let next = current.apply_wager(wager)?;

        self.storage.batch_write(vec![
            BatchOp::Put(
                history_key(WAGER_PREFIX, wager.account_id, current.stats.total_wagers),
                encode(wager)?,
            ),
            BatchOp::Put(account_key(next.account_id), encode(&next)?),
        ])?;
        Ok(next)
    }

    async fn list_wagers(&self, account_id: AccountId, limit: usize, offset: usize) -> StoreResult<Vec<Wager>> {
        self.scan_history(WAGER_PREFIX, account_id, limit, offset)
    }

    async fn commit_rotation(&self, record: &SeedRotationRecord, next_seeds: SeedPair) -> StoreResult<Account> {
        let _guard = self.write_lock.lock().await;
        if self.storage.get(&rotation_hash_key(&record.server_seed_hash))?.is_some() {
            return Err(StoreError::AlreadyExists(format!(
                "rotation for {}",
                record.server_seed_hash
            )));
        }
        let current = self.require_account(record.account_id)?;
        let next = current.apply_rotation(record, next_seeds)?;
        let record_bytes = encode(record)?;

        self.storage.batch_write(vec![
            BatchOp::Put(
                history_key(ROTATION_PREFIX, record.account_id, current.stats.rotations),
                record_bytes.clone(),
            ),
            BatchOp::Put(rotation_hash_key(&record.server_seed_hash), record_bytes),
            BatchOp::Delete(active_hash_key(&record.server_seed_hash)),
            BatchOp::Put(
                active_hash_key(next.seeds.server_seed_hash()),
                next.account_id.as_bytes().to_vec(),
            ),
            BatchOp::Put(account_key(next.account_id), encode(&next)?),
        ])?;
        Ok(next)
    }

    async fn find_rotation_by_hash(&self, server_seed_hash: &str) -> StoreResult<Option<SeedRotationRecord>> {
        self.storage
            .get(&rotation_hash_key(server_seed_hash))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    async fn list_rotations(&self, account_id: AccountId, limit: usize) -> StoreResult<Vec<SeedRotationRecord>> {
        self.scan_history(ROTATION_PREFIX, account_id, limit, 0)
    }

    async fn is_active_server_seed_hash(&self, server_seed_hash: &str) -> StoreResult<bool> {
        Ok(self.storage.get(&active_hash_key(server_seed_hash))?.is_some())
    }
}
