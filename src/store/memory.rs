//! In-memory store, used for tests and the `memory` storage backend

use super::GameStore;
use crate::errors::{StoreError, StoreResult};
use crate::games::types::{Account, AccountId, SeedPair, SeedRotationRecord, Wager};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct MemoryState {
    accounts: HashMap<AccountId, Account>,
    usernames: HashMap<String, AccountId>,
    active_hashes: HashMap<String, AccountId>,
    wagers: HashMap<AccountId, Vec<Wager>>,
    rotations: HashMap<AccountId, Vec<SeedRotationRecord>>,
    rotations_by_hash: HashMap<String, SeedRotationRecord>,
}

impl MemoryState {
    fn account(&self, account_id: AccountId) -> StoreResult<&Account> {
        self.accounts
            .get(&account_id)
            .ok_or_else(|| StoreError::NotFound(format!("account {}", account_id)))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GameStore for MemoryStore {
    async fn insert_account(&self, account: &Account) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.usernames.contains_key(&account.username) {
            return Err(StoreError::AlreadyExists(format!("username {}", account.username)));
        }
        if state.accounts.contains_key(&account.account_id) {
            return Err(StoreError::AlreadyExists(format!("account {}", account.account_id)));
        }
        state.usernames.insert(account.username.clone(), account.account_id);
        state
            .active_hashes
            .insert(account.seeds.server_seed_hash().to_string(), account.account_id);
        state.accounts.insert(account.account_id, account.clone());
        Ok(())
    }

    async fn get_account(&self, account_id: AccountId) -> StoreResult<Option<Account>> {
        Ok(self.state.read().await.accounts.get(&account_id).cloned())
    }

    async fn find_account_by_username(&self, username: &str) -> StoreResult<Option<Account>> {
        let state = self.state.read().await;
        Ok(state
            .usernames
            .get(username)
            .and_then(|id| state.accounts.get(id))
            .cloned())
    }

    async fn update_client_seed(&self, account_id: AccountId, client_seed: &str) -> StoreResult<Account> {
        let mut state = self.state.write().await;
        let mut account = state.account(account_id)?.clone();
        account.seeds = account.seeds.with_client_seed(client_seed.to_string());
        state.accounts.insert(account_id, account.clone());
        Ok(account)
    }

    async fn commit_wager(&self, wager: &Wager) -> StoreResult<Account> {
        let mut state = self.state.write().await;
        let next = state.account(wager.account_id)?.apply_wager(wager)?;
        state.accounts.insert(next.account_id, next.clone());
        state.wagers.entry(next.account_id).or_default().push(wager.clone());
        Ok(next)
    }

    async fn list_wagers(&self, account_id: AccountId, limit: usize, offset: usize) -> StoreResult<Vec<Wager>> {
        let state = self.state.read().await;
        Ok(state
            .wagers
            .get(&account_id)
            .map(|wagers| wagers.iter().rev().skip(offset).take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn commit_rotation(&self, record: &SeedRotationRecord, next_seeds: SeedPair) -> StoreResult<Account> {
        let mut state = self.state.write().await;
        if state.rotations_by_hash.contains_key(&record.server_seed_hash) {
            return Err(StoreError::AlreadyExists(format!(
                "rotation for {}",
                record.server_seed_hash
            )));
        }
        let next = state.account(record.account_id)?.apply_rotation(record, next_seeds)?;

        state.active_hashes.remove(&record.server_seed_hash);
        state
            .active_hashes
            .insert(next.seeds.server_seed_hash().to_string(), next.account_id);
        state
            .rotations_by_hash
            .insert(record.server_seed_hash.clone(), record.clone());
        state.rotations.entry(next.account_id).or_default().push(record.clone());
        state.accounts.insert(next.account_id, next.clone());
        Ok(next)
    }

    async fn find_rotation_by_hash(&self, server_seed_hash: &str) -> StoreResult<Option<SeedRotationRecord>> {
        Ok(self.state.read().await.rotations_by_hash.get(server_seed_hash).cloned())
    }

    async fn list_rotations(&self, account_id: AccountId, limit: usize) -> StoreResult<Vec<SeedRotationRecord>> {
        let state = self.state.read().await;
        Ok(state
            .rotations
            .get(&account_id)
            .map(|records| records.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn is_active_server_seed_hash(&self, server_seed_hash: &str) -> StoreResult<bool> {
        Ok(self.state.read().await.active_hashes.contains_key(server_seed_hash))
    }
}
