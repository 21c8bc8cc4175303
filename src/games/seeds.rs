//! Seed lifecycle: account initialization, client seed changes, server seed
//! rotation and reveal of retired seeds.

use crate::config::GameConfig;
use crate::errors::{DiceResult, GameError, StoreError};
use crate::games::account_lock::AccountLocks;
use crate::games::notifier::{AccountEvent, SettlementNotifier};
use crate::games::types::{now_millis, Account, AccountId, PublicSeedState, SeedPair, SeedRotationRecord};
use crate::metrics::MetricsRegistry;
use crate::store::GameStore;
use rand::rngs::OsRng;
use rand::RngCore;
use std::sync::Arc;
use tracing::{info, warn};

const SERVER_SEED_BYTES: usize = 32;
const CLIENT_SEED_BYTES: usize = 16;
const MAX_CLIENT_SEED_LEN: usize = 64;
const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=20;

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// 256 bits from the OS CSPRNG, hex encoded
pub fn generate_server_seed() -> String {
    random_hex(SERVER_SEED_BYTES)
}

pub fn generate_client_seed() -> String {
    random_hex(CLIENT_SEED_BYTES)
}

/// Client seeds are 1-64 characters of `[A-Za-z0-9_-]`
pub fn validate_client_seed(client_seed: &str) -> DiceResult<()> {
    if client_seed.is_empty() || client_seed.len() > MAX_CLIENT_SEED_LEN {
        return Err(GameError::validation(format!(
            "Client seed must be 1-{} characters",
            MAX_CLIENT_SEED_LEN
        )));
    }
    if !client_seed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(GameError::validation(
            "Client seed may only contain letters, digits, '_' and '-'",
        ));
    }
    Ok(())
}

/// Trimmed username of 3-20 characters
pub fn validate_username(username: &str) -> DiceResult<String> {
    let trimmed = username.trim();
    if !USERNAME_LEN.contains(&trimmed.chars().count()) {
        return Err(GameError::validation("Username must be 3-20 characters"));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(GameError::validation("Username contains control characters"));
    }
    Ok(trimmed.to_string())
}

/// A server seed hash is 64 lowercase hex characters
pub fn validate_seed_hash(hash: &str) -> DiceResult<()> {
    if hash.len() == 64 && hash.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')) {
        Ok(())
    } else {
        Err(GameError::validation(
            "Server seed hash must be 64 lowercase hex characters",
        ))
    }
}

/// Result of retiring the active server seed
#[derive(Debug, Clone)]
pub struct RotationOutcome {
    pub revealed: SeedRotationRecord,
    pub seeds: PublicSeedState,
}

pub struct SeedLifecycleManager {
    store: Arc<dyn GameStore>,
    locks: AccountLocks,
    notifier: Arc<dyn SettlementNotifier>,
    metrics: MetricsRegistry,
    config: GameConfig,
}

impl SeedLifecycleManager {
    pub fn new(
        store: Arc<dyn GameStore>,
        locks: AccountLocks,
        notifier: Arc<dyn SettlementNotifier>,
        metrics: MetricsRegistry,
        config: GameConfig,
    ) -> Self {
        Self {
            store,
            locks,
            notifier,
            metrics,
            config,
        }
    }

    fn fresh_seeds(&self, client_seed: String) -> SeedPair {
        SeedPair::new(generate_server_seed(), client_seed, self.config.initial_nonce)
    }

    /// Create an account with a fresh seed pair and the starting balance
    pub async fn create_account(&self, username: &str) -> DiceResult<Account> {
        let username = validate_username(username)?;
        let account = Account::new(
            username,
            self.fresh_seeds(generate_client_seed()),
            self.config.starting_balance,
        );
        self.store.insert_account(&account).await.map_err(|e| match e {
            StoreError::AlreadyExists(what) => GameError::validation(format!("{} already exists", what)),
            other => other.into(),
        })?;

        info!(
            account_id = %account.account_id,
            username = %account.username,
            server_seed_hash = %account.seeds.server_seed_hash(),
            "Account initialized"
        );
        Ok(account)
    }

    /// Existing account for `username`, or a new one. The flag is true when created.
    pub async fn login_or_create(&self, username: &str) -> DiceResult<(Account, bool)> {
        let username = validate_username(username)?;
        if let Some(account) = self.store.find_account_by_username(&username).await? {
            return Ok((account, false));
        }
        match self.create_account(&username).await {
            Ok(account) => Ok((account, true)),
            // Lost a race against a concurrent login for the same name
            Err(GameError::Validation(_)) => self
                .store
                .find_account_by_username(&username)
                .await?
                .map(|account| (account, false))
                .ok_or_else(|| GameError::NotFound(format!("account {}", username))),
            Err(e) => Err(e),
        }
    }

    pub async fn account(&self, account_id: AccountId) -> DiceResult<Account> {
        self.store
            .get_account(account_id)
            .await?
            .ok_or_else(|| GameError::NotFound(format!("account {}", account_id)))
    }

    /// Public part of the active seed pair
    pub async fn current_seeds(&self, account_id: AccountId) -> DiceResult<PublicSeedState> {
        Ok(self.account(account_id).await?.seeds.public())
    }

    /// Change the client seed. Server seed, hash and nonce are untouched.
    pub async fn update_client_seed(
        &self,
        account_id: AccountId,
        client_seed: &str,
    ) -> DiceResult<PublicSeedState> {
        validate_client_seed(client_seed)?;
        self.account(account_id).await?;
        let _guard = self.locks.lock(account_id).await;

        let account = self.store.update_client_seed(account_id, client_seed).await?;
        let seeds = account.seeds.public();
        self.metrics.record_client_seed_update();
        info!(account_id = %account_id, nonce = seeds.nonce, "Client seed updated");

        self.notifier.notify(AccountEvent::ClientSeedChanged {
            account_id,
            seeds: seeds.clone(),
        });
        Ok(seeds)
    }

    /// Retire the active server seed, publish it, and activate a fresh one at the initial nonce.
    ///
    /// The client seed carries over unless `new_client_seed` is given.
    pub async fn rotate_server_seed(
        &self,
        account_id: AccountId,
        new_client_seed: Option<&str>,
    ) -> DiceResult<RotationOutcome> {
        if let Some(seed) = new_client_seed {
            validate_client_seed(seed)?;
        }
        self.account(account_id).await?;
        let _guard = self.locks.lock(account_id).await;
        // Re-read under the lock so the retiring nonce is current
        let account = self.account(account_id).await?;
        let retiring = &account.seeds;

        let record = SeedRotationRecord {
            account_id,
            server_seed: retiring.server_seed().to_string(),
            server_seed_hash: retiring.server_seed_hash().to_string(),
            client_seed: retiring.client_seed().to_string(),
            final_nonce: retiring.nonce(),
            revealed_at: now_millis(),
        };
        let client_seed = new_client_seed
            .map(str::to_string)
            .unwrap_or_else(|| retiring.client_seed().to_string());
        let next_seeds = self.fresh_seeds(client_seed);

        let updated = self
            .store
            .commit_rotation(&record, next_seeds)
            .await
            .map_err(|e| {
                warn!(account_id = %account_id, error = %e, "Seed rotation commit failed");
                GameError::Persistence(e.to_string())
            })?;
        let seeds = updated.seeds.public();

        self.metrics.record_rotation();
        info!(
            account_id = %account_id,
            final_nonce = record.final_nonce,
            revealed_hash = %record.server_seed_hash,
            new_hash = %seeds.server_seed_hash,
            "Server seed rotated"
        );

        self.notifier.notify(AccountEvent::SeedsRotated {
            account_id,
            revealed_server_seed: record.server_seed.clone(),
            revealed_server_seed_hash: record.server_seed_hash.clone(),
            seeds: seeds.clone(),
        });
        Ok(RotationOutcome {
            revealed: record,
            seeds,
        })
    }

    /// Plaintext of a retired server seed. Active seeds are never revealed.
    pub async fn reveal(&self, server_seed_hash: &str) -> DiceResult<SeedRotationRecord> {
        validate_seed_hash(server_seed_hash)?;
        if self.store.is_active_server_seed_hash(server_seed_hash).await? {
            return Err(GameError::Forbidden(
                "Server seed is still active; rotate it before revealing".to_string(),
            ));
        }
        let record = self
            .store
            .find_rotation_by_hash(server_seed_hash)
            .await?
            .ok_or_else(|| GameError::NotFound(format!("no retired seed with hash {}", server_seed_hash)))?;
        self.metrics.record_reveal();
        Ok(record)
    }

    /// Retired seeds of an account, newest first
    pub async fn history(&self, account_id: AccountId, limit: Option<usize>) -> DiceResult<Vec<SeedRotationRecord>> {
        self.account(account_id).await?;
        let limit = limit
            .unwrap_or(self.config.default_rotation_history_limit)
            .clamp(1, self.config.max_rotation_history_limit);
        Ok(self.store.list_rotations(account_id, limit).await?)
    }
}
