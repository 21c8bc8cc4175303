//! Bet settlement.
//!
//! One wager is validated, rolled against the account's active seeds, priced,
//! and committed together with the nonce and balance advance. Nothing is
//! retried here: a retried request is a new roll under a new nonce.

use crate::config::GameConfig;
use crate::errors::{DiceResult, GameError};
use crate::games::account_lock::AccountLocks;
use crate::games::notifier::{AccountEvent, SettlementNotifier};
use crate::games::payout;
use crate::games::roll_engine;
use crate::games::types::{now_millis, AccountId, BetType, Direction, Hundredths, Wager};
use crate::metrics::MetricsRegistry;
use crate::store::GameStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

const MIN_TARGET: Hundredths = Hundredths::from_raw(1);
const MAX_TARGET: Hundredths = Hundredths::from_raw(9_999);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BetRequest {
    /// Cents
    pub bet_amount: u64,
    pub target: Hundredths,
    pub direction: Direction,
    #[serde(default)]
    pub bet_type: BetType,
    #[serde(default)]
    pub round_number: Option<u64>,
    #[serde(default)]
    pub strategy: Option<String>,
}

impl BetRequest {
    pub fn manual(bet_amount: u64, target: Hundredths, direction: Direction) -> Self {
        Self {
            bet_amount,
            target,
            direction,
            bet_type: BetType::Manual,
            round_number: None,
            strategy: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SettlementOutcome {
    pub wager: Wager,
    /// Cents
    pub new_balance: u64,
    pub new_nonce: u64,
}

pub struct SettlementCoordinator {
    store: Arc<dyn GameStore>,
    locks: AccountLocks,
    notifier: Arc<dyn SettlementNotifier>,
    metrics: MetricsRegistry,
    config: GameConfig,
}

impl SettlementCoordinator {
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

    /// Checks that need no account state. Returns the win chance.
    fn validate_request(&self, request: &BetRequest) -> DiceResult<Hundredths> {
        let config = &self.config;
        if request.bet_amount < config.min_bet || request.bet_amount > config.max_bet {
            return Err(GameError::validation(format!(
                "Bet amount must be between {} and {} cents",
                config.min_bet, config.max_bet
            )));
        }
        if request.target < MIN_TARGET || request.target > MAX_TARGET {
            return Err(GameError::validation(format!(
                "Target must be between {} and {}",
                MIN_TARGET, MAX_TARGET
            )));
        }
        let win_chance = payout::win_chance(request.direction, request.target);
        if win_chance < config.min_win_chance || win_chance > config.max_win_chance {
            return Err(GameError::validation(format!(
                "Win chance {} is outside {}-{}",
                win_chance, config.min_win_chance, config.max_win_chance
            )));
        }
        Ok(win_chance)
    }

    /// Settle one wager for `account_id`
    pub async fn settle(&self, account_id: AccountId, request: BetRequest) -> DiceResult<SettlementOutcome> {
        let win_chance = self.validate_request(&request)?;
        let multiplier = payout::payout_multiplier(win_chance, self.config.house_edge)?;
        if self.store.get_account(account_id).await?.is_none() {
            return Err(GameError::NotFound(format!("account {}", account_id)));
        }

        let guard = self.locks.lock(account_id).await;
        let account = self
            .store
            .get_account(account_id)
            .await?
            .ok_or_else(|| GameError::NotFound(format!("account {}", account_id)))?;

        if request.bet_amount > account.balance {
            return Err(GameError::InsufficientBalance {
                required: request.bet_amount,
                available: account.balance,
            });
        }

        let seeds = &account.seeds;
        let hmac = roll_engine::hmac_hex(seeds.server_seed(), seeds.client_seed(), seeds.nonce());
        let roll = roll_engine::roll_from_digest(&hmac);
        let win = payout::is_win(request.direction, request.target, roll);
        let settled = payout::settle(request.bet_amount, multiplier, win)?;

        let wager = Wager {
            wager_id: Uuid::new_v4(),
            account_id,
            bet_amount: request.bet_amount,
            direction: request.direction,
            target: request.target,
            win_chance,
            roll,
            win,
            payout_multiplier: payout::display_multiplier(settled.multiplier),
            payout: settled.payout,
            profit: settled.profit,
            nonce: seeds.nonce(),
            server_seed_hash: seeds.server_seed_hash().to_string(),
            client_seed: seeds.client_seed().to_string(),
            hmac,
            bet_type: request.bet_type,
            round_number: request.round_number,
            strategy: request.strategy,
            created_at: now_millis(),
        };
        debug!(account_id = %account_id, nonce = wager.nonce, roll = %roll, "Roll computed");

        let updated = self.store.commit_wager(&wager).await.map_err(|e| {
            error!(account_id = %account_id, nonce = wager.nonce, error = %e, "Wager commit failed");
            GameError::Persistence(e.to_string())
        })?;
        drop(guard);

        self.metrics.record_bet(wager.bet_amount, wager.payout, wager.win);
        info!(
            account_id = %account_id,
            nonce = wager.nonce,
            roll = %wager.roll,
            target = %wager.target,
            direction = %wager.direction,
            win = wager.win,
            profit = wager.profit,
            "Bet settled"
        );

        let outcome = SettlementOutcome {
            wager,
            new_balance: updated.balance,
            new_nonce: updated.seeds.nonce(),
        };
        self.notifier.notify(AccountEvent::BetSettled {
            wager: outcome.wager.clone(),
            new_balance: outcome.new_balance,
            new_nonce: outcome.new_nonce,
        });
        Ok(outcome)
    }

    /// Settled wagers of an account, newest first
    pub async fn history(
        &self,
        account_id: AccountId,
        limit: Option<usize>,
        offset: usize,
    ) -> DiceResult<Vec<Wager>> {
        if self.store.get_account(account_id).await?.is_none() {
            return Err(GameError::NotFound(format!("account {}", account_id)));
        }
        let limit = limit
            .unwrap_or(self.config.default_history_limit)
            .clamp(1, self.config.max_history_limit);
        Ok(self.store.list_wagers(account_id, limit, offset).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::seeds::SeedLifecycleManager;
    use crate::games::notifier::NoopNotifier;
    use crate::store::MemoryStore;

    struct Fixture {
        seeds: SeedLifecycleManager,
        settlement: SettlementCoordinator,
        locks: AccountLocks,
    }

    fn fixture() -> Fixture {
        let store: Arc<dyn GameStore> = Arc::new(MemoryStore::new());
        let locks = AccountLocks::new();
        let metrics = MetricsRegistry::new();
        let config = GameConfig::default();
        Fixture {
            seeds: SeedLifecycleManager::new(
                store.clone(),
                locks.clone(),
                Arc::new(NoopNotifier),
                metrics.clone(),
                config.clone(),
            ),
            settlement: SettlementCoordinator::new(store, locks.clone(), Arc::new(NoopNotifier), metrics, config),
            locks,
        }
    }

    fn bet(amount: u64, target: u32, direction: Direction) -> BetRequest {
        BetRequest::manual(amount, Hundredths::from_raw(target), direction)
    }

    #[tokio::test]
    async fn test_settle_consumes_nonce_and_moves_balance() {
        let f = fixture();
        let account = f.seeds.create_account("alice").await.unwrap();

        let outcome = f
            .settlement
            .settle(account.account_id, bet(1000, 5000, Direction::Under))
            .await
            .unwrap();
        let wager = &outcome.wager;

        assert_eq!(wager.nonce, 1);
        assert_eq!(outcome.new_nonce, 2);
        assert_eq!(wager.win, wager.roll < Hundredths::from_raw(5000));
        let expected = if wager.win { 100_000 + 980 } else { 100_000 - 1000 };
        assert_eq!(outcome.new_balance, expected);
        assert_eq!(wager.payout_multiplier, 1.98);
        assert_eq!(wager.server_seed_hash, account.seeds.server_seed_hash());
    }

    #[tokio::test]
    async fn test_roll_matches_revealed_seed() {
        let f = fixture();
        let account = f.seeds.create_account("alice").await.unwrap();
        let outcome = f
            .settlement
            .settle(account.account_id, bet(100, 5000, Direction::Over))
            .await
            .unwrap();

        let rotation = f.seeds.rotate_server_seed(account.account_id, None).await.unwrap();
        let replay = roll_engine::roll(
            &rotation.revealed.server_seed,
            &outcome.wager.client_seed,
            outcome.wager.nonce,
        );
        assert_eq!(replay.roll, outcome.wager.roll);
        assert_eq!(replay.hmac, outcome.wager.hmac);
    }

    #[tokio::test]
    async fn test_validation_rejects_without_mutation() {
        let f = fixture();
        let account = f.seeds.create_account("alice").await.unwrap();
        let id = account.account_id;

        let cases = [
            bet(0, 5000, Direction::Under),
            bet(1_000_001, 5000, Direction::Under),
            bet(100, 0, Direction::Under),
            bet(100, 10_000, Direction::Over),
            // Win chance 96% exceeds the 95% ceiling
            bet(100, 9600, Direction::Under),
            bet(100, 400, Direction::Over),
        ];
        for request in cases {
            let err = f.settlement.settle(id, request).await.unwrap_err();
            assert!(matches!(err, GameError::Validation(_)), "{:?}", err);
        }

        let seeds = f.seeds.current_seeds(id).await.unwrap();
        assert_eq!(seeds.nonce, 1);
        assert!(f.settlement.history(id, None, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insufficient_balance() {
        let f = fixture();
        let account = f.seeds.create_account("alice").await.unwrap();
        let err = f
            .settlement
            .settle(account.account_id, bet(100_001, 5000, Direction::Under))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GameError::InsufficientBalance { required: 100_001, available: 100_000 }
        ));
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let f = fixture();
        let err = f
            .settlement
            .settle(Uuid::new_v4(), bet(100, 5000, Direction::Under))
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unknown_accounts_leave_no_lock_entries() {
        let f = fixture();
        for _ in 0..1000 {
            let err = f
                .settlement
                .settle(Uuid::new_v4(), bet(100, 5000, Direction::Under))
                .await
                .unwrap_err();
            assert!(matches!(err, GameError::NotFound(_)));
        }
        assert_eq!(f.locks.tracked_accounts(), 0);

        let account = f.seeds.create_account("tidy").await.unwrap();
        f.settlement
            .settle(account.account_id, bet(100, 5000, Direction::Under))
            .await
            .unwrap();
        assert_eq!(f.locks.tracked_accounts(), 0);
    }

    #[tokio::test]
    async fn test_history_is_newest_first() {
        let f = fixture();
        let account = f.seeds.create_account("alice").await.unwrap();
        for _ in 0..3 {
            f.settlement
                .settle(account.account_id, bet(10, 5000, Direction::Under))
                .await
                .unwrap();
        }
        let history = f.settlement.history(account.account_id, Some(2), 0).await.unwrap();
        let nonces: Vec<u64> = history.iter().map(|w| w.nonce).collect();
        assert_eq!(nonces, vec![3, 2]);
    }

    #[tokio::test]
    async fn test_concurrent_settles_use_distinct_nonces() {
        let f = Arc::new(fixture());
        let account = f.seeds.create_account("alice").await.unwrap();
        let id = account.account_id;

        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let f = f.clone();
                tokio::spawn(async move {
                    f.settlement.settle(id, bet(10, 5000, Direction::Under)).await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let seeds = f.seeds.current_seeds(id).await.unwrap();
        assert_eq!(seeds.nonce, 21);
        let mut nonces: Vec<u64> = f
            .settlement
            .history(id, Some(100), 0)
            .await
            .unwrap()
            .iter()
            .map(|w| w.nonce)
            .collect();
        nonces.sort_unstable();
        assert_eq!(nonces, (1..=20).collect::<Vec<_>>());
    }
}
