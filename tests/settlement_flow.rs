//! End-to-end settlement against real stores: persistence across restarts,
//! no partial commits on store failure, and replay of settled bets once the
//! server seed is revealed.

use async_trait::async_trait;
use fairdice::config::GameConfig;
use fairdice::errors::{StoreError, StoreResult};
use fairdice::games::types::{Account, AccountId, SeedPair, SeedRotationRecord, Wager};
use fairdice::games::verification::verify_wager;
use fairdice::games::{BetRequest, DiceCasino, Direction, Hundredths, NoopNotifier};
use fairdice::metrics::MetricsRegistry;
use fairdice::{GameError, GameStore, MemoryStore, RocksStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

fn casino(store: Arc<dyn GameStore>) -> DiceCasino {
    DiceCasino::new(store, GameConfig::default(), Arc::new(NoopNotifier), MetricsRegistry::new())
}

fn over_50(cents: u64) -> BetRequest {
    BetRequest::manual(cents, Hundredths::from_raw(5_000), Direction::Over)
}

#[tokio::test]
async fn test_rocks_state_survives_reopen() {
    let dir = TempDir::new().unwrap();

    let (account_id, balance, nonce, revealed_hash) = {
        let store: Arc<dyn GameStore> = Arc::new(RocksStore::open(dir.path()).unwrap());
        let casino = casino(store);
        let account = casino.seeds().create_account("persistent").await.unwrap();

        for _ in 0..5 {
            casino.settlement().settle(account.account_id, over_50(100)).await.unwrap();
        }
        let rotation = casino.seeds().rotate_server_seed(account.account_id, None).await.unwrap();
        casino.settlement().settle(account.account_id, over_50(100)).await.unwrap();

        let after = casino.seeds().account(account.account_id).await.unwrap();
        (
            account.account_id,
            after.balance,
            after.seeds.nonce(),
            rotation.revealed.server_seed_hash,
        )
    };

    let store: Arc<dyn GameStore> = Arc::new(RocksStore::open(dir.path()).unwrap());
    let casino = casino(store);
    let account = casino.seeds().account(account_id).await.unwrap();
    assert_eq!(account.balance, balance);
    assert_eq!(account.seeds.nonce(), nonce);
    assert_eq!(account.stats.total_wagers, 6);
    assert_eq!(account.stats.rotations, 1);

    let history = casino.settlement().history(account_id, None, 0).await.unwrap();
    assert_eq!(history.len(), 6);
    assert!(history.windows(2).all(|w| w[0].created_at >= w[1].created_at));

    let revealed = casino.seeds().reveal(&revealed_hash).await.unwrap();
    assert!(revealed.verifies());
    assert_eq!(revealed.final_nonce, 6);

    let (same, created) = casino.seeds().login_or_create("persistent").await.unwrap();
    assert!(!created);
    assert_eq!(same.account_id, account_id);
}

/// Delegates to a `MemoryStore` but can be told to fail commits
struct FlakyStore {
    inner: MemoryStore,
    fail_commits: AtomicBool,
}

impl FlakyStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_commits: AtomicBool::new(false),
        }
    }

    fn check(&self) -> StoreResult<()> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("disk unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl GameStore for FlakyStore {
    async fn insert_account(&self, account: &Account) -> StoreResult<()> {
        self.inner.insert_account(account).await
    }

    async fn get_account(&self, account_id: AccountId) -> StoreResult<Option<Account>> {
        self.inner.get_account(account_id).await
    }

    async fn find_account_by_username(&self, username: &str) -> StoreResult<Option<Account>> {
        self.inner.find_account_by_username(username).await
    }

    async fn update_client_seed(&self, account_id: AccountId, client_seed: &str) -> StoreResult<Account> {
        self.inner.update_client_seed(account_id, client_seed).await
    }

    async fn commit_wager(&self, wager: &Wager) -> StoreResult<Account> {
        self.check()?;
        self.inner.commit_wager(wager).await
    }

    async fn list_wagers(&self, account_id: AccountId, limit: usize, offset: usize) -> StoreResult<Vec<Wager>> {
        self.inner.list_wagers(account_id, limit, offset).await
    }

    async fn commit_rotation(&self, record: &SeedRotationRecord, next_seeds: SeedPair) -> StoreResult<Account> {
        self.check()?;
        self.inner.commit_rotation(record, next_seeds).await
    }

    async fn find_rotation_by_hash(&self, server_seed_hash: &str) -> StoreResult<Option<SeedRotationRecord>> {
        self.inner.find_rotation_by_hash(server_seed_hash).await
    }

    async fn list_rotations(&self, account_id: AccountId, limit: usize) -> StoreResult<Vec<SeedRotationRecord>> {
        self.inner.list_rotations(account_id, limit).await
    }

    async fn is_active_server_seed_hash(&self, server_seed_hash: &str) -> StoreResult<bool> {
        self.inner.is_active_server_seed_hash(server_seed_hash).await
    }
}

#[tokio::test]
async fn test_failed_commit_leaves_no_trace() {
    let store = Arc::new(FlakyStore::new());
    let casino = casino(store.clone());
    let account = casino.seeds().create_account("flaky").await.unwrap();
    let before = casino.seeds().account(account.account_id).await.unwrap();

    store.fail_commits.store(true, Ordering::SeqCst);
    let err = casino.settlement().settle(account.account_id, over_50(500)).await.unwrap_err();
    assert!(matches!(err, GameError::Persistence(_)));
    let err = casino.seeds().rotate_server_seed(account.account_id, None).await.unwrap_err();
    assert!(matches!(err, GameError::Persistence(_)));

    let after = casino.seeds().account(account.account_id).await.unwrap();
    assert_eq!(after, before);
    assert!(casino.settlement().history(account.account_id, None, 0).await.unwrap().is_empty());
    assert!(casino.seeds().history(account.account_id, None).await.unwrap().is_empty());

    // The same nonce is used once the store recovers
    store.fail_commits.store(false, Ordering::SeqCst);
    let outcome = casino.settlement().settle(account.account_id, over_50(500)).await.unwrap();
    assert_eq!(outcome.wager.nonce, before.seeds.nonce());
}

#[tokio::test]
async fn test_concurrent_bets_on_rocks_consume_distinct_nonces() {
    let dir = TempDir::new().unwrap();
    let store: Arc<dyn GameStore> = Arc::new(RocksStore::open(dir.path()).unwrap());
    let casino = Arc::new(casino(store));
    let account = casino.seeds().create_account("racer").await.unwrap();
    let account_id = account.account_id;
    let start_nonce = account.seeds.nonce();

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let casino = casino.clone();
            tokio::spawn(async move { casino.settlement().settle(account_id, over_50(10)).await })
        })
        .collect();

    let mut nonces = Vec::new();
    let mut profit = 0i64;
    for task in tasks {
        let outcome = task.await.unwrap().unwrap();
        nonces.push(outcome.wager.nonce);
        profit += outcome.wager.profit;
    }
    nonces.sort_unstable();
    assert_eq!(nonces, (start_nonce..start_nonce + 16).collect::<Vec<_>>());

    let after = casino.seeds().account(account.account_id).await.unwrap();
    assert_eq!(after.seeds.nonce(), start_nonce + 16);
    assert_eq!(after.balance as i64, account.balance as i64 + profit);
    assert_eq!(casino.settlement().history(account.account_id, Some(100), 0).await.unwrap().len(), 16);
}

#[tokio::test]
async fn test_every_settled_bet_replays_after_reveal() {
    let store: Arc<dyn GameStore> = Arc::new(MemoryStore::new());
    let casino = casino(store);
    let account = casino.seeds().create_account("auditor").await.unwrap();
    let house_edge = casino.config().house_edge;

    let requests = [
        BetRequest::manual(250, Hundredths::from_raw(5_000), Direction::Over),
        BetRequest::manual(250, Hundredths::from_raw(2_500), Direction::Under),
        BetRequest::manual(100, Hundredths::from_raw(9_000), Direction::Under),
        BetRequest::manual(100, Hundredths::from_raw(1_000), Direction::Over),
    ];
    for request in requests {
        casino.settlement().settle(account.account_id, request).await.unwrap();
    }

    let wagers = casino.settlement().history(account.account_id, None, 0).await.unwrap();
    let hash = account.seeds.server_seed_hash().to_string();
    assert!(matches!(casino.seeds().reveal(&hash).await, Err(GameError::Forbidden(_))));

    let rotation = casino.seeds().rotate_server_seed(account.account_id, None).await.unwrap();
    let revealed = casino.seeds().reveal(&hash).await.unwrap();
    assert_eq!(revealed.server_seed, rotation.revealed.server_seed);

    for wager in &wagers {
        let audit = verify_wager(wager, &revealed.server_seed, house_edge);
        assert!(audit.is_valid(), "wager at nonce {} failed audit: {:?}", wager.nonce, audit);
    }

    let mut tampered = wagers[0].clone();
    tampered.win = !tampered.win;
    assert!(!verify_wager(&tampered, &revealed.server_seed, house_edge).is_valid());
}
