//! Dice game core: rolls, payouts, seeds and settlement

pub mod account_lock;
pub mod autobet;
pub mod notifier;
pub mod payout;
pub mod roll_engine;
pub mod seeds;
pub mod settlement;
pub mod types;
pub mod verification;

pub use account_lock::AccountLocks;
pub use notifier::{AccountEvent, NoopNotifier, SettlementNotifier};
pub use seeds::{RotationOutcome, SeedLifecycleManager};
pub use settlement::{BetRequest, SettlementCoordinator, SettlementOutcome};
pub use types::*;

use crate::config::GameConfig;
use crate::metrics::MetricsRegistry;
use crate::store::GameStore;
use std::sync::Arc;

/// The seed manager and settlement coordinator wired to one store and one lock table
pub struct DiceCasino {
    seeds: SeedLifecycleManager,
    settlement: SettlementCoordinator,
    config: GameConfig,
    metrics: MetricsRegistry,
}

impl DiceCasino {
    pub fn new(
        store: Arc<dyn GameStore>,
        config: GameConfig,
        notifier: Arc<dyn SettlementNotifier>,
        metrics: MetricsRegistry,
    ) -> Self {
        let locks = AccountLocks::new();
        Self {
            seeds: SeedLifecycleManager::new(
                store.clone(),
                locks.clone(),
                notifier.clone(),
                metrics.clone(),
                config.clone(),
            ),
            settlement: SettlementCoordinator::new(store, locks, notifier, metrics.clone(), config.clone()),
            config,
            metrics,
        }
    }

    pub fn seeds(&self) -> &SeedLifecycleManager {
        &self.seeds
    }

    pub fn settlement(&self) -> &SettlementCoordinator {
        &self.settlement
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }
}
