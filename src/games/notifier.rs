//! Live-update hook fired after successful commits

use crate::games::types::{AccountId, PublicSeedState, Wager};

/// Event published once a state change is durable
#[derive(Debug, Clone)]
pub enum AccountEvent {
    BetSettled {
        wager: Wager,
        new_balance: u64,
        new_nonce: u64,
    },
    SeedsRotated {
        account_id: AccountId,
        revealed_server_seed: String,
        revealed_server_seed_hash: String,
        seeds: PublicSeedState,
    },
    ClientSeedChanged {
        account_id: AccountId,
        seeds: PublicSeedState,
    },
}

impl AccountEvent {
    pub fn account_id(&self) -> AccountId {
        match self {
            AccountEvent::BetSettled { wager, .. } => wager.account_id,
            AccountEvent::SeedsRotated { account_id, .. } => *account_id,
            AccountEvent::ClientSeedChanged { account_id, .. } => *account_id,
        }
    }
}

/// Best-effort sink for account events. Delivery failures never fail the operation.
pub trait SettlementNotifier: Send + Sync {
    fn notify(&self, event: AccountEvent);
}

/// Drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl SettlementNotifier for NoopNotifier {
    fn notify(&self, _event: AccountEvent) {}
}
