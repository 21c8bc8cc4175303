//! Replay of settled wagers against revealed seeds

use crate::errors::{DiceResult, GameError};
use crate::games::payout;
use crate::games::roll_engine::{self, RollProof};
use crate::games::types::{sha256_hex, Wager};
use serde::Serialize;

const MAX_SERVER_SEED_LEN: usize = 256;

/// Recompute the roll for arbitrary inputs
pub fn verify_roll(server_seed: &str, client_seed: &str, nonce: u64) -> DiceResult<RollProof> {
    if server_seed.is_empty() || server_seed.len() > MAX_SERVER_SEED_LEN {
        return Err(GameError::validation(format!(
            "Server seed must be 1-{} characters",
            MAX_SERVER_SEED_LEN
        )));
    }
    if client_seed.is_empty() {
        return Err(GameError::validation("Client seed is required"));
    }
    Ok(roll_engine::roll(server_seed, client_seed, nonce))
}

/// Which parts of a stored wager agree with a replay
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct WagerAudit {
    /// The revealed seed hashes to the wager's committed hash
    pub commitment_matches: bool,
    pub hmac_matches: bool,
    pub roll_matches: bool,
    pub outcome_matches: bool,
    pub payout_matches: bool,
}

impl WagerAudit {
    pub fn is_valid(&self) -> bool {
        self.commitment_matches
            && self.hmac_matches
            && self.roll_matches
            && self.outcome_matches
            && self.payout_matches
    }
}

/// Check a wager against the server seed revealed for its hash
pub fn verify_wager(wager: &Wager, revealed_server_seed: &str, house_edge: f64) -> WagerAudit {
    let proof = roll_engine::roll(revealed_server_seed, &wager.client_seed, wager.nonce);
    let win = payout::is_win(wager.direction, wager.target, proof.roll);
    let win_chance = payout::win_chance(wager.direction, wager.target);

    let payout_matches = payout::payout_multiplier(win_chance, house_edge)
        .and_then(|multiplier| payout::settle(wager.bet_amount, multiplier, win))
        .map(|settled| settled.payout == wager.payout && settled.profit == wager.profit)
        .unwrap_or(false);

    WagerAudit {
        commitment_matches: sha256_hex(revealed_server_seed) == wager.server_seed_hash,
        hmac_matches: proof.hmac == wager.hmac,
        roll_matches: proof.roll == wager.roll,
        outcome_matches: win == wager.win && win_chance == wager.win_chance,
        payout_matches,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::types::{now_millis, BetType, Direction, Hundredths};
    use uuid::Uuid;

    fn settled_wager(server_seed: &str) -> Wager {
        // "a"x128 / "test" / nonce 0 rolls 70.35
        let proof = roll_engine::roll(server_seed, "test", 0);
        Wager {
            wager_id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            bet_amount: 1_000,
            direction: Direction::Over,
            target: Hundredths::from_raw(5_000),
            win_chance: Hundredths::from_raw(5_000),
            roll: proof.roll,
            win: true,
            payout_multiplier: 1.98,
            payout: 1_980,
            profit: 980,
            nonce: 0,
            server_seed_hash: sha256_hex(server_seed),
            client_seed: "test".to_string(),
            hmac: proof.hmac,
            bet_type: BetType::Manual,
            round_number: None,
            strategy: None,
            created_at: now_millis(),
        }
    }

    #[test]
    fn test_honest_wager_verifies() {
        let seed = "a".repeat(128);
        let wager = settled_wager(&seed);
        assert_eq!(wager.roll.to_string(), "70.35");
        assert!(verify_wager(&wager, &seed, 0.01).is_valid());
    }

    #[test]
    fn test_tampered_roll_is_detected() {
        let seed = "a".repeat(128);
        let mut wager = settled_wager(&seed);
        wager.roll = Hundredths::from_raw(1_234);
        let audit = verify_wager(&wager, &seed, 0.01);
        assert!(!audit.roll_matches);
        assert!(!audit.is_valid());
    }

    #[test]
    fn test_wrong_seed_fails_commitment() {
        let seed = "a".repeat(128);
        let wager = settled_wager(&seed);
        let audit = verify_wager(&wager, "not-the-seed", 0.01);
        assert!(!audit.commitment_matches);
        assert!(!audit.hmac_matches);
    }

    #[test]
    fn test_inflated_payout_is_detected() {
        let seed = "a".repeat(128);
        let mut wager = settled_wager(&seed);
        wager.payout = 5_000;
        wager.profit = 4_000;
        assert!(!verify_wager(&wager, &seed, 0.01).payout_matches);
    }

    #[test]
    fn test_verify_roll_inputs() {
        let proof = verify_roll(&"a".repeat(128), "test", 1).unwrap();
        assert_eq!(proof.roll.to_string(), "16.18");
        assert!(verify_roll("", "test", 1).is_err());
        assert!(verify_roll("seed", "", 1).is_err());
    }
}
