use crate::errors::{GameError, StoreError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

pub type AccountId = Uuid;

/// Fixed-point value with exactly two decimal places, stored as hundredths.
///
/// Rolls, targets and win chances all use this representation, so `70.35`
/// is `Hundredths(7035)` and comparisons against a target are exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hundredths(u32);

impl Hundredths {
    pub const ZERO: Self = Self(0);
    pub const HUNDRED: Self = Self(10_000);

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Convert a decimal such as `49.5`. Values that are not a whole number of
    /// hundredths (`49.991`) are refused rather than rounded.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        let exact = value * 100.0;
        let scaled = exact.round();
        if (exact - scaled).abs() > 1e-9 || scaled > u32::MAX as f64 {
            return None;
        }
        Some(Self(scaled as u32))
    }
}

impl fmt::Display for Hundredths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// Which side of the target the player bets on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Over,
    Under,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Over => Direction::Under,
            Direction::Under => Direction::Over,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Over => write!(f, "over"),
            Direction::Under => write!(f, "under"),
        }
    }
}

impl FromStr for Direction {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "over" => Ok(Direction::Over),
            "under" => Ok(Direction::Under),
            other => Err(GameError::validation(format!(
                "Invalid direction '{}': expected 'over' or 'under'",
                other
            ))),
        }
    }
}

/// How a wager was placed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BetType {
    #[default]
    Manual,
    Auto,
}

/// Lowercase hex SHA-256 of a UTF-8 string
pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Milliseconds since the unix epoch
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// The active seed pair of an account.
///
/// The hash is always derived from the seed inside the constructor, so a
/// pair built through this API cannot publish a hash that does not match.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeedPair {
    server_seed: String,
    server_seed_hash: String,
    client_seed: String,
    nonce: u64,
}

impl SeedPair {
    pub fn new(server_seed: String, client_seed: String, nonce: u64) -> Self {
        let server_seed_hash = sha256_hex(&server_seed);
        Self {
            server_seed,
            server_seed_hash,
            client_seed,
            nonce,
        }
    }

    /// Secret while active. Only the settlement and rotation paths read it.
    pub(crate) fn server_seed(&self) -> &str {
        &self.server_seed
    }

    pub fn server_seed_hash(&self) -> &str {
        &self.server_seed_hash
    }

    pub fn client_seed(&self) -> &str {
        &self.client_seed
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// True when the stored hash still commits to the stored seed
    pub fn is_consistent(&self) -> bool {
        sha256_hex(&self.server_seed) == self.server_seed_hash
    }

    pub fn public(&self) -> PublicSeedState {
        PublicSeedState {
            server_seed_hash: self.server_seed_hash.clone(),
            client_seed: self.client_seed.clone(),
            nonce: self.nonce,
        }
    }

    pub(crate) fn with_client_seed(&self, client_seed: String) -> Self {
        Self {
            client_seed,
            ..self.clone()
        }
    }

    fn advanced(&self) -> Self {
        Self {
            nonce: self.nonce + 1,
            ..self.clone()
        }
    }
}

impl fmt::Debug for SeedPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeedPair")
            .field("server_seed", &"<redacted>")
            .field("server_seed_hash", &self.server_seed_hash)
            .field("client_seed", &self.client_seed)
            .field("nonce", &self.nonce)
            .finish()
    }
}

/// Seed data that is safe to publish
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublicSeedState {
    pub server_seed_hash: String,
    pub client_seed: String,
    pub nonce: u64,
}

/// Running totals kept alongside the account
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountStats {
    pub total_wagers: u64,
    pub wins: u64,
    pub losses: u64,
    /// Sum of bet amounts in cents
    pub total_wagered: u64,
    pub total_profit: i64,
    pub rotations: u64,
}

/// Player account owning exactly one active seed pair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub account_id: AccountId,
    pub username: String,
    /// Balance in cents
    pub balance: u64,
    pub seeds: SeedPair,
    pub created_at: u64,
    pub seeds_rotated_at: Option<u64>,
    pub stats: AccountStats,
}

impl Account {
    pub fn new(username: String, seeds: SeedPair, balance: u64) -> Self {
        Self {
            account_id: Uuid::new_v4(),
            username,
            balance,
            seeds,
            created_at: now_millis(),
            seeds_rotated_at: None,
            stats: AccountStats::default(),
        }
    }

    /// State after `wager` settles: nonce +1, balance += profit.
    ///
    /// Refuses a wager computed against a different nonce or seed generation.
    pub(crate) fn apply_wager(&self, wager: &Wager) -> Result<Account, StoreError> {
        if wager.account_id != self.account_id {
            return Err(StoreError::Conflict(format!(
                "wager {} belongs to another account",
                wager.wager_id
            )));
        }
        if wager.nonce != self.seeds.nonce() {
            return Err(StoreError::Conflict(format!(
                "stale nonce: wager used {}, account is at {}",
                wager.nonce,
                self.seeds.nonce()
            )));
        }
        if wager.server_seed_hash != self.seeds.server_seed_hash()
            || wager.client_seed != self.seeds.client_seed()
        {
            return Err(StoreError::Conflict(
                "wager was rolled under a different seed pair".to_string(),
            ));
        }

        let balance = i128::from(self.balance) + i128::from(wager.profit);
        let balance = u64::try_from(balance)
            .map_err(|_| StoreError::Conflict(format!("balance out of range: {}", balance)))?;

        let mut next = self.clone();
        next.balance = balance;
        next.seeds = self.seeds.advanced();
        next.stats.total_wagers += 1;
        next.stats.total_wagered = next.stats.total_wagered.saturating_add(wager.bet_amount);
        next.stats.total_profit = next.stats.total_profit.saturating_add(wager.profit);
        if wager.win {
            next.stats.wins += 1;
        } else {
            next.stats.losses += 1;
        }
        Ok(next)
    }

    /// State after retiring the active seed described by `record` in favour of `next_seeds`.
    pub(crate) fn apply_rotation(
        &self,
        record: &SeedRotationRecord,
        next_seeds: SeedPair,
    ) -> Result<Account, StoreError> {
        if record.server_seed_hash != self.seeds.server_seed_hash() {
            return Err(StoreError::Conflict(
                "rotation record does not match the active seed".to_string(),
            ));
        }
        if !record.verifies() || !next_seeds.is_consistent() {
            return Err(StoreError::Conflict(
                "seed hash does not commit to its seed".to_string(),
            ));
        }

        let mut next = self.clone();
        next.seeds = next_seeds;
        next.seeds_rotated_at = Some(record.revealed_at);
        next.stats.rotations += 1;
        Ok(next)
    }
}

/// Immutable record of one settled roll
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Wager {
    pub wager_id: Uuid,
    pub account_id: AccountId,
    /// Bet amount in cents
    pub bet_amount: u64,
    pub direction: Direction,
    pub target: Hundredths,
    pub win_chance: Hundredths,
    pub roll: Hundredths,
    pub win: bool,
    /// Multiplier rounded to four decimals
    pub payout_multiplier: f64,
    /// Payout in cents (0 on a loss)
    pub payout: u64,
    /// Payout minus bet, in cents
    pub profit: i64,
    /// Nonce consumed by this roll
    pub nonce: u64,
    pub server_seed_hash: String,
    pub client_seed: String,
    /// HMAC-SHA256(server_seed, "client_seed:nonce") in hex
    pub hmac: String,
    pub bet_type: BetType,
    /// Position inside an auto-bet run
    #[serde(default)]
    pub round_number: Option<u64>,
    /// Name of the auto-bet strategy that placed the bet
    #[serde(default)]
    pub strategy: Option<String>,
    pub created_at: u64,
}

/// A retired server seed, published for verification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeedRotationRecord {
    pub account_id: AccountId,
    pub server_seed: String,
    pub server_seed_hash: String,
    /// Client seed in force when the server seed was retired
    pub client_seed: String,
    /// First nonce that was never used under this seed
    pub final_nonce: u64,
    pub revealed_at: u64,
}

impl SeedRotationRecord {
    pub fn verifies(&self) -> bool {
        sha256_hex(&self.server_seed) == self.server_seed_hash
    }
}
