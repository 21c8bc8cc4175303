//! API request and response models.
//!
//! Money crosses the wire as decimal amounts (12.34) and is stored as cents.
//! Rolls, targets and win chances cross as decimals with two places.

use crate::games::seeds::RotationOutcome;
use crate::games::types::{Account, BetType, Direction, Hundredths, PublicSeedState, SeedRotationRecord, Wager};
use crate::games::SettlementOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub fn cents_to_amount(cents: u64) -> f64 {
    cents as f64 / 100.0
}

pub fn signed_cents_to_amount(cents: i64) -> f64 {
    cents as f64 / 100.0
}

/// Decimal amount to cents, rejecting negative or non-finite input
pub fn amount_to_cents(amount: f64) -> Option<u64> {
    let cents = (amount * 100.0).round();
    (cents.is_finite() && cents >= 0.0 && cents < u64::MAX as f64).then_some(cents as u64)
}

pub fn timestamp(millis: u64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(i64::try_from(millis).unwrap_or(i64::MAX)).unwrap_or_default()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsView {
    pub total_bets: u64,
    pub wins: u64,
    pub losses: u64,
    pub total_wagered: f64,
    pub total_profit: f64,
    pub seed_rotations: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub username: String,
    pub balance: f64,
    pub client_seed: String,
    pub server_seed_hash: String,
    pub nonce: u64,
    pub created_at: DateTime<Utc>,
    pub stats: StatsView,
}

impl From<&Account> for UserView {
    fn from(account: &Account) -> Self {
        Self {
            id: account.account_id,
            username: account.username.clone(),
            balance: cents_to_amount(account.balance),
            client_seed: account.seeds.client_seed().to_string(),
            server_seed_hash: account.seeds.server_seed_hash().to_string(),
            nonce: account.seeds.nonce(),
            created_at: timestamp(account.created_at),
            stats: StatsView {
                total_bets: account.stats.total_wagers,
                wins: account.stats.wins,
                losses: account.stats.losses,
                total_wagered: cents_to_amount(account.stats.total_wagered),
                total_profit: signed_cents_to_amount(account.stats.total_profit),
                seed_rotations: account.stats.rotations,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: UserView,
    pub created: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub user: UserView,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollRequest {
    pub bet_amount: f64,
    pub target: f64,
    pub direction: String,
    #[serde(default)]
    pub bet_type: BetType,
    #[serde(default)]
    pub round_number: Option<u64>,
    #[serde(default)]
    pub strategy: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetView {
    pub id: Uuid,
    pub bet_amount: f64,
    pub direction: Direction,
    pub target: f64,
    pub win_chance: f64,
    pub roll: f64,
    pub win: bool,
    pub payout_multiplier: f64,
    pub payout: f64,
    pub profit: f64,
    pub nonce: u64,
    pub server_seed_hash: String,
    pub client_seed: String,
    pub hmac: String,
    pub bet_type: BetType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Wager> for BetView {
    fn from(wager: &Wager) -> Self {
        Self {
            id: wager.wager_id,
            bet_amount: cents_to_amount(wager.bet_amount),
            direction: wager.direction,
            target: wager.target.as_f64(),
            win_chance: wager.win_chance.as_f64(),
            roll: wager.roll.as_f64(),
            win: wager.win,
            payout_multiplier: wager.payout_multiplier,
            payout: cents_to_amount(wager.payout),
            profit: signed_cents_to_amount(wager.profit),
            nonce: wager.nonce,
            server_seed_hash: wager.server_seed_hash.clone(),
            client_seed: wager.client_seed.clone(),
            hmac: wager.hmac.clone(),
            bet_type: wager.bet_type,
            round_number: wager.round_number,
            strategy: wager.strategy.clone(),
            created_at: timestamp(wager.created_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollResponse {
    pub roll: f64,
    pub win: bool,
    pub payout: f64,
    pub profit: f64,
    pub new_balance: f64,
    pub new_nonce: u64,
    pub server_seed_hash: String,
    pub bet: BetView,
}

impl From<&SettlementOutcome> for RollResponse {
    fn from(outcome: &SettlementOutcome) -> Self {
        let wager = &outcome.wager;
        Self {
            roll: wager.roll.as_f64(),
            win: wager.win,
            payout: cents_to_amount(wager.payout),
            profit: signed_cents_to_amount(wager.profit),
            new_balance: cents_to_amount(outcome.new_balance),
            new_nonce: outcome.new_nonce,
            server_seed_hash: wager.server_seed_hash.clone(),
            bet: BetView::from(wager),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
    #[serde(default)]
    pub skip: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub bets: Vec<BetView>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyQuery {
    pub server_seed: Option<String>,
    pub client_seed: Option<String>,
    pub nonce: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub roll: f64,
    pub hmac: String,
    pub server_seed_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameConfigResponse {
    pub min_bet: f64,
    pub max_bet: f64,
    pub house_edge: f64,
    pub min_win_chance: f64,
    pub max_win_chance: f64,
    pub min_target: f64,
    pub max_target: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedStateResponse {
    pub server_seed_hash: String,
    pub client_seed: String,
    pub nonce: u64,
}

impl From<PublicSeedState> for SeedStateResponse {
    fn from(seeds: PublicSeedState) -> Self {
        Self {
            server_seed_hash: seeds.server_seed_hash,
            client_seed: seeds.client_seed,
            nonce: seeds.nonce,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetSeedRequest {
    #[serde(default)]
    pub client_seed: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetSeedResponse {
    pub previous_server_seed: String,
    pub previous_server_seed_hash: String,
    pub previous_client_seed: String,
    pub final_nonce: u64,
    pub new_server_seed_hash: String,
    pub client_seed: String,
    pub nonce: u64,
    pub message: String,
}

impl From<&RotationOutcome> for ResetSeedResponse {
    fn from(outcome: &RotationOutcome) -> Self {
        Self {
            previous_server_seed: outcome.revealed.server_seed.clone(),
            previous_server_seed_hash: outcome.revealed.server_seed_hash.clone(),
            previous_client_seed: outcome.revealed.client_seed.clone(),
            final_nonce: outcome.revealed.final_nonce,
            new_server_seed_hash: outcome.seeds.server_seed_hash.clone(),
            client_seed: outcome.seeds.client_seed.clone(),
            nonce: outcome.seeds.nonce,
            message: "Server seed rotated. The previous seed is now revealed.".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSeedRequest {
    pub client_seed: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedHistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationView {
    pub server_seed: String,
    pub server_seed_hash: String,
    pub client_seed: String,
    pub final_nonce: u64,
    pub revealed_at: DateTime<Utc>,
}

impl From<&SeedRotationRecord> for RotationView {
    fn from(record: &SeedRotationRecord) -> Self {
        Self {
            server_seed: record.server_seed.clone(),
            server_seed_hash: record.server_seed_hash.clone(),
            client_seed: record.client_seed.clone(),
            final_nonce: record.final_nonce,
            revealed_at: timestamp(record.revealed_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedHistoryResponse {
    pub history: Vec<RotationView>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnhashRequest {
    pub server_seed_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnhashResponse {
    pub server_seed: String,
    pub server_seed_hash: String,
    pub revealed_at: DateTime<Utc>,
}

impl From<&SeedRotationRecord> for UnhashResponse {
    fn from(record: &SeedRotationRecord) -> Self {
        Self {
            server_seed: record.server_seed.clone(),
            server_seed_hash: record.server_seed_hash.clone(),
            revealed_at: timestamp(record.revealed_at),
        }
    }
}

/// Target as sent by clients, e.g. `49.5`. Sub-hundredth precision is refused.
pub fn parse_target(target: f64) -> Option<Hundredths> {
    Hundredths::from_f64(target)
}
