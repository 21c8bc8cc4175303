//! fairdice - provably fair dice game backend
//!
//! Rolls are derived from `HMAC-SHA256(server_seed, "client_seed:nonce")`.
//! The server seed is committed to by its SHA-256 hash before any roll uses
//! it and revealed once rotated out, so every settled wager can be replayed
//! by the player.
//!
//! - [`games`]: roll engine, payouts, seed lifecycle, settlement, auto-bet
//! - [`store`]: persistence boundary with in-memory and RocksDB backends
//! - [`api`]: axum HTTP and WebSocket surface

pub mod api;
pub mod config;
pub mod errors;
pub mod games;
pub mod metrics;
pub mod storage;
pub mod store;

pub use config::{ConfigLoader, DiceConfig};
pub use errors::{DiceResult, GameError};
pub use games::{BetRequest, DiceCasino, Direction, Hundredths};
pub use store::{GameStore, MemoryStore, RocksStore};
