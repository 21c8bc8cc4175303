//! HTTP and WebSocket surface of the dice service
//!
//! JSON endpoints for accounts, bets and seeds, a public verifier, and a
//! per-account live-update socket.

pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod rate_limit;
pub mod routes;
pub mod server;
pub mod websocket;

pub use server::{build_state, create_app, ApiServer};
