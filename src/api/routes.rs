//! Route definitions

use super::{handlers::*, middleware::count_requests_middleware, websocket::websocket_handler};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Build the API router with all endpoints
pub fn create_router(state: Arc<AppState>, enable_websockets: bool) -> Router {
    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        // Accounts
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/profile", get(profile_handler))
        // Game
        .route("/api/game/roll", post(roll_handler))
        .route("/api/game/history", get(history_handler))
        .route("/api/game/verify", get(verify_handler))
        .route("/api/game/config", get(game_config_handler))
        // Seeds
        .route("/api/seeds/hash", get(seed_hash_handler))
        .route("/api/seeds/reset", post(reset_seed_handler))
        .route("/api/seeds/client", post(client_seed_handler))
        .route("/api/seeds/history", get(seed_history_handler))
        .route("/api/seeds/unhash", post(unhash_handler));

    if enable_websockets {
        router = router.route("/ws", get(websocket_handler));
    }

    router
        .layer(middleware::from_fn_with_state(state.clone(), count_requests_middleware))
        .with_state(state)
}
