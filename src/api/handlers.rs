//! Request handlers
//!
//! Every handler resolves its caller, applies the rate limit for its scope,
//! and delegates to the game core. Errors leave as `ApiError`.

use super::{
    errors::ApiError,
    middleware::{Caller, RequestId},
    models::*,
    rate_limit::{LimitScope, RateLimiter},
    websocket::WebSocketManager,
};
use crate::errors::GameError;
use crate::games::settlement::BetRequest;
use crate::games::verification::verify_roll;
use crate::games::{
    types::{sha256_hex, Direction},
    DiceCasino,
};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use std::sync::Arc;
use tracing::debug;

/// Shared application state
pub struct AppState {
    pub casino: Arc<DiceCasino>,
    pub rate_limiter: RateLimiter,
    pub websocket_manager: Arc<WebSocketManager>,
    pub version: String,
}

impl AppState {
    fn fail(&self, request_id: &RequestId, error: GameError) -> ApiError {
        self.casino.metrics().record_error();
        ApiError::game(request_id.0.clone(), error)
    }

    /// Charge the caller's budget for `scope`. Unknown accounts are refused before a bucket exists.
    async fn admit(&self, request_id: &RequestId, scope: LimitScope, caller: Caller) -> Result<(), ApiError> {
        self.casino
            .seeds()
            .account(caller.0)
            .await
            .map_err(|e| self.fail(request_id, e))?;
        self.rate_limiter.check(scope, caller.0).map_err(|retry_after| {
            self.casino.metrics().record_rate_limited();
            debug!(account_id = %caller.0, ?scope, retry_after, "Rate limited");
            ApiError::rate_limited(request_id.0.clone(), retry_after)
        })
    }
}

/// GET /health
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "Running".to_string(),
        version: state.version.clone(),
    })
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.casino.metrics().to_prometheus_format(),
    )
        .into_response()
}

/// POST /api/auth/login
///
/// Finds the account by username or opens a new one with a fresh seed pair.
pub async fn login_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<(StatusCode, Json<LoginResponse>), ApiError> {
    let (account, created) = state
        .casino
        .seeds()
        .login_or_create(&request.username)
        .await
        .map_err(|e| state.fail(&request_id, e))?;

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((
        status,
        Json(LoginResponse {
            user: UserView::from(&account),
            created,
        }),
    ))
}

/// GET /api/auth/profile
pub async fn profile_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Result<Json<ProfileResponse>, ApiError> {
    let account = state
        .casino
        .seeds()
        .account(caller.0)
        .await
        .map_err(|e| state.fail(&request_id, e))?;
    Ok(Json(ProfileResponse {
        user: UserView::from(&account),
    }))
}

fn bet_request(request_id: &RequestId, request: RollRequest) -> Result<BetRequest, ApiError> {
    let bet_amount = amount_to_cents(request.bet_amount)
        .ok_or_else(|| ApiError::bad_request(request_id.0.clone(), "betAmount must be a non-negative amount"))?;
    let target = parse_target(request.target)
        .ok_or_else(|| ApiError::bad_request(request_id.0.clone(), "target must be a non-negative number with at most two decimals"))?;
    let direction = request
        .direction
        .parse::<Direction>()
        .map_err(|e| ApiError::game(request_id.0.clone(), e))?;

    Ok(BetRequest {
        bet_amount,
        target,
        direction,
        bet_type: request.bet_type,
        round_number: request.round_number,
        strategy: request.strategy,
    })
}

/// POST /api/game/roll
pub async fn roll_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(request): Json<RollRequest>,
) -> Result<Json<RollResponse>, ApiError> {
    state.admit(&request_id, LimitScope::Bets, caller).await?;
    let bet = bet_request(&request_id, request)?;

    let outcome = state
        .casino
        .settlement()
        .settle(caller.0, bet)
        .await
        .map_err(|e| state.fail(&request_id, e))?;
    Ok(Json(RollResponse::from(&outcome)))
}

/// GET /api/game/history?limit={n}&skip={n}
pub async fn history_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let wagers = state
        .casino
        .settlement()
        .history(caller.0, query.limit, query.skip)
        .await
        .map_err(|e| state.fail(&request_id, e))?;
    Ok(Json(HistoryResponse {
        bets: wagers.iter().map(BetView::from).collect(),
    }))
}

/// GET /api/game/verify?serverSeed={s}&clientSeed={c}&nonce={n}
///
/// Public. Recomputes a roll from revealed inputs without touching any account.
pub async fn verify_handler(
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<VerifyQuery>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let (server_seed, client_seed, nonce) = match (query.server_seed, query.client_seed, query.nonce) {
        (Some(server_seed), Some(client_seed), Some(nonce)) => (server_seed, client_seed, nonce),
        _ => {
            return Err(ApiError::bad_request(
                request_id.0,
                "serverSeed, clientSeed and nonce are required",
            ))
        }
    };

    let proof = verify_roll(&server_seed, &client_seed, nonce).map_err(|e| ApiError::game(request_id.0.clone(), e))?;
    Ok(Json(VerifyResponse {
        roll: proof.roll.as_f64(),
        hmac: proof.hmac,
        server_seed_hash: sha256_hex(&server_seed),
    }))
}

/// GET /api/game/config
pub async fn game_config_handler(State(state): State<Arc<AppState>>) -> Json<GameConfigResponse> {
    let config = state.casino.config();
    Json(GameConfigResponse {
        min_bet: cents_to_amount(config.min_bet),
        max_bet: cents_to_amount(config.max_bet),
        house_edge: config.house_edge,
        min_win_chance: config.min_win_chance.as_f64(),
        max_win_chance: config.max_win_chance.as_f64(),
        min_target: config.min_win_chance.as_f64(),
        max_target: 100.0 - config.min_win_chance.as_f64(),
    })
}

/// GET /api/seeds/hash
pub async fn seed_hash_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Result<Json<SeedStateResponse>, ApiError> {
    let seeds = state
        .casino
        .seeds()
        .current_seeds(caller.0)
        .await
        .map_err(|e| state.fail(&request_id, e))?;
    Ok(Json(seeds.into()))
}

/// POST /api/seeds/reset
///
/// Rotates the server seed and reveals the retired one. An optional
/// `clientSeed` replaces the client seed in the same step.
pub async fn reset_seed_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    caller: Caller,
    request: Option<Json<ResetSeedRequest>>,
) -> Result<Json<ResetSeedResponse>, ApiError> {
    state.admit(&request_id, LimitScope::Seeds, caller).await?;
    let request = request.map(|Json(r)| r).unwrap_or_default();

    let outcome = state
        .casino
        .seeds()
        .rotate_server_seed(caller.0, request.client_seed.as_deref())
        .await
        .map_err(|e| state.fail(&request_id, e))?;
    Ok(Json(ResetSeedResponse::from(&outcome)))
}

/// POST /api/seeds/client
pub async fn client_seed_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(request): Json<ClientSeedRequest>,
) -> Result<Json<SeedStateResponse>, ApiError> {
    state.admit(&request_id, LimitScope::Seeds, caller).await?;

    let seeds = state
        .casino
        .seeds()
        .update_client_seed(caller.0, &request.client_seed)
        .await
        .map_err(|e| state.fail(&request_id, e))?;
    Ok(Json(seeds.into()))
}

/// GET /api/seeds/history?limit={n}
pub async fn seed_history_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(query): Query<SeedHistoryQuery>,
) -> Result<Json<SeedHistoryResponse>, ApiError> {
    let history = state
        .casino
        .seeds()
        .history(caller.0, query.limit)
        .await
        .map_err(|e| state.fail(&request_id, e))?;
    Ok(Json(SeedHistoryResponse {
        history: history.iter().map(RotationView::from).collect(),
    }))
}

/// POST /api/seeds/unhash
///
/// Reveals a retired server seed by its hash. Active hashes are refused.
pub async fn unhash_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<UnhashRequest>,
) -> Result<Json<UnhashResponse>, ApiError> {
    let record = state
        .casino
        .seeds()
        .reveal(&request.server_seed_hash)
        .await
        .map_err(|e| state.fail(&request_id, e))?;
    Ok(Json(UnhashResponse::from(&record)))
}
