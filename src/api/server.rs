//! API server
//!
//! Wires the store, the game core, the live-update channel and the HTTP
//! stack together, then serves until a shutdown signal arrives.

use super::{
    handlers::AppState,
    middleware::{create_cors_layer, request_id_middleware},
    rate_limit::RateLimiter,
    routes::create_router,
    websocket::WebSocketManager,
};
use crate::config::DiceConfig;
use crate::games::DiceCasino;
use crate::metrics::MetricsRegistry;
use crate::store::{self, GameStore};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, warn};

pub struct ApiServer {
    config: DiceConfig,
    store: Arc<dyn GameStore>,
}

impl ApiServer {
    /// Open the configured store
    pub fn from_config(config: DiceConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let store = store::open(&config.storage)?;
        Ok(Self { config, store })
    }

    pub fn new(config: DiceConfig, store: Arc<dyn GameStore>) -> Self {
        Self { config, store }
    }

    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        // A subscriber may already be installed by an embedding binary
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "fairdice=info,tower_http=info".into()),
            )
            .try_init();

        let state = build_state(&self.config, self.store.clone());
        if self.config.api.enable_websockets {
            state.websocket_manager.start_background_tasks();
        }
        if self.config.rate_limit.enabled {
            state.rate_limiter.start_pruning(Duration::from_secs(60));
        }
        let app = create_app(state, &self.config);
        let addr = self.socket_addr()?;

        self.log_server_info(addr);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Listening on http://{}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("API server stopped gracefully");
        Ok(())
    }

    fn socket_addr(&self) -> Result<SocketAddr, Box<dyn std::error::Error>> {
        Ok(SocketAddr::from((
            self.config.api.host.parse::<std::net::IpAddr>()?,
            self.config.api.port,
        )))
    }

    fn log_server_info(&self, addr: SocketAddr) {
        let game = &self.config.game;
        info!(
            %addr,
            backend = ?self.config.storage.backend,
            data_dir = %self.config.storage.data_directory.display(),
            "Starting fairdice API server"
        );
        info!(
            min_bet = game.min_bet,
            max_bet = game.max_bet,
            house_edge = game.house_edge,
            min_win_chance = %game.min_win_chance,
            max_win_chance = %game.max_win_chance,
            "Game limits"
        );
        info!(
            enabled = self.config.rate_limit.enabled,
            bets = self.config.rate_limit.bet_points,
            bet_window_secs = self.config.rate_limit.bet_window_secs,
            seeds = self.config.rate_limit.seed_points,
            seed_window_secs = self.config.rate_limit.seed_window_secs,
            "Rate limits"
        );
        info!(
            origins = ?self.config.api.allowed_origins,
            timeout_secs = self.config.api.request_timeout_secs,
            websockets = self.config.api.enable_websockets,
            "HTTP settings"
        );
    }
}

/// Shared state with the WebSocket manager installed as the settlement notifier
pub fn build_state(config: &DiceConfig, store: Arc<dyn GameStore>) -> Arc<AppState> {
    let metrics = MetricsRegistry::new();
    let websocket_manager = Arc::new(WebSocketManager::new(metrics.clone()));
    let casino = DiceCasino::new(store, config.game.clone(), websocket_manager.clone(), metrics);

    Arc::new(AppState {
        casino: Arc::new(casino),
        rate_limiter: RateLimiter::new(&config.rate_limit),
        websocket_manager,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Router plus the middleware stack
pub fn create_app(state: Arc<AppState>, config: &DiceConfig) -> axum::Router {
    create_router(state, config.api.enable_websockets)
        // Request ID middleware (first for tracing)
        .layer(axum::middleware::from_fn(request_id_middleware))
        // CORS before timeout to handle preflight
        .layer(create_cors_layer(config.api.allowed_origins.clone()))
        .layer(TimeoutLayer::new(config.api.request_timeout()))
        .layer(TraceLayer::new_for_http())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
