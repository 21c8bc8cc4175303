//! WebSocket support for live account updates
//!
//! Pushes to the connected player:
//! - Settled bets with the new balance and nonce
//! - Server seed rotations with the revealed seed
//! - Client seed changes

use super::handlers::AppState;
use super::models::{cents_to_amount, BetView, SeedStateResponse};
use crate::games::notifier::{AccountEvent, SettlementNotifier};
use crate::games::types::{now_millis, AccountId};
use crate::metrics::MetricsRegistry;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{sync::broadcast, time::interval};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// WebSocket event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsEvent {
    /// Sent once after the upgrade
    #[serde(rename = "connected")]
    Connected {
        #[serde(rename = "accountId")]
        account_id: AccountId,
        timestamp: u64,
    },

    #[serde(rename = "bet_result")]
    BetResult {
        bet: BetView,
        #[serde(rename = "newBalance")]
        new_balance: f64,
        #[serde(rename = "newNonce")]
        new_nonce: u64,
    },

    #[serde(rename = "seed_rotated")]
    SeedRotated {
        #[serde(rename = "revealedServerSeed")]
        revealed_server_seed: String,
        #[serde(rename = "revealedServerSeedHash")]
        revealed_server_seed_hash: String,
        seeds: SeedStateResponse,
    },

    #[serde(rename = "client_seed_changed")]
    ClientSeedChanged { seeds: SeedStateResponse },

    /// Heartbeat to keep connection alive
    #[serde(rename = "heartbeat")]
    Heartbeat { timestamp: u64 },
}

/// Event tagged with its recipient. `None` goes to every client.
#[derive(Debug, Clone)]
struct Addressed {
    account_id: Option<AccountId>,
    event: WsEvent,
}

impl From<AccountEvent> for Addressed {
    fn from(event: AccountEvent) -> Self {
        let account_id = Some(event.account_id());
        let event = match event {
            AccountEvent::BetSettled { wager, new_balance, new_nonce } => WsEvent::BetResult {
                bet: BetView::from(&wager),
                new_balance: cents_to_amount(new_balance),
                new_nonce,
            },
            AccountEvent::SeedsRotated {
                revealed_server_seed,
                revealed_server_seed_hash,
                seeds,
                ..
            } => WsEvent::SeedRotated {
                revealed_server_seed,
                revealed_server_seed_hash,
                seeds: seeds.into(),
            },
            AccountEvent::ClientSeedChanged { seeds, .. } => WsEvent::ClientSeedChanged { seeds: seeds.into() },
        };
        Self { account_id, event }
    }
}

/// Fans account events out to connected sockets
#[derive(Clone)]
pub struct WebSocketManager {
    tx: broadcast::Sender<Addressed>,
    client_count: Arc<AtomicU64>,
    metrics: MetricsRegistry,
}

impl WebSocketManager {
    pub fn new(metrics: MetricsRegistry) -> Self {
        let (tx, _rx) = broadcast::channel(1024);

        Self {
            tx,
            client_count: Arc::new(AtomicU64::new(0)),
            metrics,
        }
    }

    /// Start background tasks
    pub fn start_background_tasks(&self) {
        self.start_heartbeat_task();
    }

    pub fn handle_upgrade(&self, ws: WebSocketUpgrade, account_id: AccountId) -> Response {
        let manager = self.clone();
        ws.on_upgrade(move |socket| async move { manager.handle_connection(socket, account_id).await })
    }

    async fn handle_connection(&self, socket: WebSocket, account_id: AccountId) {
        let client_id = Uuid::new_v4().to_string();
        let client_count = self.client_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.metrics.websocket_connected();

        info!(%client_id, %account_id, total = client_count, "WebSocket client connected");

        let (mut sender, mut receiver) = socket.split();
        let mut rx = self.tx.subscribe();

        let welcome = WsEvent::Connected {
            account_id,
            timestamp: now_millis(),
        };
        let sent = match serde_json::to_string(&welcome) {
            Ok(text) => sender.send(Message::Text(text)).await.is_ok(),
            Err(e) => {
                error!("Failed to serialize welcome message: {}", e);
                false
            }
        };

        if sent {
            let client_id_for_receive = client_id.clone();
            let client_id_for_send = client_id.clone();

            let mut receive_task = tokio::spawn(async move {
                while let Some(msg) = receiver.next().await {
                    match msg {
                        Ok(Message::Close(_)) => {
                            debug!("Client {} requested close", client_id_for_receive);
                            break;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!("WebSocket error from client {}: {}", client_id_for_receive, e);
                            break;
                        }
                    }
                }
            });

            let mut send_task = tokio::spawn(async move {
                loop {
                    let addressed = match rx.recv().await {
                        Ok(addressed) => addressed,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("Client {} lagged, skipped {} events", client_id_for_send, skipped);
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    };
                    if !should_send_event(&addressed, account_id) {
                        continue;
                    }

                    let message = match serde_json::to_string(&addressed.event) {
                        Ok(msg) => Message::Text(msg),
                        Err(e) => {
                            error!("Failed to serialize event: {}", e);
                            continue;
                        }
                    };

                    if sender.send(message).await.is_err() {
                        debug!("Client {} disconnected", client_id_for_send);
                        break;
                    }
                }
            });

            tokio::select! {
                _ = &mut receive_task => send_task.abort(),
                _ = &mut send_task => receive_task.abort(),
            }
        } else {
            warn!("Failed to send welcome message to client {}", client_id);
        }

        self.metrics.websocket_disconnected();
        let remaining = self.client_count.fetch_sub(1, Ordering::SeqCst) - 1;
        info!(%client_id, remaining, "WebSocket client disconnected");
    }

    pub fn client_count(&self) -> u64 {
        self.client_count.load(Ordering::SeqCst)
    }

    fn start_heartbeat_task(&self) {
        let tx = self.tx.clone();

        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(30));
            loop {
                interval.tick().await;
                // An error only means nobody is listening
                let _ = tx.send(Addressed {
                    account_id: None,
                    event: WsEvent::Heartbeat { timestamp: now_millis() },
                });
            }
        });
    }

    #[cfg(test)]
    fn subscribe(&self) -> broadcast::Receiver<Addressed> {
        self.tx.subscribe()
    }
}

impl SettlementNotifier for WebSocketManager {
    fn notify(&self, event: AccountEvent) {
        let addressed = Addressed::from(event);
        if self.tx.send(addressed).is_err() {
            debug!("No WebSocket clients to receive account event");
        }
    }
}

fn should_send_event(addressed: &Addressed, account_id: AccountId) -> bool {
    addressed.account_id.map_or(true, |target| target == account_id)
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub account_id: AccountId,
}

/// `GET /ws?account_id=...`
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    state.websocket_manager.handle_upgrade(ws, params.account_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::types::PublicSeedState;

    fn seeds() -> PublicSeedState {
        PublicSeedState {
            server_seed_hash: "ab".repeat(32),
            client_seed: "client".to_string(),
            nonce: 4,
        }
    }

    #[tokio::test]
    async fn test_events_are_addressed_to_their_account() {
        let manager = WebSocketManager::new(MetricsRegistry::new());
        let mut rx = manager.subscribe();
        let account_id = Uuid::new_v4();

        manager.notify(AccountEvent::ClientSeedChanged { account_id, seeds: seeds() });

        let addressed = rx.recv().await.unwrap();
        assert!(should_send_event(&addressed, account_id));
        assert!(!should_send_event(&addressed, Uuid::new_v4()));
    }

    #[test]
    fn test_heartbeat_goes_to_everyone() {
        let addressed = Addressed {
            account_id: None,
            event: WsEvent::Heartbeat { timestamp: 1 },
        };
        assert!(should_send_event(&addressed, Uuid::new_v4()));
    }

    #[test]
    fn test_event_wire_format() {
        let addressed = Addressed::from(AccountEvent::SeedsRotated {
            account_id: Uuid::new_v4(),
            revealed_server_seed: "seed".to_string(),
            revealed_server_seed_hash: "hash".to_string(),
            seeds: seeds(),
        });
        let json = serde_json::to_value(&addressed.event).unwrap();
        assert_eq!(json["type"], "seed_rotated");
        assert_eq!(json["revealedServerSeed"], "seed");
        assert_eq!(json["seeds"]["nonce"], 4);
        assert_eq!(json["seeds"]["clientSeed"], "client");
    }

    #[test]
    fn test_notify_without_clients_is_silent() {
        let manager = WebSocketManager::new(MetricsRegistry::new());
        manager.notify(AccountEvent::ClientSeedChanged {
            account_id: Uuid::new_v4(),
            seeds: seeds(),
        });
        assert_eq!(manager.client_count(), 0);
    }
}
