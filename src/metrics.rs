//! Process-wide counters exported in Prometheus text format

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Prometheus-compatible metrics registry
#[derive(Clone, Default)]
pub struct MetricsRegistry {
    pub http_requests_total: Arc<AtomicU64>,

    pub bets_total: Arc<AtomicU64>,
    pub bets_won_total: Arc<AtomicU64>,
    pub wagered_cents_total: Arc<AtomicU64>,
    pub paid_out_cents_total: Arc<AtomicU64>,

    pub seed_rotations_total: Arc<AtomicU64>,
    pub client_seed_updates_total: Arc<AtomicU64>,
    pub seed_reveals_total: Arc<AtomicU64>,

    pub rate_limited_total: Arc<AtomicU64>,
    pub errors_total: Arc<AtomicU64>,
    pub websocket_connections_active: Arc<AtomicU64>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_bet(&self, bet_cents: u64, payout_cents: u64, win: bool) {
        self.bets_total.fetch_add(1, Ordering::Relaxed);
        self.wagered_cents_total.fetch_add(bet_cents, Ordering::Relaxed);
        self.paid_out_cents_total.fetch_add(payout_cents, Ordering::Relaxed);
        if win {
            self.bets_won_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_rotation(&self) {
        self.seed_rotations_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_client_seed_update(&self) {
        self.client_seed_updates_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reveal(&self) {
        self.seed_reveals_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_http_request(&self) {
        self.http_requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn websocket_connected(&self) {
        self.websocket_connections_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn websocket_disconnected(&self) {
        // Saturate at zero
        let _ = self.websocket_connections_active.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
            Some(n.saturating_sub(1))
        });
    }

    pub fn to_prometheus_format(&self) -> String {
        let mut output = String::new();
        let counters: [(&str, &str, &str, &Arc<AtomicU64>); 11] = [
            ("fairdice_http_requests_total", "counter", "Total number of HTTP requests", &self.http_requests_total),
            ("fairdice_bets_total", "counter", "Settled bets", &self.bets_total),
            ("fairdice_bets_won_total", "counter", "Settled bets that won", &self.bets_won_total),
            ("fairdice_wagered_cents_total", "counter", "Sum of bet amounts in cents", &self.wagered_cents_total),
            ("fairdice_paid_out_cents_total", "counter", "Sum of payouts in cents", &self.paid_out_cents_total),
            ("fairdice_seed_rotations_total", "counter", "Server seed rotations", &self.seed_rotations_total),
            ("fairdice_client_seed_updates_total", "counter", "Client seed changes", &self.client_seed_updates_total),
            ("fairdice_seed_reveals_total", "counter", "Revealed server seed lookups", &self.seed_reveals_total),
            ("fairdice_rate_limited_total", "counter", "Requests rejected by the rate limiter", &self.rate_limited_total),
            ("fairdice_errors_total", "counter", "Failed game operations", &self.errors_total),
            (
                "fairdice_websocket_connections_active",
                "gauge",
                "Open WebSocket connections",
                &self.websocket_connections_active,
            ),
        ];

        for (name, kind, help, value) in counters {
            let _ = write!(
                output,
                "# HELP {name} {help}\n# TYPE {name} {kind}\n{name} {}\n\n",
                value.load(Ordering::Relaxed)
            );
        }
        output
    }
}
