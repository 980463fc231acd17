use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use pickup_core::{DecisionReason, PickupDecision};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

#[derive(Debug, Default)]
pub struct AppMetrics {
    requests_total: AtomicU64,
    evaluations_total: AtomicU64,
    inert_total: AtomicU64,
    allowed_total: AtomicU64,
    pickup_hidden_total: AtomicU64,
    rates_removed_total: AtomicU64,
    total_latency_micros: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub evaluations_total: u64,
    pub inert_total: u64,
    pub allowed_total: u64,
    pub pickup_hidden_total: u64,
    pub rates_removed_total: u64,
    pub avg_latency_micros: f64,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("pickup_requests_total").increment(1);
    }

    pub fn record_decision(&self, decision: &PickupDecision) {
        self.evaluations_total.fetch_add(1, Ordering::Relaxed);

        let outcome = match decision.reason {
            DecisionReason::OutsideCountry => {
                self.inert_total.fetch_add(1, Ordering::Relaxed);
                "inert"
            }
            DecisionReason::NoMatch => {
                self.pickup_hidden_total.fetch_add(1, Ordering::Relaxed);
                "hidden"
            }
            _ => {
                self.allowed_total.fetch_add(1, Ordering::Relaxed);
                "allowed"
            }
        };
        metrics::counter!("pickup_decisions_total", "outcome" => outcome).increment(1);
    }

    pub fn add_rates_removed(&self, removed: usize) {
        self.rates_removed_total
            .fetch_add(removed as u64, Ordering::Relaxed);
        metrics::counter!("pickup_rates_removed_total").increment(removed as u64);
    }

    pub fn observe_latency(&self, duration: Duration) {
        self.total_latency_micros
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let requests = self.requests_total.load(Ordering::Relaxed);
        let latency = self.total_latency_micros.load(Ordering::Relaxed);

        MetricsSnapshot {
            requests_total: requests,
            evaluations_total: self.evaluations_total.load(Ordering::Relaxed),
            inert_total: self.inert_total.load(Ordering::Relaxed),
            allowed_total: self.allowed_total.load(Ordering::Relaxed),
            pickup_hidden_total: self.pickup_hidden_total.load(Ordering::Relaxed),
            rates_removed_total: self.rates_removed_total.load(Ordering::Relaxed),
            avg_latency_micros: if requests == 0 {
                0.0
            } else {
                latency as f64 / requests as f64
            },
        }
    }
}

pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}=info,pickup_api=info,pickup_core=info",
                service_name
            ))
        });

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(true)
            .init();
    });
}
