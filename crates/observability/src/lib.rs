use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

#[derive(Debug, Default)]
pub struct AppMetrics {
    messages_total: AtomicU64,
    fallback_total: AtomicU64,
    deferred_scheduled_total: AtomicU64,
    deferred_fired_total: AtomicU64,
    deferred_skipped_total: AtomicU64,
    crisis_triggered_total: AtomicU64,
    coordination_events_total: AtomicU64,
    total_latency_micros: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub messages_total: u64,
    pub fallback_total: u64,
    pub deferred_scheduled_total: u64,
    pub deferred_fired_total: u64,
    pub deferred_skipped_total: u64,
    pub crisis_triggered_total: u64,
    pub coordination_events_total: u64,
    pub avg_latency_micros: f64,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_message(&self) {
        self.messages_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_fallback(&self) {
        self.fallback_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_deferred_scheduled(&self) {
        self.deferred_scheduled_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_deferred_fired(&self) {
        self.deferred_fired_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_deferred_skipped(&self) {
        self.deferred_skipped_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_crisis_triggered(&self) {
        self.crisis_triggered_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_coordination_event(&self) {
        self.coordination_events_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_latency(&self, duration: Duration) {
        self.total_latency_micros
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let messages = self.messages_total.load(Ordering::Relaxed);
        let latency = self.total_latency_micros.load(Ordering::Relaxed);

        MetricsSnapshot {
            messages_total: messages,
            fallback_total: self.fallback_total.load(Ordering::Relaxed),
            deferred_scheduled_total: self.deferred_scheduled_total.load(Ordering::Relaxed),
            deferred_fired_total: self.deferred_fired_total.load(Ordering::Relaxed),
            deferred_skipped_total: self.deferred_skipped_total.load(Ordering::Relaxed),
            crisis_triggered_total: self.crisis_triggered_total.load(Ordering::Relaxed),
            coordination_events_total: self.coordination_events_total.load(Ordering::Relaxed),
            avg_latency_micros: if messages == 0 {
                0.0
            } else {
                latency as f64 / messages as f64
            },
        }
    }
}

pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}=info,optimizer_api=info,optimizer_agents=info,optimizer_core=warn",
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
