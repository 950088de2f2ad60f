//! Cross-dashboard coordination events.
//!
//! One page broadcasts an event (for example a production incident) and every
//! other page reacts. The last event stays readable for a short cleanup
//! window so late pollers still see it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::info;

pub const CRISIS_EVENT_TYPE: &str = "crisis_triggered";

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinationEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub demo_trigger: bool,
}

impl CoordinationEvent {
    pub fn new(event_type: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            data: Value::Null,
            timestamp: None,
            source: Some(source.into()),
            demo_trigger: false,
        }
    }

    pub fn is_crisis(&self) -> bool {
        self.event_type == CRISIS_EVENT_TYPE
    }
}

#[derive(Clone)]
pub struct CoordinationHub {
    sender: broadcast::Sender<CoordinationEvent>,
    latest: Arc<Mutex<Option<(u64, CoordinationEvent)>>>,
    sequence: Arc<AtomicU64>,
    cleanup_delay: Duration,
}

impl CoordinationHub {
    pub fn new(cleanup_delay: Duration) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            latest: Arc::new(Mutex::new(None)),
            sequence: Arc::new(AtomicU64::new(0)),
            cleanup_delay,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoordinationEvent> {
        self.sender.subscribe()
    }

    pub fn latest(&self) -> Option<CoordinationEvent> {
        self.latest.lock().as_ref().map(|(_, event)| event.clone())
    }

    /// Stamps and publishes `event`. Must be called inside a tokio runtime
    /// when the cleanup delay is non-zero.
    pub fn broadcast(&self, mut event: CoordinationEvent) -> CoordinationEvent {
        event.demo_trigger = true;
        event.timestamp.get_or_insert_with(Utc::now);

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        *self.latest.lock() = Some((sequence, event.clone()));

        let receivers = self.sender.send(event.clone()).unwrap_or(0);
        info!(
            event_type = %event.event_type,
            source = event.source.as_deref().unwrap_or("unknown"),
            receivers,
            "coordination event broadcast"
        );

        if !self.cleanup_delay.is_zero() {
            let latest = Arc::clone(&self.latest);
            let delay = self.cleanup_delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let mut slot = latest.lock();
                if matches!(slot.as_ref(), Some((current, _)) if *current == sequence) {
                    *slot = None;
                }
            });
        }

        event
    }
}
