use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Sliding-window limiter keyed by client address.
#[derive(Debug, Clone)]
pub struct ClientRateLimiter {
    inner: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
    window: Duration,
    max_requests: usize,
}

impl ClientRateLimiter {
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            window,
            max_requests: max_requests.max(1),
        }
    }

    /// Records a hit for `key`. On refusal returns how long until the oldest
    /// hit leaves the window.
    pub fn check(&self, key: &str) -> Result<(), Duration> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Result<(), Duration> {
        let mut guard = self.inner.lock();
        // Drained clients are dropped so the map only holds active keys.
        guard.retain(|_, hits| {
            while hits
                .front()
                .is_some_and(|front| now.duration_since(*front) > self.window)
            {
                hits.pop_front();
            }
            !hits.is_empty()
        });
        let hits = guard.entry(key.to_string()).or_default();

        if hits.len() >= self.max_requests {
            let oldest = hits.front().copied().unwrap_or(now);
            return Err(self.window.saturating_sub(now.duration_since(oldest)));
        }

        hits.push_back(now);
        Ok(())
    }

    #[cfg(test)]
    fn tracked_clients(&self) -> usize {
        self.inner.lock().len()
    }
}
