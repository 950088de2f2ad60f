use std::env;
use std::time::Duration;

use optimizer_core::RouterConfig;

pub const DEFAULT_EVENT_CLEANUP: Duration = Duration::from_millis(5000);
pub const DEFAULT_MAX_TRANSCRIPT: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatConfig {
    pub router: RouterConfig,
    /// How long a broadcast coordination event stays readable as the latest
    /// one. Zero keeps it until replaced.
    pub event_cleanup: Duration,
    pub max_transcript: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            router: RouterConfig::default(),
            event_cleanup: DEFAULT_EVENT_CLEANUP,
            max_transcript: DEFAULT_MAX_TRANSCRIPT,
        }
    }
}

impl ChatConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            router: RouterConfig {
                comparison_delay: env_millis("OPTIMIZER_COMPARISON_DELAY_MS")
                    .unwrap_or(defaults.router.comparison_delay),
            },
            event_cleanup: env_millis("OPTIMIZER_EVENT_CLEANUP_MS")
                .unwrap_or(defaults.event_cleanup),
            max_transcript: env::var("OPTIMIZER_MAX_TRANSCRIPT")
                .ok()
                .and_then(|value| value.parse::<usize>().ok())
                .filter(|value| *value > 0)
                .unwrap_or(defaults.max_transcript),
        }
    }

    pub fn with_comparison_delay(mut self, delay: Duration) -> Self {
        self.router.comparison_delay = delay;
        self
    }

    pub fn with_event_cleanup(mut self, delay: Duration) -> Self {
        self.event_cleanup = delay;
        self
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
}
