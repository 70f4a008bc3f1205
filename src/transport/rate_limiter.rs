use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window_ms: 60_000,
        }
    }
}

#[derive(Debug)]
struct WindowState {
    started: Instant,
    count: u32,
}

/// Fixed-window request counter. When the window is full, callers wait
/// out the rest of it instead of being rejected.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    max_requests: u32,
    window: Duration,
    state: Mutex<WindowState>,
}

impl FixedWindowLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            max_requests: config.max_requests.max(1),
            window: Duration::from_millis(config.window_ms),
            state: Mutex::new(WindowState {
                started: Instant::now(),
                count: 0,
            }),
        }
    }

    /// Take one slot, sleeping until the window rolls over if none is free.
    /// Returns how long the caller was held back.
    pub async fn acquire(&self) -> Duration {
        // The lock is held across the sleep so waiters queue in order.
        let mut state = self.state.lock().await;
        let mut waited = Duration::ZERO;

        if state.started.elapsed() >= self.window {
            state.started = Instant::now();
            state.count = 0;
        }

        if state.count >= self.max_requests {
            waited = self.window.saturating_sub(state.started.elapsed());
            debug!(wait_ms = waited.as_millis() as u64, "Rate limit reached, waiting for window reset");
            tokio::time::sleep(waited).await;
            state.started = Instant::now();
            state.count = 0;
        }

        state.count += 1;
        waited
    }
}
