//! Request spacing shared by every outbound call of a run.
//!
//! One limiter is built per run and handed to the client, so the escalation
//! threshold counts requests from both detectors together.

use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Spacing before the escalation threshold is crossed
pub const BASE_DELAY: Duration = Duration::from_secs(1);

/// Spacing after the threshold is crossed
pub const ESCALATED_DELAY: Duration = Duration::from_secs(3);

/// Number of requests after which spacing escalates
pub const ESCALATION_THRESHOLD: u64 = 100;

#[derive(Debug)]
struct LimiterState {
    requests: u64,
    delay: Duration,
    next_slot: Option<Instant>,
}

/// Minimum-interval scheduler with one-way delay escalation.
#[derive(Debug)]
pub struct RateLimiter {
    escalated_delay: Duration,
    threshold: u64,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    /// Create a limiter with explicit delays and threshold.
    pub fn new(base_delay: Duration, escalated_delay: Duration, threshold: u64) -> Self {
        Self {
            escalated_delay: escalated_delay.max(base_delay),
            threshold,
            state: Mutex::new(LimiterState {
                requests: 0,
                delay: base_delay,
                next_slot: None,
            }),
        }
    }

    /// A limiter that never waits. Used by tests and offline runs.
    pub fn unthrottled() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO, u64::MAX)
    }

    /// Wait until the minimum spacing since the previous acquisition has passed.
    pub async fn acquire(&self) {
        let wait = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            let now = Instant::now();
            let slot = state.next_slot.map(|s| s.max(now)).unwrap_or(now);
            let wait = slot.saturating_duration_since(now);

            state.requests += 1;
            if state.requests > self.threshold && state.delay < self.escalated_delay {
                state.delay = self.escalated_delay;
                info!(
                    requests = state.requests,
                    delay_ms = state.delay.as_millis() as u64,
                    "Request threshold crossed, widening spacing"
                );
            }
            state.next_slot = Some(slot + state.delay);
            wait
        };

        if !wait.is_zero() {
            debug!(wait_ms = wait.as_millis() as u64, "Rate limiter waiting");
            tokio::time::sleep(wait).await;
        }
    }

    /// Zero the request counter. Elapsed spacing and the active delay are kept.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.requests = 0;
    }

    /// Requests acquired since construction or the last reset.
    pub fn request_count(&self) -> u64 {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).requests
    }

    /// Currently active spacing.
    pub fn current_delay(&self) -> Duration {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).delay
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(BASE_DELAY, ESCALATED_DELAY, ESCALATION_THRESHOLD)
    }
}
