//! Request budget for the API-Football client.
//!
//! Two ceilings apply: a rolling per-minute request count, which we wait out,
//! and the account's daily quota, which we cannot wait out inside a run. The
//! daily figure is learned from the `x-ratelimit-requests-remaining` header
//! on every response.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::warn;

use crate::error::SourceError;

const UNKNOWN: i64 = -1;

pub struct RequestBudget {
    per_minute: u32,
    window: Duration,
    state: Mutex<Window>,
    daily_remaining: AtomicI64,
}

struct Window {
    started: Instant,
    used: u32,
}

impl RequestBudget {
    pub fn new(per_minute: u32) -> Self {
        Self::with_window(per_minute, Duration::from_secs(60))
    }

    pub fn with_window(per_minute: u32, window: Duration) -> Self {
        RequestBudget {
            per_minute: per_minute.max(1),
            window,
            state: Mutex::new(Window {
                started: Instant::now(),
                used: 0,
            }),
            daily_remaining: AtomicI64::new(UNKNOWN),
        }
    }

    /// Reserve one request, sleeping until the window resets if it is full.
    pub async fn acquire(&self) -> Result<(), SourceError> {
        if self.daily_remaining.load(Ordering::Relaxed) == 0 {
            return Err(SourceError::QuotaExceeded);
        }

        let mut w = self.state.lock().await;
        if w.started.elapsed() >= self.window {
            w.started = Instant::now();
            w.used = 0;
        }
        if w.used >= self.per_minute {
            let wait = self.window.saturating_sub(w.started.elapsed());
            warn!("Request budget of {}/window reached, waiting {:?}", self.per_minute, wait);
            tokio::time::sleep(wait).await;
            w.started = Instant::now();
            w.used = 0;
        }
        w.used += 1;
        Ok(())
    }

    /// Record the remaining daily quota reported by the upstream.
    pub fn observe_daily_remaining(&self, remaining: i64) {
        self.daily_remaining.store(remaining.max(0), Ordering::Relaxed);
    }

    /// Mark the daily quota as spent.
    pub fn exhaust_daily(&self) {
        self.daily_remaining.store(0, Ordering::Relaxed);
    }

    /// `None` until a response has carried the header.
    pub fn daily_remaining(&self) -> Option<i64> {
        match self.daily_remaining.load(Ordering::Relaxed) {
            UNKNOWN => None,
            n => Some(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exhausted_daily_quota_refuses_requests() {
        let budget = RequestBudget::new(30);
        assert!(budget.acquire().await.is_ok());
        assert_eq!(budget.daily_remaining(), None);

        budget.observe_daily_remaining(5);
        assert_eq!(budget.daily_remaining(), Some(5));
        assert!(budget.acquire().await.is_ok());

        budget.exhaust_daily();
        assert!(matches!(budget.acquire().await, Err(SourceError::QuotaExceeded)));
    }

    #[tokio::test]
    async fn full_window_waits_for_reset() {
        let budget = RequestBudget::with_window(2, Duration::from_millis(50));
        let start = Instant::now();
        for _ in 0..3 {
            budget.acquire().await.unwrap();
        }
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
