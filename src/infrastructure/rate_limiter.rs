use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Enforces a minimum interval between consecutive calls to one provider.
///
/// Holds the earliest instant the next call may start. `acquire` reserves
/// the next slot and sleeps until it arrives, so callers stay strictly
/// sequential without a token bucket.
#[derive(Debug)]
pub struct IntervalRateLimiter {
    name: String,
    interval: Duration,
    next_allowed: Mutex<Option<Instant>>,
}

impl IntervalRateLimiter {
    pub fn new(name: impl Into<String>, interval: Duration) -> Self {
        Self {
            name: name.into(),
            interval,
            next_allowed: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn lock(&self) -> MutexGuard<'_, Option<Instant>> {
        self.next_allowed.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Time a call made right now would have to wait.
    pub fn time_until_ready(&self) -> Duration {
        match *self.lock() {
            Some(next) => next.saturating_duration_since(Instant::now()),
            None => Duration::ZERO,
        }
    }

    pub async fn acquire(&self) {
        let wait = {
            let mut next_allowed = self.lock();
            let now = Instant::now();
            let start = match *next_allowed {
                Some(next) if next > now => next,
                _ => now,
            };
            *next_allowed = Some(start + self.interval);
            start - now
        };

        if !wait.is_zero() {
            debug!(provider = %self.name, wait_ms = wait.as_millis() as u64, "Rate limit pause");
            tokio::time::sleep(wait).await;
        }
    }
}
