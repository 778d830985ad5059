use std::collections::VecDeque;
use std::time::{Duration, Instant};

use super::{DataError, DataResult};

/// Windowed call counter: at most `max_calls` within the trailing `period`.
/// Callers hold one per provider behind an `Arc<Mutex<..>>` and check it
/// before every outbound request.
pub struct RateLimiter {
    max_calls: usize,
    period: Duration,
    calls: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new(max_calls: usize, period: Duration) -> Self {
        Self {
            max_calls,
            period,
            calls: VecDeque::with_capacity(max_calls),
        }
    }

    pub fn per_minute(max_calls: usize) -> Self {
        Self::new(max_calls, Duration::from_secs(60))
    }

    pub fn per_day(max_calls: usize) -> Self {
        Self::new(max_calls, Duration::from_secs(86_400))
    }

    /// Record a call if the window has room, otherwise return a rate-limit
    /// error carrying the seconds until the oldest call ages out.
    pub fn acquire(&mut self) -> DataResult<()> {
        self.acquire_at(Instant::now())
    }

    fn acquire_at(&mut self, now: Instant) -> DataResult<()> {
        while let Some(&oldest) = self.calls.front() {
            if now.duration_since(oldest) >= self.period {
                self.calls.pop_front();
            } else {
                break;
            }
        }

        if self.calls.len() >= self.max_calls {
            // self.calls is non-empty here since max_calls >= 1
            let oldest = *self.calls.front().ok_or_else(|| {
                DataError::Internal("rate limiter window empty at capacity".to_string())
            })?;
            let elapsed = now.duration_since(oldest);
            let retry_after = self.period.saturating_sub(elapsed).as_secs().max(1);
            return Err(DataError::RateLimit { retry_after });
        }

        self.calls.push_back(now);
        Ok(())
    }

    /// Calls still available in the current window
    pub fn remaining(&self) -> usize {
        let now = Instant::now();
        let in_window = self
            .calls
            .iter()
            .filter(|&&c| now.duration_since(c) < self.period)
            .count();
        self.max_calls.saturating_sub(in_window)
    }
}

/// Provider quotas, matching the published free-tier limits
pub fn alpha_vantage() -> RateLimiter {
    RateLimiter::per_day(25)
}

pub fn sec_edgar() -> RateLimiter {
    RateLimiter::per_minute(10)
}

pub fn news_api() -> RateLimiter {
    RateLimiter::per_day(100)
}

pub fn fred() -> RateLimiter {
    RateLimiter::per_minute(120)
}
