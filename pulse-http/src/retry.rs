use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;

const BASE_BACKOFF: Duration = Duration::from_millis(200);
/// Minimum wait after a 429 that came without `Retry-After`.
const RATE_LIMIT_FLOOR: Duration = Duration::from_millis(1100);

/// Retry budget for one logical request.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryBudget {
    pub used: usize,
    pub max: usize,
    /// Upper bound for a server-requested `Retry-After` wait.
    pub ceiling: Duration,
}

impl RetryBudget {
    pub fn new(max: usize, ceiling: Duration) -> Self {
        Self {
            used: 0,
            max,
            ceiling,
        }
    }

    fn spend(&mut self) -> Option<usize> {
        (self.used < self.max).then(|| {
            self.used += 1;
            self.used
        })
    }

    /// Delay before the next attempt after a transport failure.
    pub fn after_transport_error(&mut self) -> Option<Duration> {
        self.spend().map(backoff)
    }

    /// Delay before the next attempt after `status`, `None` when it should not be retried.
    pub fn after_status(&mut self, status: StatusCode, headers: &HeaderMap) -> Option<Duration> {
        let throttled = status == StatusCode::TOO_MANY_REQUESTS;
        if !throttled && !status.is_server_error() {
            return None;
        }
        let nth = self.spend()?;
        Some(match retry_after(headers) {
            Some(wait) => wait.min(self.ceiling),
            None if throttled => backoff(nth).max(RATE_LIMIT_FLOOR),
            None => backoff(nth),
        })
    }
}

/// 200ms doubled per retry, capped at 2^10.
fn backoff(nth: usize) -> Duration {
    let doublings = nth.saturating_sub(1).min(10) as u32;
    BASE_BACKOFF * 2u32.pow(doublings)
}

pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let secs: u64 = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()?;
    Some(Duration::from_secs(secs))
}
