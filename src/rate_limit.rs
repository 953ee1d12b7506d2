use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::FulltextError;

/// Caps outbound calls at `calls` within any `period`.
///
/// The gate remembers when each of the last `calls` calls went out. Up to
/// `calls` requests go out immediately; the next one waits until the oldest
/// remembered call is at least `period` old. [`RateLimiter::acquire`] blocks
/// and never rejects a call.
///
/// Clones share the same window.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    window: Arc<Mutex<CallWindow>>,
}

#[derive(Debug)]
struct CallWindow {
    sent: VecDeque<Instant>,
    capacity: usize,
    period: Duration,
}

impl CallWindow {
    fn expire(&mut self, now: Instant) {
        while let Some(&oldest) = self.sent.front() {
            if now.duration_since(oldest) >= self.period {
                self.sent.pop_front();
            } else {
                break;
            }
        }
    }
}

impl RateLimiter {
    pub fn new(calls: u32, period: Duration) -> Result<Self, FulltextError> {
        if calls == 0 {
            return Err(FulltextError::InvalidRateLimit(
                "call quota must be at least 1".to_string(),
            ));
        }
        if period.is_zero() {
            return Err(FulltextError::InvalidRateLimit(
                "window must be longer than zero".to_string(),
            ));
        }

        Ok(Self::with_quota(calls, period))
    }

    /// 10 000 calls per 15 minutes.
    pub fn pubtator_default() -> Self {
        Self::with_quota(10_000, Duration::from_secs(15 * 60))
    }

    fn with_quota(calls: u32, period: Duration) -> Self {
        let capacity = calls as usize;
        Self {
            window: Arc::new(Mutex::new(CallWindow {
                sent: VecDeque::with_capacity(capacity.min(1024)),
                capacity,
                period,
            })),
        }
    }

    /// Records one call, sleeping until the window has room for it. Returns
    /// how long the caller was held back.
    pub fn acquire(&self) -> Duration {
        let mut waited = Duration::ZERO;
        loop {
            let wait = {
                let mut window = self.window.lock().unwrap_or_else(PoisonError::into_inner);
                let now = Instant::now();
                window.expire(now);
                if window.sent.len() < window.capacity {
                    window.sent.push_back(now);
                    debug!(
                        remaining = window.capacity - window.sent.len(),
                        "rate limit slot acquired"
                    );
                    return waited;
                }
                match window.sent.front() {
                    Some(&oldest) => (oldest + window.period).saturating_duration_since(now),
                    None => Duration::ZERO,
                }
            };

            debug!(wait_ms = wait.as_millis() as u64, "rate limit reached; waiting");
            thread::sleep(wait);
            waited += wait;
        }
    }

    /// Calls that may go out right now without waiting.
    pub fn available(&self) -> usize {
        let mut window = self.window.lock().unwrap_or_else(PoisonError::into_inner);
        window.expire(Instant::now());
        window.capacity - window.sent.len()
    }

    pub fn capacity(&self) -> usize {
        self.window
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .capacity
    }
}
