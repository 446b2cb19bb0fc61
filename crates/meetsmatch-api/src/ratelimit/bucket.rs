//! Integer token bucket with interval-based refill.

use std::time::{Duration, Instant};

/// A single key's bucket.
///
/// Refill adds `floor(elapsed / interval)` whole tokens, capped at capacity,
/// and advances `last_refill` by exactly that many intervals so partial
/// progress toward the next token is kept.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: u32,
    tokens: u32,
    refill_interval: Duration,
    last_refill: Instant,
}

impl TokenBucket {
    /// A full bucket.
    pub const fn new(capacity: u32, refill_interval: Duration, now: Instant) -> Self {
        Self {
            capacity,
            tokens: capacity,
            refill_interval,
            last_refill: now,
        }
    }

    pub const fn tokens(&self) -> u32 {
        self.tokens
    }

    fn refill(&mut self, now: Instant) {
        let interval = self.refill_interval.as_nanos();
        if interval == 0 {
            self.tokens = self.capacity;
            self.last_refill = now;
            return;
        }
        let elapsed = now.saturating_duration_since(self.last_refill).as_nanos();
        let n = u32::try_from(elapsed / interval).unwrap_or(u32::MAX);
        if n == 0 {
            return;
        }
        self.tokens = self.tokens.saturating_add(n).min(self.capacity);
        // n intervals never exceed the elapsed time, so this cannot overflow.
        self.last_refill += self.refill_interval * n;
    }

    /// Refill, then take one token if available.
    pub fn try_take(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= 1 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }
}
