//! Rate limiting for inbound WebSocket frames.
//!
//! Each connection carries a [`MessageLimiter`]: a burst window
//! (10 frames per second) and a sustained window (100 frames per minute).
//! A frame is accepted only if both windows have room.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Rate limiter using a sliding window algorithm
#[derive(Debug)]
pub struct RateLimiter {
    /// Timestamps of accepted requests still inside the window
    timestamps: VecDeque<Instant>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    /// Create a new rate limiter
    ///
    /// # Example
    ///
    /// ```
    /// use lt_server::api::rate_limiter::RateLimiter;
    /// use std::time::Duration;
    ///
    /// // Allow 10 requests per second
    /// let limiter = RateLimiter::new(10, Duration::from_secs(1));
    /// ```
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: VecDeque::with_capacity(max_requests),
            max_requests,
            window,
        }
    }

    /// 10 messages per second
    pub fn burst() -> Self {
        Self::new(10, Duration::from_secs(1))
    }

    /// 100 messages per minute
    pub fn sustained() -> Self {
        Self::new(100, Duration::from_secs(60))
    }

    /// Check if a request should be allowed now.
    ///
    /// ```
    /// # use lt_server::api::rate_limiter::RateLimiter;
    /// # use std::time::Duration;
    /// let mut limiter = RateLimiter::new(5, Duration::from_secs(1));
    ///
    /// for _ in 0..5 {
    ///     assert!(limiter.check());
    /// }
    /// assert!(!limiter.check());
    /// ```
    pub fn check(&mut self) -> bool {
        self.check_at(Instant::now())
    }

    /// Same as [`check`](Self::check) at an explicit instant.
    pub fn check_at(&mut self, now: Instant) -> bool {
        if !self.has_room_at(now) {
            return false;
        }
        self.timestamps.push_back(now);
        true
    }

    /// Drop expired timestamps and report whether one more request fits.
    fn has_room_at(&mut self, now: Instant) -> bool {
        while let Some(ts) = self.timestamps.front() {
            if now.saturating_duration_since(*ts) >= self.window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
        self.timestamps.len() < self.max_requests
    }

    /// Number of requests in the current window
    pub fn current_count(&self) -> usize {
        self.timestamps.len()
    }

    /// Requests still allowed in the current window
    pub fn remaining(&self) -> usize {
        self.max_requests.saturating_sub(self.timestamps.len())
    }

    /// Time until the oldest request leaves the window, measured from `now`.
    pub fn reset_in_at(&self, now: Instant) -> Option<Duration> {
        self.timestamps
            .front()
            .map(|oldest| self.window.saturating_sub(now.saturating_duration_since(*oldest)))
    }

    pub fn reset(&mut self) {
        self.timestamps.clear();
    }
}

/// Which window refused a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitExceeded {
    Burst,
    Sustained,
}

impl LimitExceeded {
    /// Metrics label
    pub fn label(self) -> &'static str {
        match self {
            LimitExceeded::Burst => "burst",
            LimitExceeded::Sustained => "sustained",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            LimitExceeded::Burst => "Too many messages, slow down",
            LimitExceeded::Sustained => "Message limit reached, try again in a minute",
        }
    }
}

/// Burst and sustained limits for one connection
#[derive(Debug)]
pub struct MessageLimiter {
    burst: RateLimiter,
    sustained: RateLimiter,
}

impl Default for MessageLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageLimiter {
    pub fn new() -> Self {
        Self::with_limits(RateLimiter::burst(), RateLimiter::sustained())
    }

    pub fn with_limits(burst: RateLimiter, sustained: RateLimiter) -> Self {
        Self { burst, sustained }
    }

    pub fn check(&mut self) -> Result<(), LimitExceeded> {
        self.check_at(Instant::now())
    }

    /// A refused frame is not counted against either window.
    pub fn check_at(&mut self, now: Instant) -> Result<(), LimitExceeded> {
        if !self.burst.has_room_at(now) {
            return Err(LimitExceeded::Burst);
        }
        if !self.sustained.has_room_at(now) {
            return Err(LimitExceeded::Sustained);
        }
        self.burst.timestamps.push_back(now);
        self.sustained.timestamps.push_back(now);
        Ok(())
    }
}
