//! Token bucket — one permit per outbound command.
//!
//! The bucket starts full, so a fresh channel may burst `capacity` commands.
//! After that it earns one permit every `refill_interval`.
//!
//! The state is a plain value. [`TokenBucketState::advance`] takes the
//! current state and a timestamp and hands back the permit grant together
//! with the next state; the owner stores the result.

use std::time::{Duration, Instant};

use crate::config::BucketConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBucketState {
    capacity: u32,
    refill_interval: Duration,
    tokens: u32,
    last_update: Instant,
}

impl TokenBucketState {
    /// A full bucket, last updated at `now`.
    ///
    /// Zero capacity and zero interval are rejected by
    /// [`BucketConfig::validate`]; here they are clamped to 1 and 1ns.
    pub fn full(capacity: u32, refill_interval: Duration, now: Instant) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            refill_interval: refill_interval.max(Duration::from_nanos(1)),
            tokens: capacity,
            last_update: now,
        }
    }

    pub fn from_config(config: &BucketConfig, now: Instant) -> Self {
        Self::full(config.capacity, config.refill_interval(), now)
    }

    /// Refill for the time elapsed since the last update, then reserve one
    /// permit if there is one.
    ///
    /// Returns `(permits, next_state)` where `permits` is 0 or 1. Only whole
    /// intervals are credited; `last_update` moves forward by exactly the
    /// credited intervals so the remainder counts toward the next permit,
    /// including when the refill is capped at capacity.
    ///
    /// `now` must not go backwards; if it does, no time is credited.
    #[must_use]
    pub fn advance(self, now: Instant) -> (u32, Self) {
        let elapsed = now.saturating_duration_since(self.last_update);
        let intervals = elapsed.as_nanos() / self.refill_interval.as_nanos();
        let refilled = u32::try_from(intervals).unwrap_or(u32::MAX);

        let mut next = self;
        next.tokens = self.tokens.saturating_add(refilled).min(self.capacity);
        // refilled * refill_interval <= elapsed, so this stays at or before `now`.
        next.last_update = self.last_update + self.refill_interval * refilled;

        if next.tokens >= 1 {
            next.tokens -= 1;
            (1, next)
        } else {
            (0, next)
        }
    }

    /// How long from `now` until [`advance`](Self::advance) would grant a
    /// permit. Zero if one is already available.
    pub fn time_until_next_permit(&self, now: Instant) -> Duration {
        if self.tokens >= 1 {
            return Duration::ZERO;
        }
        let since_update = now.saturating_duration_since(self.last_update);
        self.refill_interval.saturating_sub(since_update)
    }

    pub fn tokens(&self) -> u32 {
        self.tokens
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn refill_interval(&self) -> Duration {
        self.refill_interval
    }

    pub fn last_update(&self) -> Instant {
        self.last_update
    }
}
