// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry backoff policy: exponential growth with a cap and bounded random
//! jitter so retries from many workers don't land on the same tick.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff configuration for failed job attempts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub base_delay_ms: u64,
    /// Ceiling on the computed delay, before jitter.
    pub max_delay_ms: u64,
    /// Jitter factor in `[0.0, 1.0]`: the final delay is drawn uniformly
    /// from `delay ± delay * jitter`.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 30_000,
            max_delay_ms: 3_600_000,
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    pub fn fixed(delay_ms: u64) -> Self {
        Self { base_delay_ms: delay_ms, max_delay_ms: delay_ms, jitter: 0.0 }
    }

    /// Delay before retry number `attempts` (the count of completed
    /// attempts): `min(base * 2^attempts, cap)` plus bounded jitter.
    ///
    /// Non-decreasing in `attempts` up to the cap; two calls with the same
    /// `attempts` may differ by the jitter.
    pub fn delay_for_attempt(&self, attempts: u32) -> Duration {
        let exp = attempts.min(32);
        let delay_ms = self
            .base_delay_ms
            .saturating_mul(1u64 << exp)
            .min(self.max_delay_ms) as f64;

        let jittered = if self.jitter > 0.0 {
            use rand::Rng;
            let spread = delay_ms * self.jitter.clamp(0.0, 1.0);
            let offset = rand::thread_rng().gen_range(-spread..=spread);
            (delay_ms + offset).max(0.0)
        } else {
            delay_ms
        };

        Duration::from_millis(jittered as u64)
    }

    /// Epoch-ms timestamp before which the job must not be re-leased.
    pub fn run_after(&self, now_ms: u64, attempts: u32) -> u64 {
        now_ms + self.delay_for_attempt(attempts).as_millis() as u64
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
