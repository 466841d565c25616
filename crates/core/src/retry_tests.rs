// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;

#[test]
fn exponential_growth_without_jitter() {
    let policy = RetryPolicy { base_delay_ms: 100, max_delay_ms: 10_000, jitter: 0.0 };
    assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
    assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
    assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
    assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(800));
}

#[test]
fn delay_caps_at_max() {
    let policy = RetryPolicy { base_delay_ms: 100, max_delay_ms: 1_000, jitter: 0.0 };
    assert_eq!(policy.delay_for_attempt(10), Duration::from_millis(1_000));
    // Shift past 32 must not wrap
    assert_eq!(policy.delay_for_attempt(60), Duration::from_millis(1_000));
}

#[test]
fn jitter_stays_within_bounds() {
    let policy = RetryPolicy { base_delay_ms: 1_000, max_delay_ms: 1_000, jitter: 0.5 };
    for _ in 0..100 {
        let d = policy.delay_for_attempt(0).as_millis() as u64;
        assert!((500..=1_500).contains(&d), "delay {d} outside jitter bounds");
    }
}

#[test]
fn jitter_produces_varying_delays() {
    let policy = RetryPolicy { base_delay_ms: 10_000, max_delay_ms: 10_000, jitter: 0.3 };
    let first = policy.delay_for_attempt(2);
    let varied = (0..50).any(|_| policy.delay_for_attempt(2) != first);
    assert!(varied, "50 draws with jitter never differed");
}

#[test]
fn run_after_is_in_the_future() {
    let policy = RetryPolicy::fixed(5_000);
    assert_eq!(policy.run_after(1_000_000, 3), 1_005_000);
}

proptest! {
    // Backoff growth: non-decreasing in attempts up to the cap.
    #[test]
    fn delay_is_non_decreasing(base in 1u64..10_000, attempts in 0u32..20) {
        let policy = RetryPolicy { base_delay_ms: base, max_delay_ms: 60_000_000, jitter: 0.0 };
        prop_assert!(policy.delay_for_attempt(attempts + 1) >= policy.delay_for_attempt(attempts));
    }

    #[test]
    fn jittered_delay_never_exceeds_double_cap(attempts in 0u32..64) {
        let policy = RetryPolicy { base_delay_ms: 500, max_delay_ms: 30_000, jitter: 1.0 };
        let d = policy.delay_for_attempt(attempts).as_millis() as u64;
        prop_assert!(d <= 60_000);
    }
}
