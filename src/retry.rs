//! Reconnection-timing policy (C5, spec.md §4.2).
//!
//! A pure function of `(is_reconnection, attempt_count)` plus a rolling
//! interval — no I/O, no sleeping, so it is trivially unit-testable. The
//! supervisor is the one that actually sleeps; this module only ever
//! computes "how long" and "should we give up".
//!
//! Mirrors the sleep-then-retry shape of `rkuris-erik/src/main.rs`'s
//! `connect_wifi` loop (`while let Err(e) = connect_wifi(&mut wifi) { ...;
//! FreeRtos::delay_ms(10_000) }`), generalized from one hardcoded constant
//! into the two regimes spec.md §4.2 describes.

use std::time::Duration;

pub const MIN_RETRY_MS: u64 = 1_000;
pub const MAX_RETRY_MS: u64 = 60_000;
pub const FIXED_RETRY_MS: u64 = 5_000;
pub const MAX_JOIN_RETRIES: u32 = 5;

/// Outcome of asking the policy "what do we do next".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAttempt {
    /// Retry after this delay.
    RetryAfter(Duration),
    /// First-join regime exhausted `MAX_JOIN_RETRIES`; stop retrying
    /// silently (spec.md §4.2, §9 — no upward error).
    GiveUp,
}

/// Rolling retry state: `join_retries` and `retry_interval_ms` from
/// spec.md §3, plus whether we've ever been connected this episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    join_retries: u32,
    retry_interval_ms: u64,
    is_reconnection: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            join_retries: 0,
            retry_interval_ms: MIN_RETRY_MS,
            is_reconnection: false,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join_retries(&self) -> u32 {
        self.join_retries
    }

    pub fn retry_interval_ms(&self) -> u64 {
        self.retry_interval_ms
    }

    pub fn is_reconnection(&self) -> bool {
        self.is_reconnection
    }

    /// Resets all counters to their initial values. Called on every
    /// `StationConnect` event (testable property 8).
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Marks that we have been connected at least once this episode, so
    /// the next failure enters the reconnection (telescopic) regime
    /// instead of the first-join (fixed-interval) regime.
    pub fn mark_ever_connected(&mut self) {
        self.is_reconnection = true;
    }

    /// `reset_counts` command (spec.md §6, SPEC_FULL.md §3): zeroes the
    /// retry counters without touching `is_reconnection` — unlike
    /// [`Self::reset`], which is the full per-`StationConnect` reset, this
    /// is a maintenance operation the caller invokes directly, not a state
    /// transition. Grounded on the original's `wfx_reset_count`.
    pub fn reset_counts(&mut self) {
        self.join_retries = 0;
        self.retry_interval_ms = MIN_RETRY_MS;
    }

    /// Records a failed join attempt and returns the next action.
    ///
    /// Telescopic doubling happens *after* the delay that's returned here
    /// is computed — i.e. the delay returned on this call is the
    /// pre-doubling value (design note 9: "the source doubles after
    /// sleeping, so the first sleep is `MIN_RETRY_MS`, the second
    /// `2·MIN_RETRY_MS`"). We therefore return the current interval, then
    /// double it for the *next* call.
    pub fn on_join_failure(&mut self) -> NextAttempt {
        self.join_retries += 1;

        if self.is_reconnection {
            let delay = self.retry_interval_ms;
            self.retry_interval_ms = (self.retry_interval_ms * 2).min(MAX_RETRY_MS);
            NextAttempt::RetryAfter(Duration::from_millis(delay))
        } else if self.join_retries >= MAX_JOIN_RETRIES {
            NextAttempt::GiveUp
        } else {
            NextAttempt::RetryAfter(Duration::from_millis(FIXED_RETRY_MS))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_join_regime_uses_fixed_interval_and_bounds_attempts() {
        let mut policy = RetryPolicy::new();
        for _ in 0..MAX_JOIN_RETRIES - 1 {
            assert_eq!(
                policy.on_join_failure(),
                NextAttempt::RetryAfter(Duration::from_millis(FIXED_RETRY_MS))
            );
        }
        assert_eq!(policy.on_join_failure(), NextAttempt::GiveUp);
        assert_eq!(policy.join_retries(), MAX_JOIN_RETRIES);
    }

    #[test]
    fn reconnection_regime_doubles_after_each_attempt_and_caps() {
        let mut policy = RetryPolicy::new();
        policy.mark_ever_connected();

        assert_eq!(
            policy.on_join_failure(),
            NextAttempt::RetryAfter(Duration::from_millis(MIN_RETRY_MS))
        );
        assert_eq!(
            policy.on_join_failure(),
            NextAttempt::RetryAfter(Duration::from_millis(MIN_RETRY_MS * 2))
        );
        assert_eq!(
            policy.on_join_failure(),
            NextAttempt::RetryAfter(Duration::from_millis(MIN_RETRY_MS * 4))
        );

        // Keep failing until we saturate at MAX_RETRY_MS.
        let mut last = MIN_RETRY_MS * 4;
        loop {
            match policy.on_join_failure() {
                NextAttempt::RetryAfter(d) => {
                    let ms = d.as_millis() as u64;
                    assert!(ms >= last || ms == MAX_RETRY_MS);
                    if ms == MAX_RETRY_MS && last == MAX_RETRY_MS {
                        break;
                    }
                    last = ms;
                }
                NextAttempt::GiveUp => panic!("reconnection regime must never give up"),
            }
        }
    }

    #[test]
    fn reset_restores_initial_values() {
        let mut policy = RetryPolicy::new();
        policy.mark_ever_connected();
        policy.on_join_failure();
        policy.on_join_failure();
        policy.reset();
        assert_eq!(policy.join_retries(), 0);
        assert_eq!(policy.retry_interval_ms(), MIN_RETRY_MS);
        assert!(!policy.is_reconnection());
    }

    #[test]
    fn reset_counts_zeroes_counters_but_keeps_reconnection_flag() {
        let mut policy = RetryPolicy::new();
        policy.mark_ever_connected();
        policy.on_join_failure();
        policy.on_join_failure();
        policy.reset_counts();
        assert_eq!(policy.join_retries(), 0);
        assert_eq!(policy.retry_interval_ms(), MIN_RETRY_MS);
        assert!(policy.is_reconnection(), "reset_counts is not a full reset");
    }

    #[test]
    fn no_hard_bound_on_reconnection_attempts() {
        let mut policy = RetryPolicy::new();
        policy.mark_ever_connected();
        for _ in 0..(MAX_JOIN_RETRIES * 10) {
            assert!(matches!(
                policy.on_join_failure(),
                NextAttempt::RetryAfter(_)
            ));
        }
    }
}
