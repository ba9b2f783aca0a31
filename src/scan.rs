//! Scan request serialization (C3, spec.md §3, §4.3, §5).
//!
//! Two binary synchronization primitives: `scan-complete` (signalled by
//! the radio callback, waited on by the initiator, bounded by
//! [`crate::clock::SCAN_TIMEOUT`]) and `scan-in-progress` (mutual
//! exclusion across the whole scan lifetime). Implemented with
//! `std::sync::{Mutex, Condvar}`, the idiomatic std substitute for a
//! binary semaphore used across the esp-rs corpus (e.g.
//! `rkuris-erik/nextgen/src/wifi.rs`'s `Mutex`-guarded runtime state).
//!
//! Per spec.md §5, callbacks running in the radio SDK's own context are
//! restricted to writing the shared [`ScanJob`] result fields and posting
//! an event — never mutating device state or notification flags directly.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::radio::ApInfo;

/// What the scan-complete semaphore was signalled with: the radio
/// callback's only two possible deliveries (spec.md §4.3 `Scan` row).
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    Results(Vec<ApInfo>),
    Failed,
}

/// An optional SSID filter plus the accumulated results of one scan. The
/// filter and result vector are the only fields a radio callback may
/// write directly (spec.md §5); everything else about a scan lives in the
/// state machine.
#[derive(Debug, Clone, Default)]
pub struct ScanJob {
    pub ssid_filter: Option<String>,
}

impl ScanJob {
    pub fn new(ssid_filter: Option<String>) -> Self {
        Self { ssid_filter }
    }

    /// Scan filter semantics per spec.md §9 (open question, resolved
    /// literally as specified): a case-sensitive prefix match of length
    /// `min(user_len, result_len)`. Deliberately loose — e.g. `"LabAP"`
    /// matches `"LabAP-5G"`. Callers wanting exact match must compare
    /// lengths themselves; this function does not guess intent.
    pub fn matches(&self, candidate_ssid: &str) -> bool {
        match &self.ssid_filter {
            None => true,
            Some(filter) => {
                let len = filter.len().min(candidate_ssid.len());
                filter.as_bytes()[..len] == candidate_ssid.as_bytes()[..len]
            }
        }
    }
}

/// Mutual exclusion across the scan lifetime: acquired before any
/// `start_scan` call, released after the user callback receives its NULL
/// sentinel or after `SCAN_TIMEOUT` (testable property 5).
#[derive(Default)]
pub struct ScanInProgress {
    busy: Mutex<bool>,
}

impl ScanInProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to acquire; `false` means a scan is already outstanding
    /// and this `Scan` event must be dropped (spec.md §4.3 edge case).
    pub fn try_acquire(&self) -> bool {
        let mut busy = self.busy.lock().unwrap();
        if *busy {
            false
        } else {
            *busy = true;
            true
        }
    }

    pub fn release(&self) {
        *self.busy.lock().unwrap() = false;
    }

    pub fn is_busy(&self) -> bool {
        *self.busy.lock().unwrap()
    }
}

/// Callback → initiator handoff: signalled once the radio has delivered
/// (or failed to deliver) scan results. A binary semaphore carrying its
/// one payload, rather than a bare bool — the radio callback's only
/// allowed direct writes besides posting a [`crate::event::WifiEvent`]
/// are to this slot (spec.md §5).
#[derive(Default)]
pub struct ScanComplete {
    outcome: Mutex<Option<ScanOutcome>>,
    condvar: Condvar,
}

impl ScanComplete {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self, outcome: ScanOutcome) {
        *self.outcome.lock().unwrap() = Some(outcome);
        self.condvar.notify_all();
    }

    /// Waits up to `timeout` for a signal, taking the payload on return.
    /// `None` means the wait timed out and the scan should be abandoned
    /// (spec.md §5 cancellation: no error surfaced upward).
    pub fn wait_timeout(&self, timeout: Duration) -> Option<ScanOutcome> {
        let guard = self.outcome.lock().unwrap();
        let (mut guard, _) = self
            .condvar
            .wait_timeout_while(guard, timeout, |outcome| outcome.is_none())
            .unwrap();
        guard.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_filter_matches_everything() {
        let job = ScanJob::new(None);
        assert!(job.matches("Anything"));
        assert!(job.matches(""));
    }

    #[test]
    fn filter_matches_by_bounded_prefix() {
        let job = ScanJob::new(Some("LabAP".into()));
        assert!(job.matches("LabAP-5G"));
        assert!(job.matches("LabAP"));
        assert!(!job.matches("Guest"));
    }

    #[test]
    fn filter_longer_than_candidate_still_compares_by_min_len() {
        let job = ScanJob::new(Some("LabAP-5G-Extended".into()));
        assert!(job.matches("LabAP-5G"));
    }

    #[test]
    fn in_progress_semaphore_enforces_mutual_exclusion() {
        let sem = ScanInProgress::new();
        assert!(sem.try_acquire());
        assert!(!sem.try_acquire(), "second scan must be dropped while one is outstanding");
        sem.release();
        assert!(sem.try_acquire());
    }

    #[test]
    fn scan_complete_wait_times_out_when_never_signalled() {
        let complete = ScanComplete::new();
        let outcome = complete.wait_timeout(Duration::from_millis(10));
        assert_eq!(outcome, None);
    }

    #[test]
    fn scan_complete_wakes_waiter_on_signal() {
        use std::sync::Arc;
        use std::thread;

        let complete = Arc::new(ScanComplete::new());
        let signaller = complete.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(5));
            signaller.signal(ScanOutcome::Failed);
        });
        let outcome = complete.wait_timeout(Duration::from_secs(1));
        handle.join().unwrap();
        assert_eq!(outcome, Some(ScanOutcome::Failed));
    }
}
