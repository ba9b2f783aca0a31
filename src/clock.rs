//! Monotonic tick source and the DHCP-poll cadence timer (C1, spec.md §2).
//!
//! The core only ever needs one periodic timer, so this is deliberately
//! narrow rather than a general-purpose scheduler: a deadline tracked with
//! `std::time::Instant`, armed/disarmed by the state machine and checked by
//! the supervisor's own event-loop wait, the same "poll from within the
//! loop you already block in" shape `rkuris-erik/src/main.rs` uses for its
//! `FreeRtos::delay_ms` retry sleep.

use std::time::{Duration, Instant};

/// Cadence at which `DhcpPoll` is posted while waiting for an address
/// (spec.md §4.3).
pub const DHCP_POLL_MS: u64 = 250;

/// Upper bound on how long a scan may remain outstanding before it is
/// abandoned (spec.md §4.3, §5).
pub const SCAN_TIMEOUT: Duration = Duration::from_secs(10);

/// A single cancellable periodic deadline.
#[derive(Debug, Clone, Copy, Default)]
pub struct PollTimer {
    deadline: Option<Instant>,
    period: Duration,
}

impl PollTimer {
    pub fn new() -> Self {
        Self {
            deadline: None,
            period: Duration::from_millis(DHCP_POLL_MS),
        }
    }

    /// Starts (or restarts) the timer at its configured cadence.
    pub fn arm(&mut self) {
        self.deadline = Some(Instant::now() + self.period);
    }

    /// Stops the timer. A disarmed timer never reports ready.
    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Time remaining until the next fire, used by the supervisor to
    /// bound its event-queue wait. `None` means "no pending deadline".
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// If the deadline has passed, re-arms for the next cadence and
    /// reports `true`. Call this once the supervisor's bounded wait times
    /// out.
    pub fn poll(&mut self) -> bool {
        match self.deadline {
            Some(d) if Instant::now() >= d => {
                self.arm();
                true
            }
            _ => false,
        }
    }
}
