//! Tagged-variant events and the bounded FIFO they travel on (C2).
//!
//! Design note 9 directs replacing the source's bitmask wait group with a
//! tagged-variant event on a bounded FIFO, to preserve ordering and allow
//! pattern-matched dispatch. `std::sync::mpsc::sync_channel` already gives
//! us exactly that: FIFO order, a bounded capacity that applies backpressure
//! instead of silently dropping, and a blocking `recv` for the supervisor's
//! sole indefinite suspension point (spec.md §5).

use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError, SendError, SyncSender};
use std::time::Duration;

/// Default queue depth. Generous enough that a burst of radio callbacks
/// (join-failure immediately followed by a stale join-success) never
/// blocks the SDK's own callback context.
pub const DEFAULT_QUEUE_DEPTH: usize = 16;

/// Events consumed by the state machine (spec.md §3). Scan completion is
/// deliberately absent: it is signalled through the separate scan-complete
/// semaphore in [`crate::scan`], not posted here (spec.md §5's C2/C3
/// split).
#[derive(Clone, Debug, PartialEq)]
pub enum WifiEvent {
    /// `wifi_connect` command: begin (or resume) joining the provisioned AP.
    StationStartJoin,
    /// Join-complete callback reporting success.
    StationConnect,
    /// Join-complete callback reporting failure, carrying the raw SDK code.
    StationJoinFailed(i32),
    /// `wifi_disconnect` command or a lower-layer disconnect indication.
    StationDisconnect,
    /// Internal: (re)arm the DHCP-poll timer.
    StationDoDhcp,
    /// Internal: DHCP/SLAAC completed; stop polling.
    StationDhcpDone,
    /// Periodic DHCP-poll timer fired.
    DhcpPoll,
    /// `start_scan` command, carrying its optional SSID filter.
    Scan(Option<String>),
    /// Reserved; no-op in this core (spec.md §4.3).
    ApStart,
    /// Reserved; no-op in this core (spec.md §4.3).
    ApStop,
}

/// Producer handle. Cloneable so radio callbacks and timers can each hold
/// their own; posting never blocks the caller beyond the queue's bound.
#[derive(Clone)]
pub struct EventPoster {
    tx: SyncSender<WifiEvent>,
}

impl EventPoster {
    pub fn post(&self, event: WifiEvent) -> Result<(), SendError<WifiEvent>> {
        self.tx.send(event)
    }
}

/// Consumer half, owned solely by the supervisor task.
pub struct EventQueue {
    rx: Receiver<WifiEvent>,
}

impl EventQueue {
    pub fn bounded(depth: usize) -> (EventPoster, Self) {
        let (tx, rx) = sync_channel(depth);
        (EventPoster { tx }, Self { rx })
    }

    /// Blocks indefinitely for the next event — the event-loop's sole
    /// unbounded suspension point (spec.md §5).
    pub fn recv(&self) -> Option<WifiEvent> {
        self.rx.recv().ok()
    }

    /// Bounded wait, used only by tests that want to assert "nothing was
    /// posted" without hanging forever.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<WifiEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}
