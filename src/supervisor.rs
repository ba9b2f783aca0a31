//! Supervisor task (C8, spec.md §4.5): owns the state machine, the event
//! queue, and the connectivity-manager command API surface (spec.md §6).
//!
//! Startup order mirrors spec.md §4.5 — `radio_adapter.init` → create the
//! event queue and scan semaphores (done by [`StateMachine::new`]) → mark
//! `DevReady` → enter the event loop. Grounded on `rkuris-erik/src/main.rs`'s
//! own init-then-loop shape (the `connect_wifi` retry loop followed by an
//! infinite `loop { ... FreeRtos::delay_ms(...) }`), generalized into a
//! single bounded `recv_timeout` wait so the DHCP-poll timer and the
//! blocking dequeue share the one suspension point spec.md §5 allows.

use std::sync::mpsc::RecvTimeoutError;

use crate::error::SupervisorError;
use crate::event::{EventPoster, EventQueue, WifiEvent, DEFAULT_QUEUE_DEPTH};
use crate::netstack::NetStack;
use crate::notify::Upcall;
use crate::provision::{Security, WifiProvision};
use crate::radio::{ApInfo, RadioAdapter, RadioError, SecurityPolicy};
use crate::state::StateSet;
use crate::statemachine::StateMachine;

/// Basic AP info (spec.md §6 `get_ap_info`): BSSID, RSSI, security. RSSI
/// is read live from the radio; BSSID/security come from the pre-join
/// scan that targeted the current association.
#[derive(Debug, Clone, PartialEq)]
pub struct ApBasicInfo {
    pub bssid: [u8; 6],
    pub rssi_dbm: i16,
    pub security: Security,
}

/// Owns C5, C6, C7, the event queue, and the radio adapter/netstack the
/// state machine is generic over. `on_upcall` is the supervisor's sole
/// channel to the outside world — every upward event spec.md §6 lists
/// passes through it exactly once.
pub struct Supervisor<R: RadioAdapter, N: NetStack> {
    machine: StateMachine<R, N>,
    queue: EventQueue,
    poster: EventPoster,
    on_upcall: Box<dyn FnMut(Upcall) + Send>,
}

impl<R: RadioAdapter, N: NetStack> Supervisor<R, N> {
    /// Brings up the radio adapter (spec.md §4.5's first startup step)
    /// and wires a fresh event queue. Does not mark `DevReady` or emit
    /// `wifi-started` — call [`Self::wifi_start`] for that once the rest
    /// of boot (BLE init, etc.) has had a chance to run.
    pub fn new(
        radio: R,
        netstack: N,
        security_policy: SecurityPolicy,
        on_upcall: impl FnMut(Upcall) + Send + 'static,
    ) -> Result<Self, RadioError> {
        let (poster, queue) = EventQueue::bounded(DEFAULT_QUEUE_DEPTH);
        Self::with_queue(radio, netstack, poster, queue, security_policy, on_upcall)
    }

    /// As [`Self::new`], but against an event queue built by the caller.
    /// Needed when the radio adapter itself must be constructed against
    /// that same queue's producer handle before it exists — e.g.
    /// [`crate::radio::espidf::EspIdfRadio`] registers its join-complete
    /// callback against `poster` during its own construction, so the
    /// queue has to come first.
    pub fn with_queue(
        mut radio: R,
        netstack: N,
        poster: EventPoster,
        queue: EventQueue,
        security_policy: SecurityPolicy,
        on_upcall: impl FnMut(Upcall) + Send + 'static,
    ) -> Result<Self, RadioError> {
        radio.init()?;
        let machine = StateMachine::new(radio, netstack, poster.clone(), security_policy);
        Ok(Self {
            machine,
            queue,
            poster,
            on_upcall: Box::new(on_upcall),
        })
    }

    /// A producer handle callers can hand to e.g. the DHCP-poll timer or
    /// an SDK callback that needs to post without borrowing `self`.
    pub fn poster(&self) -> EventPoster {
        self.poster.clone()
    }

    /// `wifi_start` (spec.md §4.5, §6): marks `DevReady` and emits
    /// `wifi-started` exactly once. The caller is expected to invoke this
    /// once at boot, after `Self::new` and after releasing any
    /// coexistence signal the BLE stack waits on (spec.md §5).
    pub fn wifi_start(&mut self) {
        self.machine.mark_dev_ready();
        (self.on_upcall)(Upcall::WifiStarted);
    }

    pub fn set_provision(&mut self, provision: WifiProvision) {
        self.machine.set_provision(provision);
    }

    pub fn get_provision(&self) -> Option<&WifiProvision> {
        self.machine.provision()
    }

    pub fn clear_provision(&mut self) {
        self.machine.clear_provision();
    }

    /// `wifi_connect` command (spec.md §6, §7). Rejects synchronously on
    /// the two error kinds spec.md §7 names for this call; once accepted,
    /// outcomes surface asynchronously through upcalls.
    pub fn wifi_connect(&mut self) -> Result<(), SupervisorError> {
        if self.machine.provision().is_none() {
            return Err(SupervisorError::NotProvisioned);
        }
        if self
            .machine
            .state()
            .intersects(StateSet::STA_CONNECTING | StateSet::STA_CONNECTED)
        {
            return Err(SupervisorError::AlreadyInProgress);
        }
        let _ = self.poster.post(WifiEvent::StationStartJoin);
        Ok(())
    }

    /// `wifi_disconnect` command (spec.md §6). Ends the reconnection
    /// drive (spec.md §4.2) rather than merely tearing down the link.
    pub fn wifi_disconnect(&mut self) {
        let _ = self.poster.post(WifiEvent::StationDisconnect);
    }

    /// `start_scan` command (spec.md §6). `None` matches every AP.
    pub fn start_scan(&mut self, ssid_filter: Option<&str>) -> Result<(), SupervisorError> {
        if self.machine.state().contains(StateSet::SCAN_STARTED) {
            return Err(SupervisorError::AlreadyInProgress);
        }
        let _ = self
            .poster
            .post(WifiEvent::Scan(ssid_filter.map(str::to_owned)));
        Ok(())
    }

    pub fn is_sta_connected(&self) -> bool {
        self.machine.is_sta_connected()
    }

    /// `get_ap_info` (spec.md §6): the narrow BSSID/RSSI/security view.
    /// `None` before any join has resolved an AP.
    pub fn get_ap_info(&self) -> Option<ApBasicInfo> {
        let ap = self.machine.current_ap()?;
        let rssi_dbm = self.machine.radio().get_rssi().unwrap_or(ap.rssi_dbm);
        Some(ApBasicInfo {
            bssid: ap.bssid,
            rssi_dbm,
            security: ap.security,
        })
    }

    /// `get_ap_ext` (spec.md §6, SPEC_FULL.md §3 supplement): the full
    /// `ApInfo` the current join targeted, channel included.
    pub fn get_ap_ext(&self) -> Option<ApInfo> {
        self.machine.current_ap().cloned()
    }

    /// `reset_counts` (spec.md §6, SPEC_FULL.md §3 supplement): zeroes
    /// the retry counters without touching device state.
    pub fn reset_counts(&mut self) {
        self.machine.reset_retry_counts();
    }

    /// Advances the event loop by exactly one step: waits (bounded by the
    /// DHCP-poll timer's remaining time, if armed) and dispatches at most
    /// one event. Returns `false` once the queue is closed — every
    /// `EventPoster` including this supervisor's own has been dropped —
    /// at which point the caller should stop calling `step`.
    pub fn step(&mut self) -> bool {
        let event = match self.machine.dhcp_timer_remaining() {
            Some(remaining) => match self.queue.recv_timeout(remaining) {
                Ok(event) => Some(event),
                Err(RecvTimeoutError::Timeout) => self
                    .machine
                    .dhcp_timer_due()
                    .then_some(WifiEvent::DhcpPoll),
                Err(RecvTimeoutError::Disconnected) => return false,
            },
            None => match self.queue.recv() {
                Some(event) => Some(event),
                None => return false,
            },
        };
        if let Some(event) = event {
            self.dispatch(event);
        }
        true
    }

    fn dispatch(&mut self, event: WifiEvent) {
        for upcall in self.machine.dispatch(event) {
            (self.on_upcall)(upcall);
        }
    }

    /// Runs the event loop until the queue closes (spec.md §4.5's
    /// `dequeue → dispatch`, the supervisor's only indefinite suspension
    /// point).
    pub fn run(&mut self) {
        while self.step() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netstack::mock::MockNetStack;
    use crate::radio::mock::MockRadio;
    use std::sync::{Arc, Mutex};

    fn collector() -> (Arc<Mutex<Vec<Upcall>>>, impl FnMut(Upcall) + Send + 'static) {
        let upcalls = Arc::new(Mutex::new(Vec::new()));
        let sink = upcalls.clone();
        (upcalls, move |u: Upcall| sink.lock().unwrap().push(u))
    }

    fn supervisor() -> (Supervisor<MockRadio, MockNetStack>, Arc<Mutex<Vec<Upcall>>>, MockNetStack)
    {
        let (upcalls, sink) = collector();
        let radio = MockRadio::new([0x02, 0, 0, 0, 0, 7]);
        let netstack = MockNetStack::new();
        let sup = Supervisor::new(radio, netstack.clone(), SecurityPolicy::default(), sink)
            .expect("radio init must not fail");
        (sup, upcalls, netstack)
    }

    #[test]
    fn wifi_start_emits_once() {
        let (mut sup, upcalls, _netstack) = supervisor();
        sup.wifi_start();
        assert_eq!(upcalls.lock().unwrap().as_slice(), &[Upcall::WifiStarted]);
    }

    #[test]
    fn connect_without_provision_is_rejected() {
        let (mut sup, _upcalls, _netstack) = supervisor();
        sup.wifi_start();
        assert_eq!(sup.wifi_connect(), Err(SupervisorError::NotProvisioned));
    }

    #[test]
    fn connect_while_already_connecting_is_rejected() {
        let (mut sup, _upcalls, _netstack) = supervisor();
        sup.wifi_start();
        sup.set_provision(WifiProvision::new("LabAP", b"secret12", Security::Wpa2).unwrap());
        sup.wifi_connect().unwrap();
        sup.step(); // dispatches StationStartJoin, sets StaConnecting
        assert_eq!(sup.wifi_connect(), Err(SupervisorError::AlreadyInProgress));
    }

    #[test]
    fn full_join_and_dhcp_cycle_drives_upward_events() {
        let (mut sup, upcalls, netstack) = supervisor();
        sup.wifi_start();
        sup.set_provision(WifiProvision::new("LabAP", b"secret12", Security::Wpa2).unwrap());
        sup.wifi_connect().unwrap();
        sup.step(); // StationStartJoin -> radio.connect, StaConnecting

        sup.poster().post(WifiEvent::StationConnect).unwrap();
        sup.step(); // StationConnect -> StaConnected, posts StationDoDhcp
        sup.step(); // StationDoDhcp -> arms the poll timer

        netstack.set_dhcp4(crate::netstack::Dhcpv4State::AddressAssigned([10, 0, 0, 5]));
        sup.poster().post(WifiEvent::DhcpPoll).unwrap();
        sup.step(); // DhcpPoll -> Ipv4Acquired + WifiConnected, posts StationDhcpDone
        sup.step(); // StationDhcpDone -> StaDhcpDone

        let upcalls = upcalls.lock().unwrap();
        assert!(upcalls.contains(&Upcall::WifiStarted));
        assert!(upcalls
            .iter()
            .any(|u| matches!(u, Upcall::Ipv4Acquired { addr } if *addr == [10, 0, 0, 5])));
        assert!(upcalls
            .iter()
            .any(|u| matches!(u, Upcall::WifiConnected { .. })));
        assert!(sup.is_sta_connected());

        let ap_info = sup.get_ap_info();
        assert!(
            ap_info.is_none(),
            "the pre-join scan's scripted empty result set never matched LabAP"
        );
    }

    #[test]
    fn scan_command_queues_and_dispatches_a_scan_done_sentinel() {
        let (mut sup, upcalls, _netstack) = supervisor();
        sup.wifi_start();
        sup.start_scan(None).unwrap();
        sup.step();
        assert!(upcalls.lock().unwrap().contains(&Upcall::ScanDone));
    }

    #[test]
    fn reset_counts_does_not_touch_connection_state() {
        let (mut sup, _upcalls, _netstack) = supervisor();
        sup.wifi_start();
        sup.set_provision(WifiProvision::new("LabAP", b"secret12", Security::Wpa2).unwrap());
        sup.wifi_connect().unwrap();
        sup.step();
        sup.reset_counts();
        assert!(!sup.is_sta_connected());
    }
}
