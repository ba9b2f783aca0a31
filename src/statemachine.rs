//! Event-dispatch transition table (C6, spec.md §4.3) — the heart of the
//! core. Consumes one [`WifiEvent`] at a time, drives [`StateSet`],
//! [`RetryPolicy`] and [`NotificationGate`], and calls into the radio
//! adapter (C4) and TCP/IP stack facade. Returns the upward
//! notifications produced by that single event so the caller (the
//! supervisor's event loop) can forward them without this module knowing
//! how notifications are actually delivered.
//!
//! Two of the table's rows share one underlying radio indication that
//! this core cannot itself disambiguate from inside a callback (spec.md
//! §5 forbids callbacks from reading device state): "join-complete CB,
//! failure" (guard `StaConnecting`) and "StationDisconnect (from lower
//! layer)" both start from the same SDK-level "no longer associated"
//! signal. Here [`WifiEvent::StationJoinFailed`] carries that signal
//! unconditionally from the radio adapter, and this module is the one
//! that decides, from its own `StateSet`, whether the loss happened
//! mid-join (apply the join-failure row) or after a prior association
//! (apply the same bookkeeping `StationDisconnect` names, with the
//! reconnection regime already armed from the earlier success).
//! [`WifiEvent::StationDisconnect`] is reserved for the explicit
//! `wifi_disconnect` command path, which spec.md §4.2 says ends the
//! reconnection drive rather than re-arming it.

use std::thread;
use std::time::Duration;

use crate::clock::{PollTimer, SCAN_TIMEOUT};
use crate::event::{EventPoster, WifiEvent};
use crate::netstack::{Dhcpv4State, Ipv6State, NetStack};
use crate::notify::{NotificationGate, Upcall};
use crate::provision::{Security, WifiProvision};
use crate::radio::{ApInfo, Pending, RadioAdapter, ScanCfg, SecurityPolicy};
use crate::retry::{NextAttempt, RetryPolicy};
use crate::scan::{ScanComplete, ScanInProgress, ScanJob, ScanOutcome};
use crate::state::StateSet;

/// Owns C5, C6, C7 state plus the scan semaphore pair (C3) and the DHCP
/// poll timer (C1), and drives the radio adapter (C4) and netstack
/// facade it is generic over.
pub struct StateMachine<R: RadioAdapter, N: NetStack> {
    radio: R,
    netstack: N,
    poster: EventPoster,
    security_policy: SecurityPolicy,
    state: StateSet,
    retry: RetryPolicy,
    notify: NotificationGate,
    dhcp_timer: PollTimer,
    scan_in_progress: ScanInProgress,
    scan_complete: ScanComplete,
    provision: Option<WifiProvision>,
    /// The AP the current (or most recent) join targeted, captured by the
    /// pre-join scan. Backs the supervisor's `get_ap_ext` accessor
    /// (SPEC_FULL.md §3's `wfx_get_ap_ext` supplement).
    current_ap: Option<ApInfo>,
    /// The retry-delay suspension point (spec.md §5 suspension point 3).
    /// A plain function pointer rather than a trait object — swapped for
    /// a no-op only in this module's own tests, so the join-failure exhaustion
    /// and reconnection-backoff scenarios don't have to wait on the wall clock.
    sleep: fn(Duration),
}

impl<R: RadioAdapter, N: NetStack> StateMachine<R, N> {
    pub fn new(radio: R, netstack: N, poster: EventPoster, security_policy: SecurityPolicy) -> Self {
        Self {
            radio,
            netstack,
            poster,
            security_policy,
            state: StateSet::empty(),
            retry: RetryPolicy::new(),
            notify: NotificationGate::new(),
            dhcp_timer: PollTimer::new(),
            scan_in_progress: ScanInProgress::new(),
            scan_complete: ScanComplete::new(),
            provision: None,
            current_ap: None,
            sleep: thread::sleep,
        }
    }

    #[cfg(test)]
    fn with_instant_retries(mut self) -> Self {
        self.sleep = |_| {};
        self
    }

    pub fn state(&self) -> StateSet {
        self.state
    }

    pub fn is_sta_connected(&self) -> bool {
        self.state.is_sta_connected()
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn mark_dev_ready(&mut self) {
        self.state.insert(StateSet::DEV_READY);
    }

    pub fn set_provision(&mut self, provision: WifiProvision) {
        self.provision = Some(provision);
        self.state.insert(StateSet::STA_PROVISIONED);
    }

    pub fn provision(&self) -> Option<&WifiProvision> {
        self.provision.as_ref()
    }

    pub fn clear_provision(&mut self) {
        self.provision = None;
        self.state.remove(StateSet::STA_PROVISIONED);
    }

    /// The AP the current or most recent join targeted (`get_ap_ext`,
    /// spec.md §6). `None` before any pre-join scan has resolved one.
    pub fn current_ap(&self) -> Option<&ApInfo> {
        self.current_ap.as_ref()
    }

    /// `reset_counts` command (spec.md §6): zeroes the retry counters
    /// only, leaving device state and notification flags untouched.
    pub fn reset_retry_counts(&mut self) {
        self.retry.reset_counts();
    }

    /// Whether a `DhcpPoll` is currently armed, and how long until it
    /// fires — used by the supervisor to bound its event-queue wait.
    pub fn dhcp_timer_remaining(&self) -> Option<std::time::Duration> {
        self.dhcp_timer.remaining()
    }

    /// Called by the supervisor once its bounded wait elapses; re-arms
    /// and returns `true` if the deadline had actually passed.
    pub fn dhcp_timer_due(&mut self) -> bool {
        self.dhcp_timer.poll()
    }

    /// Dispatches one event and returns the upward notifications it
    /// produced (spec.md §4.4). Never blocks longer than the retry delay
    /// or `SCAN_TIMEOUT` — the core's only bounded suspension points
    /// besides the caller's own queue wait (spec.md §5).
    pub fn dispatch(&mut self, event: WifiEvent) -> Vec<Upcall> {
        let mut upcalls = Vec::new();
        match event {
            WifiEvent::StationStartJoin => self.on_station_start_join(),
            WifiEvent::StationConnect => self.on_station_connect(),
            WifiEvent::StationJoinFailed(code) => self.on_station_join_failed(code, &mut upcalls),
            WifiEvent::StationDisconnect => self.on_station_disconnect(&mut upcalls),
            WifiEvent::StationDoDhcp => self.on_station_do_dhcp(),
            WifiEvent::StationDhcpDone => self.on_station_dhcp_done(),
            WifiEvent::DhcpPoll => self.on_dhcp_poll(&mut upcalls),
            WifiEvent::Scan(ssid_filter) => self.on_scan(ssid_filter, &mut upcalls),
            WifiEvent::ApStart | WifiEvent::ApStop => {}
        }
        upcalls
    }

    fn on_station_start_join(&mut self) {
        let guard_ok = self.state.contains(StateSet::STA_PROVISIONED)
            && !self
                .state
                .intersects(StateSet::STA_CONNECTING | StateSet::STA_CONNECTED);
        if !guard_ok {
            return;
        }
        let Some(provision) = self.provision.clone() else {
            return;
        };

        let security = self
            .capture_refined_security(provision.ssid())
            .unwrap_or_else(|| provision.security());

        match self.radio.connect(provision.ssid(), security, provision.psk()) {
            Ok(Pending::Pending | Pending::Ok(())) => {
                self.state.insert(StateSet::STA_CONNECTING);
            }
            Err(e) => {
                log::warn!("synchronous connect() failure: {e}");
                self.schedule_retry();
            }
        }
    }

    /// Pre-connect scan to capture `ApInfo` and refined security for the
    /// target SSID (spec.md §4.3 `StationStartJoin` row). `None` means no
    /// refinement was attempted (a scan was already outstanding); `Some`
    /// is either a matched AP's observed security or, on scan failure or
    /// timeout, the configured fallback (spec.md §4.3 edge case).
    fn capture_refined_security(&mut self, ssid: &str) -> Option<Security> {
        if self.state.contains(StateSet::SCAN_STARTED) || !self.scan_in_progress.try_acquire() {
            return None;
        }
        self.state.insert(StateSet::SCAN_STARTED);
        let cfg = if self.state.is_sta_connected() {
            ScanCfg::ASSOCIATED
        } else {
            ScanCfg::Default
        };
        let outcome = match self.radio.start_scan(Some(ssid), cfg, &self.scan_complete) {
            Ok(_) => self.scan_complete.wait_timeout(SCAN_TIMEOUT),
            Err(e) => {
                log::warn!("pre-join scan failed to start: {e}");
                None
            }
        };
        self.state.remove(StateSet::SCAN_STARTED);
        self.scan_in_progress.release();

        match outcome {
            Some(ScanOutcome::Results(results)) => {
                let found = results.into_iter().find(|ap| ap.ssid.as_str() == ssid);
                if let Some(ap) = &found {
                    self.current_ap = Some(ap.clone());
                }
                found.map(|ap| ap.security)
            }
            Some(ScanOutcome::Failed) | None => Some(self.fallback_security()),
        }
    }

    fn fallback_security(&self) -> Security {
        match self.security_policy {
            SecurityPolicy::Wpa3TransitionEnabled => Security::Wpa3,
            SecurityPolicy::Wpa3TransitionDisabled => Security::Wpa2,
        }
    }

    fn on_station_connect(&mut self) {
        if !self.state.contains(StateSet::STA_CONNECTING) {
            // Stale join-success callback arriving after a disconnect;
            // the `StaConnecting` guard drops it (spec.md §4.3, §5).
            return;
        }
        self.state.remove(StateSet::STA_CONNECTING);
        self.state.insert(StateSet::STA_CONNECTED);
        self.retry.reset();
        self.retry.mark_ever_connected();
        // Silent reset — no loss events fire on a fresh association.
        self.notify = NotificationGate::new();
        self.netstack.set_link_up();
        let _ = self.poster.post(WifiEvent::StationDoDhcp);
    }

    fn on_station_join_failed(&mut self, code: i32, upcalls: &mut Vec<Upcall>) {
        if !self
            .state
            .intersects(StateSet::STA_CONNECTING | StateSet::STA_CONNECTED)
        {
            return;
        }
        let was_connected = self.state.contains(StateSet::STA_CONNECTED);
        self.state
            .remove(StateSet::STA_CONNECTING | StateSet::STA_CONNECTED | StateSet::STA_DHCP_DONE);

        if was_connected {
            self.dhcp_timer.disarm();
            self.netstack.set_link_down();
            self.notify.reset_on_disconnect(upcalls);
            self.current_ap = None;
        }

        log::warn!("join failed, code {code}");
        self.schedule_retry();
    }

    /// Applies C5 and either sleeps then re-posts `StationStartJoin`, or
    /// gives up silently (spec.md §4.2, §9 — first-join exhaustion is not
    /// surfaced as an error).
    fn schedule_retry(&mut self) {
        match self.retry.on_join_failure() {
            NextAttempt::RetryAfter(delay) => {
                (self.sleep)(delay);
                let _ = self.poster.post(WifiEvent::StationStartJoin);
            }
            NextAttempt::GiveUp => {
                log::info!("first-join retries exhausted; idling until the next wifi_connect");
            }
        }
    }

    /// Explicit `wifi_disconnect` command (spec.md §4.2: this is what
    /// ends the reconnection drive — unlike a radio-reported loss, it
    /// does not re-arm `StationStartJoin`).
    fn on_station_disconnect(&mut self, upcalls: &mut Vec<Upcall>) {
        if let Err(e) = self.radio.disconnect() {
            log::warn!("disconnect() returned an error, proceeding anyway: {e}");
        }
        self.state.remove(
            StateSet::STA_CONNECTING | StateSet::STA_CONNECTED | StateSet::STA_DHCP_DONE,
        );
        self.dhcp_timer.disarm();
        self.netstack.set_link_down();
        self.notify.reset_on_disconnect(upcalls);
        self.current_ap = None;
    }

    fn on_station_do_dhcp(&mut self) {
        if !self.state.contains(StateSet::STA_CONNECTED) {
            return;
        }
        self.dhcp_timer.arm();
    }

    fn on_station_dhcp_done(&mut self) {
        if !self.state.contains(StateSet::STA_CONNECTED) {
            return;
        }
        self.dhcp_timer.disarm();
        self.state.insert(StateSet::STA_DHCP_DONE);
    }

    fn on_dhcp_poll(&mut self, upcalls: &mut Vec<Upcall>) {
        if !self.state.contains(StateSet::STA_CONNECTED) {
            return; // boundary: DhcpPoll while ¬StaConnected is a no-op
        }
        let ap_mac = self.radio.get_mac().unwrap_or_else(|e| {
            log::warn!("get_mac failed during DhcpPoll: {e}");
            [0; 6]
        });

        match self.netstack.dhcp_poll() {
            Dhcpv4State::AddressAssigned(addr) => {
                let freshly_acquired = !self.notify.notified_ipv4();
                self.notify.notify_ipv4(addr, ap_mac, upcalls);
                if freshly_acquired {
                    let _ = self.poster.post(WifiEvent::StationDhcpDone);
                }
            }
            Dhcpv4State::Off => self.notify.notify_ipv4_lost(upcalls),
        }

        if matches!(self.netstack.ipv6_addr_state(), Ipv6State::Preferred)
            && !self.notify.notified_ipv6()
        {
            self.notify.notify_ipv6(ap_mac, upcalls);
            let _ = self.poster.post(WifiEvent::StationDhcpDone);
        }
    }

    fn on_scan(&mut self, ssid_filter: Option<String>, upcalls: &mut Vec<Upcall>) {
        if self.state.contains(StateSet::SCAN_STARTED) || !self.scan_in_progress.try_acquire() {
            return; // a scan is already outstanding; dropped (spec.md §4.3)
        }
        self.state.insert(StateSet::SCAN_STARTED);

        let job = ScanJob::new(ssid_filter);
        let cfg = if self.state.is_sta_connected() {
            ScanCfg::ASSOCIATED
        } else {
            ScanCfg::Default
        };
        let outcome = match self
            .radio
            .start_scan(job.ssid_filter.as_deref(), cfg, &self.scan_complete)
        {
            Ok(_) => self.scan_complete.wait_timeout(SCAN_TIMEOUT),
            Err(e) => {
                log::warn!("start_scan failed to start: {e}");
                None
            }
        };

        if let Some(ScanOutcome::Results(results)) = outcome {
            for ap in results.into_iter().filter(|ap| job.matches(ap.ssid.as_str())) {
                upcalls.push(Upcall::ScanResult(ap));
            }
        }
        // Failure or timeout: swallowed, no error upward (spec.md §5
        // cancellation policy) — only the terminating sentinel fires.
        upcalls.push(Upcall::ScanDone);

        self.state.remove(StateSet::SCAN_STARTED);
        self.scan_in_progress.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventQueue;
    use crate::netstack::mock::MockNetStack;
    use crate::radio::mock::{ConnectScript, MockRadio};
    use crate::radio::RadioError;

    struct Fixture {
        machine: StateMachine<MockRadio, MockNetStack>,
        netstack: MockNetStack,
        radio: MockRadio,
        queue: EventQueue,
    }

    fn fixture() -> Fixture {
        let (poster, queue) = EventQueue::bounded(crate::event::DEFAULT_QUEUE_DEPTH);
        let radio = MockRadio::new([0x02, 0, 0, 0, 0, 1]);
        let netstack = MockNetStack::new();
        let machine = StateMachine::new(
            radio.clone(),
            netstack.clone(),
            poster,
            SecurityPolicy::default(),
        )
        .with_instant_retries();
        Fixture {
            machine,
            netstack,
            radio,
            queue,
        }
    }

    fn provision(machine: &mut StateMachine<MockRadio, MockNetStack>) {
        machine.set_provision(WifiProvision::new("LabAP", b"secret12", Security::Wpa2).unwrap());
    }

    /// S1 — cold boot, first join, IPv4 acquired.
    #[test]
    fn s1_cold_boot_first_join_ipv4_acquired() {
        let mut f = fixture();
        provision(&mut f.machine);

        f.machine.dispatch(WifiEvent::StationStartJoin);
        assert!(f.machine.state().contains(StateSet::STA_CONNECTING));
        assert_eq!(f.radio.connect_calls(), 1);

        let upcalls = f.machine.dispatch(WifiEvent::StationConnect);
        assert!(upcalls.is_empty());
        assert!(f.machine.state().contains(StateSet::STA_CONNECTED));
        assert!(f.netstack.is_link_up());
        assert_eq!(f.queue.recv(), Some(WifiEvent::StationDoDhcp));

        f.machine.dispatch(WifiEvent::StationDoDhcp);
        assert!(f.machine.dhcp_timer_remaining().is_some());

        f.netstack
            .set_dhcp4(crate::netstack::Dhcpv4State::AddressAssigned([10, 0, 0, 42]));
        let upcalls = f.machine.dispatch(WifiEvent::DhcpPoll);
        assert_eq!(
            upcalls,
            vec![
                Upcall::Ipv4Acquired { addr: [10, 0, 0, 42] },
                Upcall::WifiConnected { ap_mac: [0x02, 0, 0, 0, 0, 1] },
            ]
        );
        assert_eq!(f.queue.recv(), Some(WifiEvent::StationDhcpDone));

        f.machine.dispatch(WifiEvent::StationDhcpDone);
        assert_eq!(
            f.machine.state(),
            StateSet::STA_PROVISIONED
                | StateSet::STA_CONNECTED
                | StateSet::STA_DHCP_DONE
        );
        assert!(f.machine.state().is_sta_ready());
    }

    /// S2 — first-join failure exhaustion.
    #[test]
    fn s2_first_join_failure_exhaustion() {
        let mut f = fixture();
        provision(&mut f.machine);
        f.radio
            .set_connect_script(ConnectScript::ReturnPending);

        f.machine.dispatch(WifiEvent::StationStartJoin);
        for _ in 0..crate::retry::MAX_JOIN_RETRIES {
            let upcalls = f.machine.dispatch(WifiEvent::StationJoinFailed(1));
            assert!(upcalls.is_empty(), "first-join failures never notify upward");
        }

        assert_eq!(f.radio.connect_calls(), crate::retry::MAX_JOIN_RETRIES);
        assert!(!f.machine.state().contains(StateSet::STA_CONNECTING));
        assert!(!f.machine.state().contains(StateSet::STA_CONNECTED));
        // Exhausted: a further StationStartJoin still re-attempts (the
        // outer layer, not this core, decides whether to keep calling
        // wifi_connect; see spec.md §9's first-join-failure note).
    }

    /// S4 — IPv6-only acquisition (DHCPv4 never completes).
    #[test]
    fn s4_ipv6_only_acquisition() {
        let mut f = fixture();
        provision(&mut f.machine);
        f.machine.dispatch(WifiEvent::StationStartJoin);
        f.machine.dispatch(WifiEvent::StationConnect);
        f.queue.recv(); // StationDoDhcp
        f.machine.dispatch(WifiEvent::StationDoDhcp);

        f.netstack.set_ipv6(crate::netstack::Ipv6State::Preferred);
        let upcalls = f.machine.dispatch(WifiEvent::DhcpPoll);
        assert_eq!(
            upcalls,
            vec![
                Upcall::IpLost,
                Upcall::Ipv6Acquired,
                Upcall::WifiConnected { ap_mac: [0x02, 0, 0, 0, 0, 1] },
            ]
        );
        assert_eq!(f.queue.recv(), Some(WifiEvent::StationDhcpDone));
        f.machine.dispatch(WifiEvent::StationDhcpDone);
        assert!(f.machine.state().contains(StateSet::STA_DHCP_DONE));
    }

    /// S3 — reconnection back-off after a prior successful join.
    #[test]
    fn s3_reconnection_backoff_after_prior_success() {
        let mut f = fixture();
        provision(&mut f.machine);
        f.machine.dispatch(WifiEvent::StationStartJoin);
        f.machine.dispatch(WifiEvent::StationConnect);
        f.queue.recv(); // StationDoDhcp, not relevant here

        let upcalls = f.machine.dispatch(WifiEvent::StationJoinFailed(7));
        assert_eq!(upcalls, vec![Upcall::IpLost, Upcall::Ipv6Lost]);
        assert!(!f.machine.state().contains(StateSet::STA_CONNECTED));
        // The retry delay (MIN_RETRY_MS) already elapsed synchronously
        // inside `schedule_retry`, and a fresh StationStartJoin is queued.
        assert_eq!(f.queue.recv(), Some(WifiEvent::StationStartJoin));
    }

    /// S5 — scan with filter.
    #[test]
    fn s5_scan_with_filter() {
        let mut f = fixture();
        let ap = |ssid: &str, rssi: i16| crate::radio::ApInfo {
            ssid: {
                let mut s = heapless::String::new();
                s.push_str(ssid).unwrap();
                s
            },
            bssid: [0; 6],
            channel: 6,
            security: Security::Wpa2,
            rssi_dbm: rssi,
        };
        f.radio.set_scan_script(ScanOutcome::Results(vec![
            ap("LabAP-5G", -55),
            ap("LabAP", -40),
            ap("Guest", -70),
        ]));

        let upcalls = f.machine.dispatch(WifiEvent::Scan(Some("LabAP".to_owned())));
        let matched: Vec<_> = upcalls
            .iter()
            .filter_map(|u| match u {
                Upcall::ScanResult(ap) => Some(ap.ssid.as_str().to_owned()),
                _ => None,
            })
            .collect();
        assert_eq!(matched, vec!["LabAP-5G".to_owned(), "LabAP".to_owned()]);
        assert_eq!(upcalls.last(), Some(&Upcall::ScanDone));
        assert!(!f.machine.state().contains(StateSet::SCAN_STARTED));
    }

    /// S6 — disconnect during `StaConnecting`.
    #[test]
    fn s6_disconnect_during_connecting() {
        let mut f = fixture();
        provision(&mut f.machine);
        f.radio.set_connect_script(ConnectScript::ReturnPending);
        f.machine.dispatch(WifiEvent::StationStartJoin);
        assert!(f.machine.state().contains(StateSet::STA_CONNECTING));

        let upcalls = f.machine.dispatch(WifiEvent::StationDisconnect);
        assert_eq!(upcalls, vec![Upcall::IpLost, Upcall::Ipv6Lost]);
        assert!(!f.machine.state().contains(StateSet::STA_CONNECTING));
        assert_eq!(f.radio.disconnect_calls(), 1);

        // A subsequent stale join-success is discarded by the guard.
        let upcalls = f.machine.dispatch(WifiEvent::StationConnect);
        assert!(upcalls.is_empty());
        assert!(!f.machine.state().contains(StateSet::STA_CONNECTED));

        // No auto-reconnect after an explicit disconnect command.
        assert!(f.queue.recv_timeout(std::time::Duration::from_millis(20)).is_err());
    }

    #[test]
    fn scan_dropped_while_one_is_already_outstanding() {
        // Exercised indirectly: SCAN_STARTED only transiently set inside
        // on_scan/capture_refined_security in this single-threaded model,
        // so the direct way to see the drop is to assert the semaphore
        // itself enforces it (covered in scan.rs). Here we assert a scan
        // still completes normally when none is outstanding.
        let mut f = fixture();
        f.radio.set_scan_script(ScanOutcome::Results(Vec::new()));
        let upcalls = f.machine.dispatch(WifiEvent::Scan(None));
        assert_eq!(upcalls, vec![Upcall::ScanDone]);
    }

    #[test]
    fn dhcp_poll_is_a_noop_while_not_connected() {
        let mut f = fixture();
        f.netstack
            .set_dhcp4(crate::netstack::Dhcpv4State::AddressAssigned([1, 2, 3, 4]));
        let upcalls = f.machine.dispatch(WifiEvent::DhcpPoll);
        assert!(upcalls.is_empty());
    }

    #[test]
    fn synchronous_connect_error_schedules_a_retry_without_setting_connecting() {
        let mut f = fixture();
        provision(&mut f.machine);
        f.radio
            .set_connect_script(ConnectScript::ReturnSyncError(RadioError::Transient(3)));
        f.machine.dispatch(WifiEvent::StationStartJoin);
        assert!(!f.machine.state().contains(StateSet::STA_CONNECTING));
        assert_eq!(f.queue.recv(), Some(WifiEvent::StationStartJoin));
    }
}
