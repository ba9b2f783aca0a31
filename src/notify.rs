//! Notification gate (C7, spec.md §4.4).
//!
//! Idempotent forwarder: each upward status event fires at most once per
//! connectivity episode. `wifi-connected` is emitted opportunistically —
//! whenever IP reachability is achieved by *either* address family and we
//! haven't already declared the link usable.

/// Upward events the gate may emit. `ap_mac` on `WifiConnected` and `addr`
/// on `Ipv4Acquired` carry the payloads spec.md §6 specifies.
///
/// `ScanResult`/`ScanDone` are not gated (they are not part of the
/// connectivity episode the rest of this type tracks): spec.md §6's scan
/// result callback — "(ssid, bssid, rssi, security) once per match, then
/// a NULL sentinel" — is expressed here as a result per match followed by
/// one `ScanDone`, carried on the same upward channel as the idempotent
/// notifications rather than a separate C-style callback pointer.
#[derive(Clone, Debug, PartialEq)]
pub enum Upcall {
    /// Emitted exactly once, by the supervisor itself after `wifi_start`
    /// succeeds (spec.md §6) — not gated by [`NotificationGate`], since it
    /// has nothing to do with a connectivity episode.
    WifiStarted,
    WifiConnected { ap_mac: [u8; 6] },
    Ipv4Acquired { addr: [u8; 4] },
    Ipv6Acquired,
    IpLost,
    Ipv6Lost,
    ScanResult(crate::radio::ApInfo),
    ScanDone,
}

/// Tracks which notifications have already fired this episode and
/// suppresses duplicates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotificationGate {
    notified_ipv4: bool,
    notified_ipv6: bool,
    notified_connectivity: bool,
}

impl NotificationGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notified_ipv4(&self) -> bool {
        self.notified_ipv4
    }

    pub fn notified_ipv6(&self) -> bool {
        self.notified_ipv6
    }

    pub fn notified_connectivity(&self) -> bool {
        self.notified_connectivity
    }

    /// Emits `ipv4-acquired` if not already emitted this episode, then
    /// opportunistically emits `wifi-connected` (spec.md §4.4: IP
    /// reachability is the trigger for declaring Wi-Fi usable).
    pub fn notify_ipv4(&mut self, addr: [u8; 4], ap_mac: [u8; 6], out: &mut Vec<Upcall>) {
        if !self.notified_ipv4 {
            out.push(Upcall::Ipv4Acquired { addr });
            self.notified_ipv4 = true;
        }
        self.maybe_notify_connectivity(ap_mac, out);
    }

    /// Clears `notified_ipv4` and emits `ip-lost` when DHCPv4 reports
    /// `Off` while still associated (spec.md §4.3 `DhcpPoll` row).
    pub fn notify_ipv4_lost(&mut self, out: &mut Vec<Upcall>) {
        if self.notified_ipv4 {
            self.notified_ipv4 = false;
        }
        out.push(Upcall::IpLost);
    }

    pub fn notify_ipv6(&mut self, ap_mac: [u8; 6], out: &mut Vec<Upcall>) {
        if !self.notified_ipv6 {
            out.push(Upcall::Ipv6Acquired);
            self.notified_ipv6 = true;
        }
        self.maybe_notify_connectivity(ap_mac, out);
    }

    fn maybe_notify_connectivity(&mut self, ap_mac: [u8; 6], out: &mut Vec<Upcall>) {
        if !self.notified_connectivity && (self.notified_ipv4 || self.notified_ipv6) {
            out.push(Upcall::WifiConnected { ap_mac });
            self.notified_connectivity = true;
        }
    }

    /// Clears all three flags and emits `ip-lost`, `ipv6-lost`. Called on
    /// every disconnect episode or explicit reset (spec.md §4.4).
    pub fn reset_on_disconnect(&mut self, out: &mut Vec<Upcall>) {
        *self = Self::default();
        out.push(Upcall::IpLost);
        out.push(Upcall::Ipv6Lost);
    }
}
