//! Device-state bitset (spec.md §3).
//!
//! Reimplements the source's `wfx_rsi.dev_state` bitmask
//! (`original_source/.../wfx_rsi.h`) as a typed flag set instead of raw
//! `u32` manipulation.

use bitflags::bitflags;

bitflags! {
    /// Distinguishable device states. Flags may combine; `StaReady` is a
    /// derived combination rather than an independently-set bit.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct StateSet: u16 {
        /// Radio adapter initialized and the supervisor has entered its
        /// event loop.
        const DEV_READY       = 1 << 0;
        /// A non-empty [`crate::WifiProvision`] has been set.
        const STA_PROVISIONED = 1 << 1;
        /// An association attempt is in flight (mutually exclusive with
        /// `STA_CONNECTED`).
        const STA_CONNECTING  = 1 << 2;
        /// Associated to an AP.
        const STA_CONNECTED   = 1 << 3;
        /// DHCP (or SLAAC) has completed at least once this episode.
        const STA_DHCP_DONE   = 1 << 4;
        /// A scan is currently in flight.
        const SCAN_STARTED    = 1 << 5;
    }
}

impl StateSet {
    /// `StaConnected ∧ StaDhcpDone` — the link is fully usable.
    pub const STA_READY: Self =
        Self::from_bits_truncate(Self::STA_CONNECTED.bits() | Self::STA_DHCP_DONE.bits());

    /// Is the `StaConnecting ∧ StaConnected = ∅` invariant (spec.md §3)
    /// currently satisfied?
    pub fn invariant_holds(self) -> bool {
        !(self.contains(Self::STA_CONNECTING) && self.contains(Self::STA_CONNECTED))
    }

    pub fn is_sta_ready(self) -> bool {
        self.contains(Self::STA_READY)
    }

    pub fn is_sta_connected(self) -> bool {
        self.contains(Self::STA_CONNECTED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connecting_and_connected_are_mutually_exclusive_by_construction() {
        let mut s = StateSet::DEV_READY;
        s.insert(StateSet::STA_CONNECTING);
        assert!(s.invariant_holds());
        s.remove(StateSet::STA_CONNECTING);
        s.insert(StateSet::STA_CONNECTED);
        assert!(s.invariant_holds());
    }

    #[test]
    fn sta_ready_requires_both_connected_and_dhcp_done() {
        let mut s = StateSet::STA_CONNECTED;
        assert!(!s.is_sta_ready());
        s.insert(StateSet::STA_DHCP_DONE);
        assert!(s.is_sta_ready());
    }

    #[test]
    fn scan_started_coexists_with_any_other_flag() {
        let s = StateSet::STA_CONNECTED | StateSet::STA_DHCP_DONE | StateSet::SCAN_STARTED;
        assert!(s.is_sta_ready());
        assert!(s.contains(StateSet::SCAN_STARTED));
    }
}
