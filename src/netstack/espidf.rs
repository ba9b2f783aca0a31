//! Real TCP/IP stack facade wired to the `EspNetif` owned by the
//! station's `BlockingWifi` handle.

use std::sync::{Arc, Mutex};

use esp_idf_svc::wifi::{BlockingWifi, EspWifi};

use super::{Dhcpv4State, Ipv6State, NetStack};

/// Shares the same `BlockingWifi` the radio adapter drives — the netif
/// and the Wi-Fi driver are two facets of one `EspWifi` instance, exactly
/// as `rkuris-erik/nextgen/src/wifi.rs` reads `wifi.wifi().sta_netif()`
/// off its own `BlockingWifi`.
pub struct EspIdfNetStack {
    wifi: Arc<Mutex<BlockingWifi<EspWifi<'static>>>>,
}

impl EspIdfNetStack {
    pub fn new(wifi: Arc<Mutex<BlockingWifi<EspWifi<'static>>>>) -> Self {
        Self { wifi }
    }
}

impl NetStack for EspIdfNetStack {
    fn set_link_up(&mut self) {
        // The netif tracks link state from the Wi-Fi driver's own
        // connect/disconnect callbacks; nothing to drive here
        // independently.
    }

    fn set_link_down(&mut self) {}

    fn dhcp_poll(&mut self) -> Dhcpv4State {
        let wifi = self.wifi.lock().unwrap();
        match wifi.wifi().sta_netif().get_ip_info() {
            Ok(info) if !info.ip.is_unspecified() => {
                let octets = info.ip.octets();
                Dhcpv4State::AddressAssigned(octets)
            }
            _ => Dhcpv4State::Off,
        }
    }

    fn ipv6_addr_state(&self) -> Ipv6State {
        let wifi = self.wifi.lock().unwrap();
        match wifi.wifi().sta_netif().get_ip6_addrs() {
            Ok(addrs) if !addrs.is_empty() => Ipv6State::Preferred,
            _ => Ipv6State::NotReady,
        }
    }
}
