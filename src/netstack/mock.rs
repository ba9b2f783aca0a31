//! Host-testable stand-in TCP/IP stack, scriptable the same way
//! [`crate::radio::mock::MockRadio`] is.

use std::sync::{Arc, Mutex};

use super::{Dhcpv4State, Ipv6State, NetStack};

#[derive(Debug, Clone, Copy)]
struct Inner {
    link_up: bool,
    dhcp4: Dhcpv4State,
    ipv6: Ipv6State,
}

#[derive(Clone)]
pub struct MockNetStack {
    inner: Arc<Mutex<Inner>>,
}

impl MockNetStack {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                link_up: false,
                dhcp4: Dhcpv4State::Off,
                ipv6: Ipv6State::NotReady,
            })),
        }
    }

    pub fn set_dhcp4(&self, state: Dhcpv4State) {
        self.inner.lock().unwrap().dhcp4 = state;
    }

    pub fn set_ipv6(&self, state: Ipv6State) {
        self.inner.lock().unwrap().ipv6 = state;
    }

    pub fn is_link_up(&self) -> bool {
        self.inner.lock().unwrap().link_up
    }
}

impl Default for MockNetStack {
    fn default() -> Self {
        Self::new()
    }
}

impl NetStack for MockNetStack {
    fn set_link_up(&mut self) {
        self.inner.lock().unwrap().link_up = true;
    }

    fn set_link_down(&mut self) {
        let mut inner = self.inner.lock().unwrap();
        inner.link_up = false;
        inner.dhcp4 = Dhcpv4State::Off;
        inner.ipv6 = Ipv6State::NotReady;
    }

    fn dhcp_poll(&mut self) -> Dhcpv4State {
        self.inner.lock().unwrap().dhcp4
    }

    fn ipv6_addr_state(&self) -> Ipv6State {
        self.inner.lock().unwrap().ipv6
    }
}
