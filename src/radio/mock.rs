//! Host-testable stand-in radio adapter.
//!
//! Mirrors the role `rkuris-erik/nextgen/src/wifi.rs`'s
//! `#[cfg(not(target_os = "espidf"))] mod hardware` plays: a
//! non-hardware-backed implementation of the same surface, scriptable by
//! tests instead of wired to real silicon.

use std::sync::{Arc, Mutex};

use super::{Pending, RadioAdapter, RadioError, ScanCfg, SecurityPolicy};
use crate::provision::Security;
use crate::scan::{ScanComplete, ScanOutcome};

/// What the mock should do the next time `connect` is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectScript {
    ReturnPending,
    ReturnSyncError(RadioError),
}

#[derive(Debug, Clone)]
struct Inner {
    initialized: bool,
    mac: [u8; 6],
    rssi: i16,
    connect_script: ConnectScript,
    security_policy: SecurityPolicy,
    last_connect: Option<(String, Security)>,
    connect_calls: u32,
    scan_calls: u32,
    disconnect_calls: u32,
    scan_script: ScanOutcome,
}

/// Scriptable mock implementing [`RadioAdapter`] entirely in memory.
/// Cloning shares state (`Arc`) so a test can hold a handle to assert call
/// counts while the state machine holds its own `RadioAdapter`.
#[derive(Clone)]
pub struct MockRadio {
    inner: Arc<Mutex<Inner>>,
}

impl MockRadio {
    pub fn new(mac: [u8; 6]) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                initialized: false,
                mac,
                rssi: -50,
                connect_script: ConnectScript::ReturnPending,
                security_policy: SecurityPolicy::default(),
                last_connect: None,
                connect_calls: 0,
                scan_calls: 0,
                disconnect_calls: 0,
                scan_script: ScanOutcome::Results(Vec::new()),
            })),
        }
    }

    pub fn set_connect_script(&self, script: ConnectScript) {
        self.inner.lock().unwrap().connect_script = script;
    }

    /// Controls what the next (and subsequent) `start_scan` calls signal
    /// on the caller's [`ScanComplete`].
    pub fn set_scan_script(&self, outcome: ScanOutcome) {
        self.inner.lock().unwrap().scan_script = outcome;
    }

    pub fn connect_calls(&self) -> u32 {
        self.inner.lock().unwrap().connect_calls
    }

    pub fn scan_calls(&self) -> u32 {
        self.inner.lock().unwrap().scan_calls
    }

    pub fn disconnect_calls(&self) -> u32 {
        self.inner.lock().unwrap().disconnect_calls
    }

    pub fn last_connect(&self) -> Option<(String, Security)> {
        self.inner.lock().unwrap().last_connect.clone()
    }
}

impl RadioAdapter for MockRadio {
    fn init(&mut self) -> Result<(), RadioError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.initialized {
            return Err(RadioError::AlreadyInitialized);
        }
        inner.initialized = true;
        Ok(())
    }

    fn connect(
        &mut self,
        ssid: &str,
        security: Security,
        _psk: &[u8],
    ) -> Result<Pending<()>, RadioError> {
        let mut inner = self.inner.lock().unwrap();
        inner.security_policy.resolve(security)?;
        inner.connect_calls += 1;
        inner.last_connect = Some((ssid.to_owned(), security));
        match inner.connect_script {
            ConnectScript::ReturnPending => Ok(Pending::Pending),
            ConnectScript::ReturnSyncError(e) => Err(e),
        }
    }

    fn disconnect(&mut self) -> Result<(), RadioError> {
        self.inner.lock().unwrap().disconnect_calls += 1;
        Ok(())
    }

    fn start_scan(
        &mut self,
        _ssid_filter: Option<&str>,
        _cfg: ScanCfg,
        complete: &ScanComplete,
    ) -> Result<Pending<()>, RadioError> {
        let outcome = {
            let mut inner = self.inner.lock().unwrap();
            inner.scan_calls += 1;
            inner.scan_script.clone()
        };
        complete.signal(outcome);
        Ok(Pending::Pending)
    }

    fn get_rssi(&self) -> Result<i16, RadioError> {
        Ok(self.inner.lock().unwrap().rssi)
    }

    fn get_mac(&self) -> Result<[u8; 6], RadioError> {
        Ok(self.inner.lock().unwrap().mac)
    }
}
