//! Credentials handed to the supervisor by the outer connectivity manager.

use heapless::String as HeaplessString;
use heapless::Vec as HeaplessVec;

/// Maximum SSID length, per the 802.11 spec and spec.md §3.
pub const MAX_SSID_LEN: usize = 32;
/// Maximum PSK length (WPA passphrase), per spec.md §3.
pub const MAX_PSK_LEN: usize = 64;

/// Security modes recognized at the core's boundary.
///
/// `Unspecified` exists only to carry a refined value learned from a scan
/// response (spec.md §4.3 edge cases); it is never valid as input to
/// [`WifiProvision::new`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Security {
    Open,
    Wep,
    Wpa,
    Wpa2,
    Wpa3,
    Unspecified,
}

/// Errors constructing a [`WifiProvision`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProvisionError {
    #[error("SSID must be 1..={MAX_SSID_LEN} bytes, got {0}")]
    SsidLength(usize),
    #[error("PSK must be 0..={MAX_PSK_LEN} bytes, got {0}")]
    PskLength(usize),
}

/// Process-wide credentials set by the outer layer before any `connect`
/// command. Held in RAM only for the process lifetime (spec.md §6: no
/// persisted state owned by the core).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WifiProvision {
    ssid: HeaplessString<MAX_SSID_LEN>,
    psk: HeaplessVec<u8, MAX_PSK_LEN>,
    security: Security,
}

impl WifiProvision {
    /// Builds a provision, enforcing the length invariants in spec.md §3.
    /// An empty SSID is rejected here rather than deferred to
    /// `StationStartJoin`, since no valid provision can ever carry one.
    pub fn new(ssid: &str, psk: &[u8], security: Security) -> Result<Self, ProvisionError> {
        if ssid.is_empty() || ssid.len() > MAX_SSID_LEN {
            return Err(ProvisionError::SsidLength(ssid.len()));
        }
        if psk.len() > MAX_PSK_LEN {
            return Err(ProvisionError::PskLength(psk.len()));
        }
        let mut ssid_buf = HeaplessString::new();
        ssid_buf
            .push_str(ssid)
            .map_err(|()| ProvisionError::SsidLength(ssid.len()))?;
        let mut psk_buf = HeaplessVec::new();
        psk_buf
            .extend_from_slice(psk)
            .map_err(|()| ProvisionError::PskLength(psk.len()))?;
        Ok(Self {
            ssid: ssid_buf,
            psk: psk_buf,
            security,
        })
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    pub fn psk(&self) -> &[u8] {
        &self.psk
    }

    pub fn security(&self) -> Security {
        self.security
    }
}
