//! Radio adapter (C4, spec.md §4.1): a thin, testable facade over the
//! vendor SDK.
//!
//! Grounded on `rkuris-erik/nextgen/src/wifi.rs`'s `hardware` module split
//! — a real `esp-idf-svc`-backed implementation behind
//! `#[cfg(target_os = "espidf")]`, and a host-testable stand-in everywhere
//! else. Here the split is expressed as a trait ([`RadioAdapter`]) with two
//! implementations ([`espidf::EspIdfRadio`], [`mock::MockRadio`]) rather
//! than a bare module swap, so the state machine can be exercised against
//! either without `cfg` gates leaking into [`crate::statemachine`].

#[cfg(feature = "espidf")]
pub mod espidf;
pub mod mock;

use crate::provision::Security;
use crate::scan::ScanComplete;

/// Taxonomy of radio-SDK-facing failures (spec.md §7), collapsed from the
/// vendor's raw error codes into `Transient` (retry) or `Fatal` (surface
/// and idle), per the same split
/// `examples/other_examples/.../sjm42-esp32multical21__src-radio.rs`'s
/// `Cc1101RadioError` draws between driver-specific and SDK-level causes.
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum RadioError {
    /// `init()` called a second time (spec.md §4.1: must be idempotent).
    #[error("radio adapter already initialized")]
    AlreadyInitialized,
    /// Security enum could not be mapped to a radio-SDK auth mode; no
    /// callback will fire for this attempt (spec.md §4.1).
    #[error("invalid or unmapped security setting")]
    InvalidArg,
    /// Recoverable failure from the underlying SDK; the raw code is
    /// preserved for logging (spec.md §9 supplement: log join-failure
    /// reason codes, not just counts).
    #[error("transient radio error (code {0})")]
    Transient(i32),
    /// Unrecoverable failure from the underlying SDK.
    #[error("fatal radio error (code {0})")]
    Fatal(i32),
}

/// A result from the vendor SDK's asynchronous operations: either it
/// completed synchronously, or a callback will follow (spec.md §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pending<T> {
    Ok(T),
    Pending,
}

/// Observed access point (spec.md §3). `ssid` is carried here (not in
/// the spec's bare BSSID/channel/security/RSSI tuple) because spec.md §6
/// names it as the first field of the scan-result callback and the
/// bounded-prefix filter in [`crate::scan::ScanJob`] matches against it.
#[derive(Debug, Clone, PartialEq)]
pub struct ApInfo {
    pub ssid: heapless::String<{ crate::provision::MAX_SSID_LEN }>,
    pub bssid: [u8; 6],
    pub channel: u8,
    pub security: Security,
    /// Stored as a negative signed dBm value. The radio SDK reports an
    /// unsigned magnitude; negation happens once, at the adapter boundary
    /// (spec.md §4.3 "RSSI sign convention").
    pub rssi_dbm: i16,
}

/// Advanced scan parameters applied while associated (spec.md §4.3 `Scan`
/// row: "active 15 ms, passive 20 ms, RSSI threshold −40 dBm, periodicity
/// 10 s when associated; default scan when not").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanCfg {
    Default,
    Advanced {
        active_dwell_ms: u16,
        passive_dwell_ms: u16,
        rssi_threshold_dbm: i16,
        periodicity_s: u16,
    },
}

impl ScanCfg {
    /// The advanced parameters spec.md §4.3 names literally, used
    /// whenever the station is already associated.
    pub const ASSOCIATED: Self = Self::Advanced {
        active_dwell_ms: 15,
        passive_dwell_ms: 20,
        rssi_threshold_dbm: -40,
        periodicity_s: 10,
    };
}

/// Policy for the WPA/WPA2/WPA3 → radio-SDK security mapping (spec.md §9
/// open question: "implementers should expose the mapping as a
/// configuration policy rather than hard-coding it").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecurityPolicy {
    /// `Wpa`/`Wpa2` → `WpaWpa2Mixed`; `Wpa3` falls back to
    /// `WpaWpa2Mixed` too. Matches `rkuris-erik/nextgen/src/wifi.rs`'s
    /// `build_client_config`, which never compiles in WPA3 transition.
    #[default]
    Wpa3TransitionDisabled,
    /// `Wpa3` maps to a WPA3-transition mode when the target SDK supports
    /// it; all other mappings are unchanged.
    Wpa3TransitionEnabled,
}

/// The radio-SDK-side security modes the adapter actually configures.
/// Kept distinct from [`Security`] so the mapping in
/// [`SecurityPolicy::resolve`] is total and explicit rather than a
/// reused enum with an implicit identity mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdkSecurity {
    Open,
    Wep,
    WpaWpa2Mixed,
    Wpa3Transition,
}

impl SecurityPolicy {
    /// Fixed mapping per spec.md §4.1, parameterized by policy for the
    /// WPA3 open question.
    pub fn resolve(self, security: Security) -> Result<SdkSecurity, RadioError> {
        match security {
            Security::Open => Ok(SdkSecurity::Open),
            Security::Wep => Ok(SdkSecurity::Wep),
            Security::Wpa | Security::Wpa2 => Ok(SdkSecurity::WpaWpa2Mixed),
            Security::Wpa3 => Ok(match self {
                Self::Wpa3TransitionEnabled => SdkSecurity::Wpa3Transition,
                Self::Wpa3TransitionDisabled => SdkSecurity::WpaWpa2Mixed,
            }),
            Security::Unspecified => Err(RadioError::InvalidArg),
        }
    }
}

/// RSSI sign convention (spec.md §4.3): the radio SDK hands back an
/// unsigned signal magnitude; the adapter boundary negates it exactly
/// once, into the signed dBm convention the rest of the crate uses.
pub fn negate_rssi_magnitude(magnitude: i16) -> i16 {
    -magnitude
}

/// Thin, testable facade over the vendor SDK (spec.md §4.1). Callbacks
/// registered during `init()` must translate into queue posts only — they
/// must never call back into the adapter synchronously (spec.md §4.1,
/// §5).
pub trait RadioAdapter {
    /// Brings up the radio, reads and caches the station MAC. Idempotent:
    /// a second call returns `AlreadyInitialized`.
    fn init(&mut self) -> Result<(), RadioError>;

    /// Starts an asynchronous association. `Pending` means a join-complete
    /// or join-failure event will follow via the event queue.
    fn connect(
        &mut self,
        ssid: &str,
        security: Security,
        psk: &[u8],
    ) -> Result<Pending<()>, RadioError>;

    fn disconnect(&mut self) -> Result<(), RadioError>;

    /// Starts an asynchronous scan. Completion is signalled on `complete`
    /// (C3, spec.md §4.3, §5) — never posted to the main event queue.
    fn start_scan(
        &mut self,
        ssid_filter: Option<&str>,
        cfg: ScanCfg,
        complete: &ScanComplete,
    ) -> Result<Pending<()>, RadioError>;

    fn get_rssi(&self) -> Result<i16, RadioError>;

    /// Cached station MAC, populated during `init()`.
    fn get_mac(&self) -> Result<[u8; 6], RadioError>;
}
