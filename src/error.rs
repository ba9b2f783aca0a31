//! Error taxonomy at the supervisor/command-API boundary (spec.md §7).
//!
//! Command-level failures that a caller of `wifi_connect`/`start_scan`
//! etc. needs to match on. Radio-SDK-level failures live in
//! [`crate::radio::RadioError`] and are absorbed by the retry policy or
//! the scan path before they ever reach here (spec.md §7 "Propagation
//! policy").

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SupervisorError {
    /// `connect` without credentials (spec.md §7).
    #[error("no Wi-Fi credentials provisioned")]
    NotProvisioned,
    /// `connect` while already connecting/connected, or a second
    /// `start_scan` while one is outstanding (spec.md §7).
    #[error("operation already in progress")]
    AlreadyInProgress,
}
