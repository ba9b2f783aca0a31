//! ESP-IDF-backed radio adapter.
//!
//! Grounded directly on `rkuris-erik/nextgen/src/wifi.rs`'s `hardware`
//! module: `BlockingWifi<EspWifi<'static>>` behind a `Mutex`, the same
//! `initialize`/`connect_sta`/`scan_networks`/`build_client_config` shape,
//! adapted from "fire-and-forget, update a global snapshot" to "implement
//! [`RadioAdapter`] so the state machine drives it explicitly".
//!
//! Callbacks are registered once in [`EspIdfRadio::init`] and only ever
//! post events — they never call back into this adapter synchronously
//! (spec.md §4.1, §5).

use std::sync::{Arc, Mutex};

use embedded_svc::wifi::{AuthMethod, ClientConfiguration, Configuration};
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::{EspSubscription, EspSystemEventLoop, System};
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi, WifiEvent as EspWifiEvent};

use super::{negate_rssi_magnitude, ApInfo, Pending, RadioAdapter, RadioError, ScanCfg,
    SdkSecurity, SecurityPolicy};
use crate::event::{EventPoster, WifiEvent};
use crate::provision::Security;
use crate::scan::{ScanComplete, ScanOutcome};

fn to_heapless<const N: usize>(value: &str) -> Result<heapless::String<N>, RadioError> {
    let mut result = heapless::String::<N>::new();
    result
        .push_str(value)
        .map_err(|()| RadioError::InvalidArg)?;
    Ok(result)
}

fn sdk_auth_method(security: SdkSecurity) -> AuthMethod {
    match security {
        SdkSecurity::Open => AuthMethod::None,
        SdkSecurity::Wep => AuthMethod::WEP,
        SdkSecurity::WpaWpa2Mixed => AuthMethod::WPAWPA2Personal,
        SdkSecurity::Wpa3Transition => AuthMethod::WPA2WPA3Personal,
    }
}

/// Real radio adapter for ESP32-class targets, wired to `esp-idf-svc`.
pub struct EspIdfRadio {
    wifi: Arc<Mutex<BlockingWifi<EspWifi<'static>>>>,
    sysloop: EspSystemEventLoop,
    cached_mac: Mutex<Option<[u8; 6]>>,
    security_policy: SecurityPolicy,
    poster: EventPoster,
    // Kept alive for as long as the adapter is; dropping it would
    // deregister the join-complete/join-failure callback.
    _wifi_subscription: Mutex<Option<EspSubscription<'static, System>>>,
}

impl EspIdfRadio {
    /// Constructs the adapter around the given modem peripheral. `poster`
    /// is the event queue's producer handle — the only thing the
    /// callback-registration step in [`Self::init`] is allowed to touch
    /// (spec.md §5).
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
        security_policy: SecurityPolicy,
        poster: EventPoster,
    ) -> Result<Self, RadioError> {
        let wifi = EspWifi::new(modem, sysloop.clone(), nvs).map_err(|e| RadioError::Fatal(e.code()))?;
        let blocking =
            BlockingWifi::wrap(wifi, sysloop.clone()).map_err(|e| RadioError::Fatal(e.code()))?;
        Ok(Self {
            wifi: Arc::new(Mutex::new(blocking)),
            sysloop,
            cached_mac: Mutex::new(None),
            security_policy,
            poster,
            _wifi_subscription: Mutex::new(None),
        })
    }

    /// Hands out the same `BlockingWifi` handle this adapter drives, so a
    /// [`crate::netstack::espidf::EspIdfNetStack`] can read netif state off
    /// the one `EspWifi` instance rather than a second, divergent copy.
    pub fn shared_wifi(&self) -> Arc<Mutex<BlockingWifi<EspWifi<'static>>>> {
        self.wifi.clone()
    }

    fn build_client_config(
        &self,
        ssid: &str,
        security: Security,
        psk: &[u8],
    ) -> Result<ClientConfiguration, RadioError> {
        let sdk_security = self.security_policy.resolve(security)?;
        let ssid_value = to_heapless::<32>(ssid)?;
        let mut password_value: heapless::String<64> = heapless::String::new();
        let psk_str = std::str::from_utf8(psk).map_err(|_| RadioError::InvalidArg)?;
        password_value
            .push_str(psk_str)
            .map_err(|()| RadioError::InvalidArg)?;
        Ok(ClientConfiguration {
            ssid: ssid_value,
            bssid: None,
            auth_method: sdk_auth_method(sdk_security),
            password: password_value,
            ..Default::default()
        })
    }
}

impl RadioAdapter for EspIdfRadio {
    fn init(&mut self) -> Result<(), RadioError> {
        let mut cached = self.cached_mac.lock().unwrap();
        if cached.is_some() {
            return Err(RadioError::AlreadyInitialized);
        }
        let wifi = self.wifi.lock().unwrap();
        let mac = wifi
            .wifi()
            .sta_netif()
            .get_mac()
            .map_err(|e| RadioError::Fatal(e.code()))?;
        *cached = Some(mac);
        drop(wifi);

        // Join-complete/join-failure arrive as `WifiEvent::StaConnected`/
        // `StaDisconnected` on the system event loop (grounded on
        // `esp32-balboa-spa`'s `do_sta_connect`, which subscribes the same
        // way). The handler only translates and posts — it never touches
        // `self.wifi` or calls back into this adapter, matching spec.md
        // §4.1/§5.
        let poster = self.poster.clone();
        let subscription = self
            .sysloop
            .subscribe(move |event: &EspWifiEvent| match event {
                EspWifiEvent::StaConnected => {
                    let _ = poster.post(WifiEvent::StationConnect);
                }
                EspWifiEvent::StaDisconnected => {
                    let _ = poster.post(WifiEvent::StationJoinFailed(0));
                }
                _ => {}
            })
            .map_err(|e| RadioError::Fatal(e.code()))?;
        *self._wifi_subscription.lock().unwrap() = Some(subscription);

        Ok(())
    }

    fn connect(
        &mut self,
        ssid: &str,
        security: Security,
        psk: &[u8],
    ) -> Result<Pending<()>, RadioError> {
        let config = self.build_client_config(ssid, security, psk)?;
        let mut wifi = self.wifi.lock().unwrap();
        wifi.set_configuration(&Configuration::Client(config))
            .map_err(|e| RadioError::Transient(e.code()))?;
        if !matches!(wifi.is_started(), Ok(true)) {
            wifi.start().map_err(|e| RadioError::Transient(e.code()))?;
        }
        wifi.connect().map_err(|e| RadioError::Transient(e.code()))?;
        // `connect()` on the real SDK is asynchronous; join-complete /
        // join-failure arrive later via the event-loop subscription.
        Ok(Pending::Pending)
    }

    fn disconnect(&mut self) -> Result<(), RadioError> {
        let mut wifi = self.wifi.lock().unwrap();
        wifi.disconnect().map_err(|e| RadioError::Transient(e.code()))
    }

    fn start_scan(
        &mut self,
        ssid_filter: Option<&str>,
        _cfg: ScanCfg,
        complete: &ScanComplete,
    ) -> Result<Pending<()>, RadioError> {
        let mut wifi = self.wifi.lock().unwrap();
        if !matches!(wifi.is_started(), Ok(true)) {
            wifi.start().map_err(|e| RadioError::Transient(e.code()))?;
        }
        // The blocking `scan()` call stands in for the SDK's async scan
        // API on this target; its result is signalled on the caller's
        // scan-complete semaphore rather than returned synchronously, so
        // the caller still follows the Pending contract spec.md §4.1
        // describes.
        match wifi.scan() {
            Ok(results) => {
                let matched: Vec<ApInfo> = results
                    .into_iter()
                    .filter(|ap| match ssid_filter {
                        None => true,
                        Some(f) => ap.ssid.as_str().starts_with(f),
                    })
                    .map(|ap| ApInfo {
                        ssid: ap.ssid,
                        bssid: ap.bssid,
                        channel: ap.channel,
                        security: match ap.auth_method {
                            AuthMethod::None => Security::Open,
                            AuthMethod::WEP => Security::Wep,
                            AuthMethod::WPA => Security::Wpa,
                            AuthMethod::WPA2Personal | AuthMethod::WPAWPA2Personal => {
                                Security::Wpa2
                            }
                            AuthMethod::WPA3Personal | AuthMethod::WPA2WPA3Personal => {
                                Security::Wpa3
                            }
                            _ => Security::Unspecified,
                        },
                        rssi_dbm: negate_rssi_magnitude(i16::from(ap.rssi)),
                    })
                    .collect();
                complete.signal(ScanOutcome::Results(matched));
            }
            Err(_) => complete.signal(ScanOutcome::Failed),
        }
        Ok(Pending::Pending)
    }

    fn get_rssi(&self) -> Result<i16, RadioError> {
        let mut wifi = self.wifi.lock().unwrap();
        let info = wifi
            .wifi_mut()
            .driver_mut()
            .get_ap_info()
            .map_err(|e| RadioError::Transient(e.code()))?;
        // The driver reports an unsigned signal magnitude; spec.md §4.3's
        // negation-at-the-boundary convention applies here same as the
        // scan path above.
        Ok(negate_rssi_magnitude(i16::from(info.rssi)))
    }

    fn get_mac(&self) -> Result<[u8; 6], RadioError> {
        self.cached_mac
            .lock()
            .unwrap()
            .ok_or(RadioError::Fatal(0))
    }
}
