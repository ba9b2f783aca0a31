//! Firmware entry point: wires the library onto real ESP-IDF hardware.
//!
//! Boot sequence grounded on `rkuris-erik/src/main.rs`'s `main`: call
//! `sys::link_patches()` and `EspLogger::initialize_default()` first,
//! `set_target_level` so only this crate's own logs default to `Info`,
//! then `Peripherals::take()` / `EspSystemEventLoop::take()` /
//! `EspDefaultNvsPartition::take()` before touching the radio.

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::prelude::Peripherals;
use esp_idf_svc::log::{set_target_level, EspLogger};
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::sys;
use log::{info, warn};

use wifi_supervisor::event::EventQueue;
use wifi_supervisor::netstack::espidf::EspIdfNetStack;
use wifi_supervisor::radio::espidf::EspIdfRadio;
use wifi_supervisor::{Security, SecurityPolicy, Supervisor, Upcall, WifiProvision};

/// Credentials for the station this firmware joins. Set via
/// `cfg.toml`/`build.rs` environment injection the same way the
/// esp-rs-template ecosystem wires `env!("WIFI_SSID")` into firmware
/// binaries — there is no file or wire format owned by the core itself
/// (spec.md §6), only this binary's own bring-up.
const WIFI_SSID: &str = env!("WIFI_SSID");
const WIFI_PASS: &str = env!("WIFI_PASS");

fn main() -> anyhow::Result<()> {
    sys::link_patches();
    EspLogger::initialize_default();
    set_target_level("*", log::LevelFilter::Warn)?;
    set_target_level("wifi_supervisor", log::LevelFilter::Info)?;

    info!("Starting up");

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    info!("Bringing up the radio adapter");
    let (poster, queue) = EventQueue::bounded(wifi_supervisor::event::DEFAULT_QUEUE_DEPTH);
    let radio = EspIdfRadio::new(
        peripherals.modem,
        sysloop.clone(),
        Some(nvs),
        SecurityPolicy::default(),
        poster.clone(),
    )?;
    let netstack = EspIdfNetStack::new(radio.shared_wifi());

    let mut sup = Supervisor::with_queue(
        radio,
        netstack,
        poster,
        queue,
        SecurityPolicy::default(),
        |upcall| match upcall {
            Upcall::WifiStarted => info!("wifi started"),
            Upcall::WifiConnected { ap_mac } => info!("wifi connected, ap_mac={ap_mac:02x?}"),
            Upcall::Ipv4Acquired { addr } => info!("ipv4 acquired: {addr:?}"),
            Upcall::Ipv6Acquired => info!("ipv6 acquired"),
            Upcall::IpLost => warn!("ip lost"),
            Upcall::Ipv6Lost => warn!("ipv6 lost"),
            Upcall::ScanResult(ap) => info!("scan result: {} ({:?})", ap.ssid, ap.security),
            Upcall::ScanDone => info!("scan done"),
        },
    )?;

    sup.wifi_start();
    sup.set_provision(WifiProvision::new(WIFI_SSID, WIFI_PASS.as_bytes(), Security::Wpa2)?);
    sup.wifi_connect()?;

    info!("Entering the event loop");
    sup.run();

    Ok(())
}
