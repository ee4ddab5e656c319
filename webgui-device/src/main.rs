//! Web management firmware for ESP32
//!
//! Brings up Wi-Fi (station with access point fallback), loads the device
//! configuration from NVS and serves the settings portal, the variable REST
//! API and the signed SysComm endpoint.
//!
//! ## Production Features
//! - NVS-based configuration persistence
//! - WiFi auto-reconnection
//! - Watchdog timer for automatic recovery
//! - Panic handler with automatic restart

use anyhow::anyhow;
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::{
        prelude::*,
        task::watchdog::{TWDTConfig, TWDTDriver},
    },
    netif::EspNetif,
    nvs::EspDefaultNvsPartition,
    sys::esp,
    wifi::{AccessPointConfiguration, AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi},
};
use log::{error, info, warn};
use std::ffi::{c_char, CStr};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use webgui_rs::store::load_or_default;
use webgui_rs::syscomm::{SysComm, SysCommConfig};
use webgui_rs::template::{builtin_tags, EmbeddedFs, TemplateResolver};
use webgui_rs::vars::{builtin_variables, VariableRegistry};
use webgui_rs::{DeviceState, DeviceStatus, InterfaceStatus, SystemConfig};

mod nvs_store;
mod pages;
mod web;

use nvs_store::NvsStore;
use web::{start_web_server, WebState};

/// Global flag for WiFi connection status (used by reconnection logic)
static WIFI_CONNECTED: AtomicBool = AtomicBool::new(false);

/// WiFi reconnection interval in seconds
const WIFI_RECONNECT_INTERVAL_SECS: u64 = 10;

/// Watchdog timeout in seconds
const WATCHDOG_TIMEOUT_SECS: u64 = 30;

/// Main loop tick
const LOOP_INTERVAL_MS: u64 = 100;

/// Check WiFi every 5 seconds (50 * 100ms)
const WIFI_CHECK_INTERVAL: u32 = 50;

/// Refresh the status snapshot every second (10 * 100ms)
const STATUS_REFRESH_INTERVAL: u32 = 10;

/// How the radio ended up after start-up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkMode {
    Station,
    AccessPoint,
}

fn main() -> anyhow::Result<()> {
    // Initialize ESP-IDF
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    // Set up panic handler for automatic restart
    std::panic::set_hook(Box::new(|panic_info| {
        error!("PANIC: {}", panic_info);
        error!("Restarting in 3 seconds...");
        thread::sleep(Duration::from_secs(3));
        unsafe {
            esp_idf_svc::sys::esp_restart();
        }
    }));

    info!("webgui-device {} starting", env!("CARGO_PKG_VERSION"));

    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    // Initialize Task Watchdog Timer (TWDT)
    info!("Initializing watchdog timer...");
    let twdt_config = TWDTConfig {
        duration: Duration::from_secs(WATCHDOG_TIMEOUT_SECS),
        panic_on_trigger: true,
        subscribed_idle_tasks: enumset::EnumSet::empty(),
    };
    let mut twdt_driver = TWDTDriver::new(peripherals.twdt, &twdt_config)?;
    let mut watchdog = twdt_driver.watch_current_task()?;
    info!("Watchdog timer initialized with {}s timeout", WATCHDOG_TIMEOUT_SECS);

    // Load configuration from NVS (falls back to defaults if not configured)
    let mut store = NvsStore::new(nvs.clone())?;
    let config = load_or_default(&mut store);
    info!("Configuration loaded:");
    info!("  Device name: {}", config.netname);
    info!("  Wi-Fi: {}", if config.wifi.ap_mode { "access point" } else { "station" });
    info!("  MQTT stations enabled: {}", config.mqtt.iter().filter(|m| m.enabled).count());

    // Initialize WiFi
    info!("Initializing WiFi...");
    let mut wifi = BlockingWifi::wrap(
        EspWifi::new(peripherals.modem, sys_loop.clone(), Some(nvs))?,
        sys_loop,
    )?;
    let mode = start_wifi(&mut wifi, &config)?;

    let mut status = DeviceStatus::default();
    firmware_identity(&mut status);
    refresh_status(&mut status, &wifi);
    let portal_ip = match mode {
        LinkMode::Station => status.wifi_sta.ip,
        LinkMode::AccessPoint => status.wifi_ap.ip,
    };

    // Shared portal state
    let fs: Arc<dyn EmbeddedFs> = Arc::new(pages::embedded_pages());
    let registry = VariableRegistry::new(builtin_variables(&config.interfaces));
    let resolver = TemplateResolver::new(builtin_tags(&config.interfaces)).with_fs(Arc::clone(&fs));
    let syscomm = SysComm::new(SysCommConfig::new(config.message_key.as_bytes()));
    info!(
        "Portal ready: {} variables, {} template tags",
        registry.len(),
        resolver.tags().len()
    );

    let mut device = DeviceState::new(config);
    device.status = status;

    let web_state = Arc::new(WebState {
        device: Mutex::new(device),
        registry,
        resolver,
        syscomm: Mutex::new(syscomm),
        store: Mutex::new(store),
        fs,
    });

    // Start web server for configuration portal
    let _web_server = match start_web_server(Arc::clone(&web_state)) {
        Ok(server) => {
            match portal_ip {
                Some(ip) => info!("Web portal available at http://{}/", ip),
                None => info!("Web portal started"),
            }
            Some(server)
        }
        Err(e) => {
            error!("Failed to start web server: {}", e);
            None
        }
    };

    let mut wifi_check_counter: u32 = 0;
    let mut status_counter: u32 = 0;

    loop {
        // Feed the watchdog to prevent reset
        watchdog.feed()?;

        // Periodically check WiFi connection and attempt reconnection if needed
        if mode == LinkMode::Station {
            wifi_check_counter += 1;
            if wifi_check_counter >= WIFI_CHECK_INTERVAL {
                wifi_check_counter = 0;
                check_wifi_connection(&mut wifi);
            }
        }

        status_counter += 1;
        if status_counter >= STATUS_REFRESH_INTERVAL {
            status_counter = 0;
            if let Ok(mut device) = web_state.device.lock() {
                refresh_status(&mut device.status, &wifi);
            }
        }

        thread::sleep(Duration::from_millis(LOOP_INTERVAL_MS));
    }
}

/// Bring the radio up as configured.
///
/// Station mode falls back to the access point when no SSID is configured or
/// the network cannot be joined, so the portal stays reachable.
fn start_wifi(wifi: &mut BlockingWifi<EspWifi<'static>>, config: &SystemConfig) -> anyhow::Result<LinkMode> {
    let wants_station = config.wifi.enabled && !config.wifi.ap_mode && !config.wifi.sta_ssid.is_empty();
    if !config.wifi.enabled {
        warn!("Wi-Fi disabled in configuration, starting access point for the portal");
    }
    if !config.wifi.dhcp {
        warn!("Static addressing is not applied by this firmware, using DHCP");
    }

    if wants_station {
        match connect_station(wifi, config.wifi.sta_ssid.as_str(), config.wifi.sta_key.as_str(), 3) {
            Ok(()) => {
                WIFI_CONNECTED.store(true, Ordering::SeqCst);
                return Ok(LinkMode::Station);
            }
            Err(e) => {
                error!("WiFi connection failed after retries: {}", e);
                let _ = wifi.stop();
            }
        }
    }

    start_access_point(wifi, config.wifi.ap_ssid.as_str(), config.wifi.ap_key.as_str())?;
    Ok(LinkMode::AccessPoint)
}

/// Join a network as station, with retries
fn connect_station(
    wifi: &mut BlockingWifi<EspWifi<'static>>,
    ssid: &str,
    password: &str,
    max_retries: u32,
) -> anyhow::Result<()> {
    let wifi_configuration = Configuration::Client(ClientConfiguration {
        ssid: ssid.try_into().map_err(|_| anyhow!("SSID '{}' too long", ssid))?,
        bssid: None,
        auth_method: if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        },
        password: password.try_into().map_err(|_| anyhow!("Wi-Fi key too long"))?,
        channel: None,
        ..Default::default()
    });

    wifi.set_configuration(&wifi_configuration)?;
    wifi.start()?;

    // Try to connect with retries
    let mut last_error = None;
    for attempt in 1..=max_retries {
        info!("WiFi connection attempt {}/{} to '{}'...", attempt, max_retries, ssid);

        match wifi.connect() {
            Ok(_) => {
                info!("WiFi connected, waiting for DHCP...");
                match wifi.wait_netif_up() {
                    Ok(_) => {
                        info!("WiFi fully connected!");
                        return Ok(());
                    }
                    Err(e) => {
                        warn!("DHCP failed: {}", e);
                        last_error = Some(e.into());
                    }
                }
            }
            Err(e) => {
                warn!("WiFi connection failed: {}", e);
                last_error = Some(e.into());
            }
        }

        if attempt < max_retries {
            info!("Retrying in {} seconds...", WIFI_RECONNECT_INTERVAL_SECS);
            thread::sleep(Duration::from_secs(WIFI_RECONNECT_INTERVAL_SECS));
            // Disconnect before retry
            let _ = wifi.disconnect();
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow!("WiFi connection failed")))
}

/// Run the soft access point
fn start_access_point(wifi: &mut BlockingWifi<EspWifi<'static>>, ssid: &str, key: &str) -> anyhow::Result<()> {
    let ap_configuration = Configuration::AccessPoint(AccessPointConfiguration {
        ssid: ssid.try_into().map_err(|_| anyhow!("AP SSID '{}' too long", ssid))?,
        password: key.try_into().map_err(|_| anyhow!("AP key too long"))?,
        auth_method: if key.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        },
        channel: 1,
        ..Default::default()
    });

    wifi.set_configuration(&ap_configuration)?;
    wifi.start()?;
    wifi.wait_netif_up()?;
    info!("Access point '{}' started", ssid);
    Ok(())
}

/// Check WiFi connection and attempt reconnection if needed
fn check_wifi_connection(wifi: &mut BlockingWifi<EspWifi<'static>>) -> bool {
    if wifi.is_connected().unwrap_or(false) {
        if !WIFI_CONNECTED.load(Ordering::SeqCst) {
            info!("WiFi reconnected!");
            WIFI_CONNECTED.store(true, Ordering::SeqCst);
        }
        return true;
    }

    // WiFi disconnected
    if WIFI_CONNECTED.load(Ordering::SeqCst) {
        warn!("WiFi connection lost!");
        WIFI_CONNECTED.store(false, Ordering::SeqCst);
    }

    // Attempt reconnection
    info!("Attempting WiFi reconnection...");
    match wifi.connect() {
        Ok(_) => match wifi.wait_netif_up() {
            Ok(_) => {
                info!("WiFi reconnected successfully!");
                WIFI_CONNECTED.store(true, Ordering::SeqCst);
                true
            }
            Err(e) => {
                warn!("WiFi reconnection - DHCP failed: {}", e);
                false
            }
        },
        Err(e) => {
            warn!("WiFi reconnection failed: {}", e);
            false
        }
    }
}

fn interface_status(netif: &EspNetif) -> InterfaceStatus {
    let up = netif.is_up().unwrap_or(false);
    let mut iface = InterfaceStatus {
        up,
        mac: netif.get_mac().unwrap_or_default(),
        ..Default::default()
    };
    if up {
        if let Ok(info) = netif.get_ip_info() {
            iface.ip = Some(info.ip);
            iface.mask = Some(Ipv4Addr::from(info.subnet.mask));
            iface.gateway = Some(info.subnet.gateway);
            iface.dns[0] = info.dns;
            iface.dns[1] = info.secondary_dns;
        }
    }
    iface
}

/// Update interface, radio and heap figures
fn refresh_status(status: &mut DeviceStatus, wifi: &BlockingWifi<EspWifi<'static>>) {
    status.wifi_sta = interface_status(wifi.wifi().sta_netif());
    status.wifi_ap = interface_status(wifi.wifi().ap_netif());
    status.rssi = if status.wifi_sta.up { station_rssi() } else { None };

    // SAFETY: plain reads of allocator statistics.
    unsafe {
        status.free_heap = esp_idf_svc::sys::esp_get_free_heap_size();
        status.min_free_heap = esp_idf_svc::sys::esp_get_minimum_free_heap_size();
    }
}

fn station_rssi() -> Option<i8> {
    // SAFETY: the record is plain data and is filled by the driver on success.
    unsafe {
        let mut record: esp_idf_svc::sys::wifi_ap_record_t = std::mem::zeroed();
        esp!(esp_idf_svc::sys::esp_wifi_sta_get_ap_info(&mut record)).ok()?;
        Some(record.rssi)
    }
}

/// Read a NUL-terminated string field of an IDF descriptor
fn c_field(raw: &[c_char]) -> String {
    // SAFETY: IDF descriptor strings are NUL-terminated within their array.
    unsafe { CStr::from_ptr(raw.as_ptr()) }.to_string_lossy().into_owned()
}

/// Firmware, IDF and chip identity; fixed for the life of the image
fn firmware_identity(status: &mut DeviceStatus) {
    status.firmware_version = env!("CARGO_PKG_VERSION").to_string();

    // SAFETY: returns a pointer to the static application descriptor.
    let desc = unsafe { &*esp_idf_svc::sys::esp_app_get_description() };
    status.idf_version = c_field(&desc.idf_ver);
    status.build_date = format!("{} {}", c_field(&desc.date), c_field(&desc.time));

    let mut mac = [0u8; 6];
    // SAFETY: the buffer holds the six bytes the call writes.
    match esp!(unsafe { esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr()) }) {
        Ok(()) => status.chip_id.copy_from_slice(&mac[2..]),
        Err(e) => warn!("Failed to read base MAC: {}", e),
    }
    info!("Firmware {} on IDF {}", status.firmware_version, status.idf_version);
}
