//! Runtime device status
//!
//! Snapshot of the data sources the web pages display but do not own:
//! interface state and addresses, radio level, heap, firmware identity. The
//! firmware main loop refreshes it; handlers only read it.

use std::net::Ipv4Addr;
use std::time::Instant;

use crate::config::{SystemConfig, DNS_SERVERS, MQTT_CLIENTS};

/// State of one network interface
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceStatus {
    pub up: bool,
    pub ip: Option<Ipv4Addr>,
    pub mask: Option<Ipv4Addr>,
    pub gateway: Option<Ipv4Addr>,
    pub dns: [Option<Ipv4Addr>; DNS_SERVERS],
    pub mac: [u8; 6],
}

impl InterfaceStatus {
    /// MAC formatted as `aa-bb-cc-dd-ee-ff`
    pub fn mac_string(&self) -> String {
        self.mac
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join("-")
    }
}

/// Snapshot of runtime status
#[derive(Debug, Clone)]
pub struct DeviceStatus {
    pub wifi_sta: InterfaceStatus,
    pub wifi_ap: InterfaceStatus,
    pub ethernet: InterfaceStatus,
    pub gsm: InterfaceStatus,
    /// Station signal level in dBm, `None` when not associated
    pub rssi: Option<i8>,
    pub mqtt_connected: [bool; MQTT_CLIENTS],
    pub free_heap: u32,
    pub min_free_heap: u32,
    pub firmware_version: String,
    pub idf_version: String,
    pub build_date: String,
    pub chip_id: [u8; 4],
    pub start_time: Instant,
}

impl Default for DeviceStatus {
    fn default() -> Self {
        Self {
            wifi_sta: InterfaceStatus::default(),
            wifi_ap: InterfaceStatus::default(),
            ethernet: InterfaceStatus::default(),
            gsm: InterfaceStatus::default(),
            rssi: None,
            mqtt_connected: [false; MQTT_CLIENTS],
            free_heap: 0,
            min_free_heap: 0,
            firmware_version: env!("CARGO_PKG_VERSION").to_string(),
            idf_version: String::new(),
            build_date: String::new(),
            chip_id: [0; 4],
            start_time: Instant::now(),
        }
    }
}

impl DeviceStatus {
    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Get formatted uptime string (e.g., "2d 5h 30m")
    pub fn uptime_formatted(&self) -> String {
        format_uptime(self.uptime_secs())
    }
}

pub(crate) fn format_uptime(secs: u64) -> String {
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let mins = (secs % 3600) / 60;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, mins)
    } else if hours > 0 {
        format!("{}h {}m", hours, mins)
    } else {
        format!("{}m", mins)
    }
}

/// Everything a request handler works on: configuration plus status.
///
/// The firmware shares one of these behind `Arc<Mutex<_>>`; variable GET/SET,
/// template rendering and persistence all run with that lock held.
#[derive(Debug, Clone, Default)]
pub struct DeviceState {
    pub config: SystemConfig,
    pub status: DeviceStatus,
}

impl DeviceState {
    pub fn new(config: SystemConfig) -> Self {
        Self {
            config,
            status: DeviceStatus::default(),
        }
    }
}
