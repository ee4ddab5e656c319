//! Device configuration
//!
//! One owned [`SystemConfig`] replaces the process-wide settings structure of
//! classic firmware. It is mutated in memory by the REST and form paths and
//! only becomes durable when the caller explicitly saves it through a
//! [`ConfigStore`](crate::store::ConfigStore) (batched commit). Most network
//! settings take effect after a reboot.
//!
//! Text fields are `heapless::String<N>`: the capacity is part of the type and
//! an oversized write fails instead of truncating or overrunning.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::error::Overflow;

/// Number of MQTT client stations
pub const MQTT_CLIENTS: usize = 2;

/// Number of DNS servers per interface (main, backup, fallback)
pub const DNS_SERVERS: usize = 3;

/// Fixed-capacity configuration text
pub type Text<const N: usize> = heapless::String<N>;

/// Replace the contents of a fixed-capacity string.
///
/// The destination is left untouched when `value` does not fit.
pub fn assign<const N: usize>(dst: &mut Text<N>, value: &str) -> Result<(), Overflow> {
    if value.len() > N {
        return Err(Overflow { capacity: N });
    }
    dst.clear();
    dst.push_str(value).map_err(|_| Overflow { capacity: N })
}

/// Build a fixed-capacity string from a literal known to fit.
fn text<const N: usize>(value: &str) -> Text<N> {
    let mut t = Text::new();
    let _ = assign(&mut t, value);
    t
}

/// Network interfaces compiled into the product.
///
/// Chosen once at start-up; decides which variables and template tags get
/// registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceSet {
    pub wifi: bool,
    pub ethernet: bool,
    pub gsm: bool,
    pub mqtt: bool,
}

impl Default for InterfaceSet {
    fn default() -> Self {
        Self {
            wifi: true,
            ethernet: false,
            gsm: false,
            mqtt: true,
        }
    }
}

/// Wi-Fi settings (station and access point)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WifiSettings {
    pub enabled: bool,
    /// Run as access point instead of station
    pub ap_mode: bool,
    pub dhcp: bool,

    // Station mode
    pub sta_ssid: Text<32>,
    pub sta_key: Text<64>,
    pub sta_ip: Ipv4Addr,
    pub sta_mask: Ipv4Addr,
    pub sta_gateway: Ipv4Addr,
    pub dns: [Ipv4Addr; DNS_SERVERS],

    // Access point mode
    pub ap_ssid: Text<32>,
    pub ap_key: Text<64>,
    pub ap_ip: Ipv4Addr,
}

impl Default for WifiSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            // Unconfigured devices come up as an access point for first setup
            ap_mode: true,
            dhcp: true,

            sta_ssid: Text::new(),
            sta_key: Text::new(),
            sta_ip: Ipv4Addr::new(192, 168, 1, 150),
            sta_mask: Ipv4Addr::new(255, 255, 255, 0),
            sta_gateway: Ipv4Addr::new(192, 168, 1, 1),
            dns: [
                Ipv4Addr::new(8, 8, 8, 8),
                Ipv4Addr::new(1, 1, 1, 1),
                Ipv4Addr::UNSPECIFIED,
            ],

            // WPA2 needs 8+ characters
            ap_ssid: text("WebGUI-Device"),
            ap_key: text("webgui123"),
            ap_ip: Ipv4Addr::new(192, 168, 150, 1),
        }
    }
}

/// Wired Ethernet settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EthernetSettings {
    pub enabled: bool,
    pub dhcp: bool,
    pub ip: Ipv4Addr,
    pub mask: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub dns: [Ipv4Addr; DNS_SERVERS],
}

impl Default for EthernetSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            dhcp: true,
            ip: Ipv4Addr::new(192, 168, 1, 160),
            mask: Ipv4Addr::new(255, 255, 255, 0),
            gateway: Ipv4Addr::new(192, 168, 1, 1),
            dns: [
                Ipv4Addr::new(8, 8, 8, 8),
                Ipv4Addr::new(1, 1, 1, 1),
                Ipv4Addr::UNSPECIFIED,
            ],
        }
    }
}

/// One MQTT client station
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MqttStation {
    pub enabled: bool,
    pub server: Text<64>,
    pub port: u16,
    pub client_id: Text<32>,
    pub root_topic: Text<64>,
    pub user: Text<32>,
    pub password: Text<32>,
}

impl Default for MqttStation {
    fn default() -> Self {
        Self {
            enabled: false,
            server: text("test.mosquitto.org"),
            port: 1883,
            client_id: text("webgui-device"),
            root_topic: text("webgui"),
            user: Text::new(),
            password: Text::new(),
        }
    }
}

/// SNTP client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SntpSettings {
    pub enabled: bool,
    pub server: Text<64>,
    /// Offset from UTC in hours
    pub timezone: i8,
}

impl Default for SntpSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            server: text("pool.ntp.org"),
            timezone: 2,
        }
    }
}

/// Complete device configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    // System settings
    pub netname: Text<32>,
    pub sysname: Text<32>,
    pub syspass: Text<32>,

    // Firmware update
    pub ota_url: Text<128>,
    pub ota_enabled: bool,
    /// Automatic update check interval in seconds, 0 disables
    pub ota_interval: u32,

    pub leds_enabled: bool,

    /// Pre-shared key for signed messages
    pub message_key: Text<64>,

    pub interfaces: InterfaceSet,
    pub wifi: WifiSettings,
    pub ethernet: EthernetSettings,
    pub mqtt: [MqttStation; MQTT_CLIENTS],
    pub sntp: SntpSettings,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            netname: text("WEBGUIAPP"),
            sysname: text("admin"),
            syspass: text("admin"),

            ota_url: text("https://example.com/firmware/webgui-device.bin"),
            ota_enabled: false,
            ota_interval: 0,

            leds_enabled: true,

            // Empty key: signed messages are rejected until a key is provisioned
            message_key: Text::new(),

            interfaces: InterfaceSet::default(),
            wifi: WifiSettings::default(),
            ethernet: EthernetSettings::default(),
            mqtt: [MqttStation::default(), MqttStation::default()],
            sntp: SntpSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_fits() {
        let mut t: Text<8> = Text::new();
        assert!(assign(&mut t, "12345678").is_ok());
        assert_eq!(t.as_str(), "12345678");
    }

    #[test]
    fn test_assign_overflow_keeps_previous() {
        let mut t: Text<4> = text("abc");
        let err = assign(&mut t, "abcde").unwrap_err();
        assert_eq!(err.capacity, 4);
        assert_eq!(t.as_str(), "abc");
    }

    #[test]
    fn test_defaults_fit_their_fields() {
        let cfg = SystemConfig::default();
        assert_eq!(cfg.netname.as_str(), "WEBGUIAPP");
        assert_eq!(cfg.wifi.ap_key.as_str(), "webgui123");
        assert_eq!(cfg.sntp.server.as_str(), "pool.ntp.org");
        assert!(cfg.ota_url.len() <= 128);
        assert!(cfg.message_key.is_empty());
    }
}
