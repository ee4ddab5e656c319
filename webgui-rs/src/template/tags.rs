//! Built-in display tags over [`DeviceState`]
//!
//! These render values for the settings and status pages. Unlike variables
//! they are output only: checkboxes render as `checked`, secrets as masks and
//! live interface data falls back to the configured values when the interface
//! is down.

use std::net::Ipv4Addr;

use chrono::Utc;

use crate::config::{InterfaceSet, MQTT_CLIENTS};
use crate::status::{DeviceState, InterfaceStatus};

use super::TemplateTag;

type Tag = TemplateTag<DeviceState>;

const SHORT_MASK: &str = "******";
const LONG_MASK: &str = "********";

fn checkbox(checked: bool) -> String {
    (if checked { "checked" } else { " " }).to_string()
}

fn link_state(up: bool) -> String {
    (if up { "CONNECTED" } else { "DISCONNECTED" }).to_string()
}

fn addr(a: Option<Ipv4Addr>) -> String {
    a.map_or_else(|| "-".to_string(), |a| a.to_string())
}

/// Live address when the interface is up, configured address otherwise
fn live_or_configured(iface: &InterfaceStatus, live: Option<Ipv4Addr>, configured: Ipv4Addr) -> String {
    if iface.up {
        addr(live)
    } else {
        configured.to_string()
    }
}

/// DNS server `i` of an interface, `0.0.0.0` while it is down
fn dns(iface: &InterfaceStatus, i: usize) -> String {
    if iface.up {
        addr(iface.dns[i])
    } else {
        Ipv4Addr::UNSPECIFIED.to_string()
    }
}

fn tag<F>(name: &'static str, render: F) -> Tag
where
    F: Fn(&DeviceState) -> String + Send + Sync + 'static,
{
    TemplateTag::new(name, move |s: &DeviceState, _| render(s))
}

/// Display tags for the compiled-in interfaces
pub fn builtin_tags(interfaces: &InterfaceSet) -> Vec<Tag> {
    let mut tags = system_tags();
    if interfaces.wifi {
        tags.extend(wifi_tags());
    }
    if interfaces.ethernet {
        tags.extend(ethernet_tags());
    }
    if interfaces.mqtt {
        for station in 0..MQTT_CLIENTS {
            tags.extend(mqtt_tags(station));
        }
    }
    tags.extend(sntp_and_diagnostic_tags());
    tags
}

fn system_tags() -> Vec<Tag> {
    vec![
        tag("dname", |s| s.config.netname.to_string()),
        tag("login", |s| s.config.sysname.to_string()),
        tag("pass", |_| SHORT_MASK.to_string()),
        tag("ota", |s| checkbox(s.config.ota_enabled)),
        tag("fver", |s| s.status.firmware_version.clone()),
        tag("idfver", |s| s.status.idf_version.clone()),
        tag("builddate", |s| s.status.build_date.clone()),
        tag("serial", |s| hex::encode_upper(s.status.chip_id)),
        tag("serial10", |s| format!("{:010}", u32::from_be_bytes(s.status.chip_id))),
        tag("otaurl", |s| s.config.ota_url.to_string()),
        tag("time", |_| Utc::now().timestamp().to_string()),
        tag("uptime", |s| s.status.uptime_formatted()),
        tag("tshift", |s| (i32::from(s.config.sntp.timezone) * 3600).to_string()),
        tag("tz", |s| s.config.sntp.timezone.to_string()),
        tag("wlev", |s| match s.status.rssi {
            Some(rssi) => format!("{}dBm", rssi),
            None => "--".to_string(),
        }),
    ]
}

fn wifi_tags() -> Vec<Tag> {
    vec![
        tag("wfen", |s| checkbox(s.config.wifi.enabled)),
        tag("wfstat", |s| {
            let iface = if s.config.wifi.ap_mode {
                &s.status.wifi_ap
            } else {
                &s.status.wifi_sta
            };
            link_state(iface.up)
        }),
        tag("cln", |s| checkbox(!s.config.wifi.ap_mode)),
        tag("apn", |s| checkbox(s.config.wifi.ap_mode)),
        tag("ssidap", |s| s.config.wifi.ap_ssid.to_string()),
        tag("wkeyap", |_| LONG_MASK.to_string()),
        tag("ipap", |s| live_or_configured(&s.status.wifi_ap, s.status.wifi_ap.ip, s.config.wifi.ap_ip)),
        tag("ssid", |s| s.config.wifi.sta_ssid.to_string()),
        tag("wkey", |_| LONG_MASK.to_string()),
        tag("cbdh", |s| checkbox(s.config.wifi.dhcp)),
        tag("ip", |s| live_or_configured(&s.status.wifi_sta, s.status.wifi_sta.ip, s.config.wifi.sta_ip)),
        tag("msk", |s| live_or_configured(&s.status.wifi_sta, s.status.wifi_sta.mask, s.config.wifi.sta_mask)),
        tag("gate", |s| {
            live_or_configured(&s.status.wifi_sta, s.status.wifi_sta.gateway, s.config.wifi.sta_gateway)
        }),
        tag("dns", |s| dns(&s.status.wifi_sta, 0)),
        tag("dns2", |s| dns(&s.status.wifi_sta, 1)),
        tag("dns3", |s| dns(&s.status.wifi_sta, 2)),
        tag("macadr", |s| s.status.wifi_sta.mac_string()),
        tag("apmacadr", |s| s.status.wifi_ap.mac_string()),
    ]
}

fn ethernet_tags() -> Vec<Tag> {
    vec![
        tag("ethen", |s| checkbox(s.config.ethernet.enabled)),
        tag("ecbdh", |s| checkbox(s.config.ethernet.dhcp)),
        tag("ethstat", |s| link_state(s.status.ethernet.up)),
        tag("eip", |s| live_or_configured(&s.status.ethernet, s.status.ethernet.ip, s.config.ethernet.ip)),
        tag("emsk", |s| live_or_configured(&s.status.ethernet, s.status.ethernet.mask, s.config.ethernet.mask)),
        tag("egate", |s| {
            live_or_configured(&s.status.ethernet, s.status.ethernet.gateway, s.config.ethernet.gateway)
        }),
        tag("edns", |s| dns(&s.status.ethernet, 0)),
        tag("bkedns", |s| dns(&s.status.ethernet, 1)),
        tag("fledns", |s| dns(&s.status.ethernet, 2)),
        tag("emacadr", |s| s.status.ethernet.mac_string()),
    ]
}

fn mqtt_tags(i: usize) -> Vec<Tag> {
    let n = i + 1;
    let station = move |name: &str| format!("{}{}", name, n);
    vec![
        TemplateTag::new(station("mqtten"), move |s: &DeviceState, _| checkbox(s.config.mqtt[i].enabled)),
        TemplateTag::new(station("ipcld"), move |s: &DeviceState, _| s.config.mqtt[i].server.to_string()),
        TemplateTag::new(station("mport"), move |s: &DeviceState, _| s.config.mqtt[i].port.to_string()),
        TemplateTag::new(station("idcld"), move |s: &DeviceState, _| s.config.mqtt[i].client_id.to_string()),
        TemplateTag::new(station("topic"), move |s: &DeviceState, _| s.config.mqtt[i].root_topic.to_string()),
        TemplateTag::new(station("clname"), move |s: &DeviceState, _| s.config.mqtt[i].user.to_string()),
        TemplateTag::new(station("clpass"), |_: &DeviceState, _| SHORT_MASK.to_string()),
    ]
}

fn sntp_and_diagnostic_tags() -> Vec<Tag> {
    vec![
        tag("sntpen", |s| checkbox(s.config.sntp.enabled)),
        tag("tmsrv", |s| s.config.sntp.server.to_string()),
        tag("freeram", |s| s.status.free_heap.to_string()),
        tag("minram", |s| s.status.min_free_heap.to_string()),
        tag("mqtt1st", |s| link_state(s.status.mqtt_connected[0])),
        tag("mqtt2st", |s| link_state(s.status.mqtt_connected[1])),
        tag("status_fail", |_| "none".to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SystemConfig;
    use crate::template::TemplateResolver;

    fn setup() -> (TemplateResolver<DeviceState>, DeviceState) {
        let state = DeviceState::new(SystemConfig::default());
        let all = InterfaceSet {
            wifi: true,
            ethernet: true,
            gsm: false,
            mqtt: true,
        };
        (TemplateResolver::new(builtin_tags(&all)), state)
    }

    #[test]
    fn test_system_tags() {
        let (r, mut state) = setup();
        state.status.chip_id = [0x00, 0x00, 0x01, 0x00];
        state.status.rssi = Some(-61);
        assert_eq!(r.resolve_to_string(&state, "dname"), "WEBGUIAPP");
        assert_eq!(r.resolve_to_string(&state, "pass"), "******");
        assert_eq!(r.resolve_to_string(&state, "serial"), "00000100");
        assert_eq!(r.resolve_to_string(&state, "serial10"), "0000000256");
        assert_eq!(r.resolve_to_string(&state, "wlev"), "-61dBm");
        assert_eq!(r.resolve_to_string(&state, "tshift"), "7200");
        assert_eq!(r.resolve_to_string(&state, "ota"), " ");
    }

    #[test]
    fn test_checkboxes() {
        let (r, mut state) = setup();
        state.config.wifi.ap_mode = false;
        assert_eq!(r.resolve_to_string(&state, "cln"), "checked");
        assert_eq!(r.resolve_to_string(&state, "apn"), " ");
        assert_eq!(r.resolve_to_string(&state, "sntpen"), "checked");
    }

    #[test]
    fn test_addresses_follow_link_state() {
        let (r, mut state) = setup();
        assert_eq!(r.resolve_to_string(&state, "ip"), "192.168.1.150");
        assert_eq!(r.resolve_to_string(&state, "dns"), "0.0.0.0");

        state.status.wifi_sta.up = true;
        state.status.wifi_sta.ip = Some(Ipv4Addr::new(10, 0, 0, 42));
        assert_eq!(r.resolve_to_string(&state, "ip"), "10.0.0.42");
        assert_eq!(r.resolve_to_string(&state, "dns2"), "-");
        assert_eq!(r.resolve_to_string(&state, "wfstat"), "DISCONNECTED");
    }

    #[test]
    fn test_mqtt_station_tags() {
        let (r, mut state) = setup();
        state.config.mqtt[1].port = 8883;
        state.status.mqtt_connected[1] = true;
        assert_eq!(r.resolve_to_string(&state, "mport1"), "1883");
        assert_eq!(r.resolve_to_string(&state, "mport2"), "8883");
        assert_eq!(r.resolve_to_string(&state, "clpass2"), "******");
        assert_eq!(r.resolve_to_string(&state, "mqtt2st"), "CONNECTED");
    }

    #[test]
    fn test_gated_interfaces_fall_back() {
        let state = DeviceState::new(SystemConfig::default());
        let r = TemplateResolver::new(builtin_tags(&InterfaceSet::default()));
        assert_eq!(r.resolve_to_string(&state, "eip"), "#DEF");
        assert_eq!(r.resolve_to_string(&state, "ssidap"), "WebGUI-Device");
    }
}
