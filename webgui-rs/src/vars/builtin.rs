//! Built-in variable table over [`DeviceState`]

use std::net::Ipv4Addr;

use crate::config::{assign, InterfaceSet, DNS_SERVERS, MQTT_CLIENTS};
use crate::error::VarError;
use crate::status::DeviceState;

use super::{Invocation, TypedVariable};

type Var = TypedVariable<DeviceState>;

/// Build the built-in variables for the compiled-in interfaces.
///
/// Aliases double as the form field names of the settings pages.
pub fn builtin_variables(interfaces: &InterfaceSet) -> Vec<Var> {
    let mut vars = system_variables();
    if interfaces.wifi {
        vars.extend(wifi_variables());
    }
    if interfaces.ethernet {
        vars.extend(ethernet_variables());
    }
    if interfaces.mqtt {
        for station in 0..MQTT_CLIENTS {
            vars.extend(mqtt_variables(station));
        }
    }
    vars.extend(sntp_variables());
    vars
}

fn system_variables() -> Vec<Var> {
    vec![
        Var::string(
            "netname",
            3,
            31,
            |s: &DeviceState| s.config.netname.to_string(),
            |s: &mut DeviceState, v: &str| assign(&mut s.config.netname, v),
        ),
        Var::string(
            "otaurl",
            3,
            128,
            |s: &DeviceState| s.config.ota_url.to_string(),
            |s: &mut DeviceState, v: &str| assign(&mut s.config.ota_url, v),
        ),
        Var::boolean(
            "ledenab",
            |s: &DeviceState| s.config.leds_enabled,
            |s: &mut DeviceState, v| s.config.leds_enabled = v,
        ),
        Var::int(
            "otaint",
            0,
            65535,
            |s: &DeviceState| i64::from(s.config.ota_interval),
            |s: &mut DeviceState, v| s.config.ota_interval = v as u32,
        ),
        Var::boolean(
            "otaen",
            |s: &DeviceState| s.config.ota_enabled,
            |s: &mut DeviceState, v| s.config.ota_enabled = v,
        ),
        Var::string(
            "sysname",
            1,
            31,
            |s: &DeviceState| s.config.sysname.to_string(),
            |s: &mut DeviceState, v: &str| assign(&mut s.config.sysname, v),
        ),
        Var::password(
            "syspass",
            1,
            31,
            |s: &DeviceState| s.config.syspass.to_string(),
            |s: &mut DeviceState, v: &str| assign(&mut s.config.syspass, v),
        ),
        Var::password(
            "msgkey",
            0,
            64,
            |s: &DeviceState| s.config.message_key.to_string(),
            |s: &mut DeviceState, v: &str| assign(&mut s.config.message_key, v),
        ),
        Var::function("fver", |call: Invocation<'_, DeviceState>| match call {
            Invocation::Read(s) => Ok(s.status.firmware_version.clone()),
            Invocation::Write(..) => Ok(String::new()),
        })
        .read_only(),
        Var::function("serial", |call: Invocation<'_, DeviceState>| match call {
            Invocation::Read(s) => Ok(hex::encode_upper(s.status.chip_id)),
            Invocation::Write(..) => Ok(String::new()),
        })
        .read_only(),
    ]
}

fn wifi_variables() -> Vec<Var> {
    let mut vars = vec![
        Var::boolean(
            "wifien",
            |s: &DeviceState| s.config.wifi.enabled,
            |s: &mut DeviceState, v| s.config.wifi.enabled = v,
        ),
        Var::function("wifimode", |call: Invocation<'_, DeviceState>| match call {
            Invocation::Read(s) => Ok(if s.config.wifi.ap_mode { "ap" } else { "sta" }.to_string()),
            Invocation::Write(s, v) => {
                s.config.wifi.ap_mode = match v {
                    "ap" | "1" => true,
                    "sta" | "2" => false,
                    _ => return Err(VarError::invalid("wifimode", "expected ap or sta")),
                };
                Ok(String::new())
            }
        }),
        Var::boolean(
            "wifidhcp",
            |s: &DeviceState| s.config.wifi.dhcp,
            |s: &mut DeviceState, v| s.config.wifi.dhcp = v,
        ),
        Var::string(
            "wifissid",
            1,
            32,
            |s: &DeviceState| s.config.wifi.sta_ssid.to_string(),
            |s: &mut DeviceState, v: &str| assign(&mut s.config.wifi.sta_ssid, v),
        ),
        Var::password(
            "wifikey",
            8,
            63,
            |s: &DeviceState| s.config.wifi.sta_key.to_string(),
            |s: &mut DeviceState, v: &str| assign(&mut s.config.wifi.sta_key, v),
        ),
        Var::string(
            "apssid",
            1,
            32,
            |s: &DeviceState| s.config.wifi.ap_ssid.to_string(),
            |s: &mut DeviceState, v: &str| assign(&mut s.config.wifi.ap_ssid, v),
        ),
        Var::password(
            "apkey",
            8,
            63,
            |s: &DeviceState| s.config.wifi.ap_key.to_string(),
            |s: &mut DeviceState, v: &str| assign(&mut s.config.wifi.ap_key, v),
        ),
        Var::ip_addr(
            "wifiip",
            |s: &DeviceState| s.config.wifi.sta_ip,
            |s: &mut DeviceState, v| s.config.wifi.sta_ip = v,
        ),
        Var::ip_addr(
            "wifimask",
            |s: &DeviceState| s.config.wifi.sta_mask,
            |s: &mut DeviceState, v| s.config.wifi.sta_mask = v,
        ),
        Var::ip_addr(
            "wifigw",
            |s: &DeviceState| s.config.wifi.sta_gateway,
            |s: &mut DeviceState, v| s.config.wifi.sta_gateway = v,
        ),
        Var::ip_addr(
            "apip",
            |s: &DeviceState| s.config.wifi.ap_ip,
            |s: &mut DeviceState, v| s.config.wifi.ap_ip = v,
        ),
    ];
    vars.extend(dns_variables("dns", wifi_dns, wifi_dns_mut));
    vars
}

fn ethernet_variables() -> Vec<Var> {
    let mut vars = vec![
        Var::boolean(
            "ethen",
            |s: &DeviceState| s.config.ethernet.enabled,
            |s: &mut DeviceState, v| s.config.ethernet.enabled = v,
        ),
        Var::boolean(
            "ethdhcp",
            |s: &DeviceState| s.config.ethernet.dhcp,
            |s: &mut DeviceState, v| s.config.ethernet.dhcp = v,
        ),
        Var::ip_addr(
            "ethip",
            |s: &DeviceState| s.config.ethernet.ip,
            |s: &mut DeviceState, v| s.config.ethernet.ip = v,
        ),
        Var::ip_addr(
            "ethmask",
            |s: &DeviceState| s.config.ethernet.mask,
            |s: &mut DeviceState, v| s.config.ethernet.mask = v,
        ),
        Var::ip_addr(
            "ethgw",
            |s: &DeviceState| s.config.ethernet.gateway,
            |s: &mut DeviceState, v| s.config.ethernet.gateway = v,
        ),
    ];
    vars.extend(dns_variables("ethdns", eth_dns, eth_dns_mut));
    vars
}

fn wifi_dns(s: &DeviceState) -> &[Ipv4Addr; DNS_SERVERS] {
    &s.config.wifi.dns
}

fn wifi_dns_mut(s: &mut DeviceState) -> &mut [Ipv4Addr; DNS_SERVERS] {
    &mut s.config.wifi.dns
}

fn eth_dns(s: &DeviceState) -> &[Ipv4Addr; DNS_SERVERS] {
    &s.config.ethernet.dns
}

fn eth_dns_mut(s: &mut DeviceState) -> &mut [Ipv4Addr; DNS_SERVERS] {
    &mut s.config.ethernet.dns
}

/// `<prefix>1`..`<prefix>3` over a DNS server array
fn dns_variables(
    prefix: &str,
    get: fn(&DeviceState) -> &[Ipv4Addr; DNS_SERVERS],
    get_mut: fn(&mut DeviceState) -> &mut [Ipv4Addr; DNS_SERVERS],
) -> Vec<Var> {
    (0..DNS_SERVERS)
        .map(|i| {
            Var::ip_addr(
                format!("{}{}", prefix, i + 1),
                move |s: &DeviceState| get(s)[i],
                move |s: &mut DeviceState, v| get_mut(s)[i] = v,
            )
        })
        .collect()
}

/// Variables of one MQTT station, suffixed with its 1-based number
fn mqtt_variables(i: usize) -> Vec<Var> {
    let n = i + 1;
    vec![
        Var::boolean(
            format!("mqtten{}", n),
            move |s: &DeviceState| s.config.mqtt[i].enabled,
            move |s: &mut DeviceState, v| s.config.mqtt[i].enabled = v,
        ),
        Var::string(
            format!("mqttsrv{}", n),
            1,
            64,
            move |s: &DeviceState| s.config.mqtt[i].server.to_string(),
            move |s: &mut DeviceState, v: &str| assign(&mut s.config.mqtt[i].server, v),
        ),
        Var::int(
            format!("mqttport{}", n),
            1000,
            65535,
            move |s: &DeviceState| i64::from(s.config.mqtt[i].port),
            move |s: &mut DeviceState, v| s.config.mqtt[i].port = v as u16,
        ),
        Var::string(
            format!("mqttid{}", n),
            1,
            32,
            move |s: &DeviceState| s.config.mqtt[i].client_id.to_string(),
            move |s: &mut DeviceState, v: &str| assign(&mut s.config.mqtt[i].client_id, v),
        ),
        Var::string(
            format!("mqtttopic{}", n),
            1,
            64,
            move |s: &DeviceState| s.config.mqtt[i].root_topic.to_string(),
            move |s: &mut DeviceState, v: &str| assign(&mut s.config.mqtt[i].root_topic, v),
        ),
        Var::string(
            format!("mqttuser{}", n),
            0,
            32,
            move |s: &DeviceState| s.config.mqtt[i].user.to_string(),
            move |s: &mut DeviceState, v: &str| assign(&mut s.config.mqtt[i].user, v),
        ),
        Var::password(
            format!("mqttpass{}", n),
            0,
            32,
            move |s: &DeviceState| s.config.mqtt[i].password.to_string(),
            move |s: &mut DeviceState, v: &str| assign(&mut s.config.mqtt[i].password, v),
        ),
    ]
}

fn sntp_variables() -> Vec<Var> {
    vec![
        Var::boolean(
            "sntpen",
            |s: &DeviceState| s.config.sntp.enabled,
            |s: &mut DeviceState, v| s.config.sntp.enabled = v,
        ),
        Var::string(
            "sntpsrv",
            1,
            64,
            |s: &DeviceState| s.config.sntp.server.to_string(),
            |s: &mut DeviceState, v: &str| assign(&mut s.config.sntp.server, v),
        ),
        Var::int(
            "tz",
            -12,
            14,
            |s: &DeviceState| i64::from(s.config.sntp.timezone),
            |s: &mut DeviceState, v| s.config.sntp.timezone = v as i8,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SystemConfig;
    use crate::vars::{VarType, VariableRegistry, MASK};

    fn setup(interfaces: InterfaceSet) -> (VariableRegistry<DeviceState>, DeviceState) {
        let mut config = SystemConfig::default();
        config.interfaces = interfaces;
        (VariableRegistry::new(builtin_variables(&interfaces)), DeviceState::new(config))
    }

    #[test]
    fn test_aliases_unique() {
        let all = InterfaceSet {
            wifi: true,
            ethernet: true,
            gsm: true,
            mqtt: true,
        };
        let vars = builtin_variables(&all);
        let mut aliases: Vec<&str> = vars.iter().map(|v| v.alias()).collect();
        let total = aliases.len();
        aliases.sort_unstable();
        aliases.dedup();
        assert_eq!(aliases.len(), total);
    }

    #[test]
    fn test_every_variable_round_trips() {
        let all = InterfaceSet {
            wifi: true,
            ethernet: true,
            gsm: true,
            mqtt: true,
        };
        let (reg, mut state) = setup(all);
        let writable: Vec<_> = reg.iter().filter(|v| !v.is_read_only()).collect();
        assert!(writable.len() > 40);

        for var in writable {
            let alias = var.alias();
            let samples: Vec<String> = match var.vartype() {
                VarType::Bool => vec!["false".into(), "true".into()],
                VarType::Int => vec![var.min().to_string(), var.max().to_string()],
                VarType::String | VarType::Password => vec![
                    "m".repeat(var.min() as usize),
                    "x".repeat(var.max() as usize),
                ],
                VarType::IpAddr => vec!["10.1.2.3".into(), "0.0.0.0".into()],
                // Writing back what was read must be accepted and stable
                VarType::Function => vec![reg.get(&state, alias).unwrap().0],
                VarType::Error => unreachable!("'{}' bound as error", alias),
            };
            for value in samples {
                assert_eq!(reg.set(&mut state, alias, &value), Ok(var.vartype()), "set {}={}", alias, value);
                let expected = if var.vartype() == VarType::Password { MASK } else { value.as_str() };
                assert_eq!(reg.get(&state, alias).unwrap().0, expected, "get {}", alias);
            }
        }
    }

    #[test]
    fn test_interface_gating() {
        let (reg, _) = setup(InterfaceSet {
            wifi: false,
            ethernet: true,
            gsm: false,
            mqtt: false,
        });
        assert!(reg.find("wifissid").is_none());
        assert!(reg.find("mqttsrv1").is_none());
        assert!(reg.find("ethip").is_some());
        assert!(reg.find("ethdns3").is_some());
        assert!(reg.find("netname").is_some());
    }

    #[test]
    fn test_system_variables() {
        let (reg, mut state) = setup(InterfaceSet::default());

        assert_eq!(reg.set(&mut state, "netname", "LAB-DEV"), Ok(VarType::String));
        assert_eq!(state.config.netname.as_str(), "LAB-DEV");
        assert!(reg.set(&mut state, "netname", "ab").is_err());

        assert!(reg.set(&mut state, "otaint", "65536").is_err());
        assert_eq!(reg.set(&mut state, "otaint", "3600"), Ok(VarType::Int));
        assert_eq!(state.config.ota_interval, 3600);

        assert_eq!(reg.set(&mut state, "ledenab", "0"), Ok(VarType::Bool));
        assert!(!state.config.leds_enabled);

        assert_eq!(reg.get(&state, "syspass").unwrap().0, MASK);
    }

    #[test]
    fn test_read_only_identity() {
        let (reg, mut state) = setup(InterfaceSet::default());
        state.status.chip_id = [0xde, 0xad, 0xbe, 0xef];
        assert_eq!(reg.get(&state, "serial").unwrap().0, "DEADBEEF");
        assert_eq!(reg.set(&mut state, "fver", "9.9.9"), Ok(VarType::Function));
        assert_eq!(reg.get(&state, "fver").unwrap().0, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_wifi_mode() {
        let (reg, mut state) = setup(InterfaceSet::default());
        assert_eq!(reg.get(&state, "wifimode").unwrap().0, "ap");
        reg.set(&mut state, "wifimode", "2").unwrap();
        assert!(!state.config.wifi.ap_mode);
        assert_eq!(reg.get(&state, "wifimode").unwrap().0, "sta");
        assert!(reg.set(&mut state, "wifimode", "mesh").is_err());
        assert!(!state.config.wifi.ap_mode);
    }

    #[test]
    fn test_wifi_key_bounds() {
        let (reg, mut state) = setup(InterfaceSet::default());
        assert!(reg.set(&mut state, "wifikey", "short").is_err());
        assert!(reg.set(&mut state, "wifikey", "longenough").is_ok());
        assert_eq!(state.config.wifi.sta_key.as_str(), "longenough");
    }

    #[test]
    fn test_dns_slots() {
        let (reg, mut state) = setup(InterfaceSet::default());
        reg.set(&mut state, "dns3", "9.9.9.9").unwrap();
        assert_eq!(state.config.wifi.dns[2], Ipv4Addr::new(9, 9, 9, 9));
        assert_eq!(reg.get(&state, "dns1").unwrap().0, "8.8.8.8");
    }

    #[test]
    fn test_mqtt_stations_independent() {
        let (reg, mut state) = setup(InterfaceSet::default());
        reg.set(&mut state, "mqttport2", "8883").unwrap();
        reg.set(&mut state, "mqttsrv1", "broker.local").unwrap();
        assert_eq!(state.config.mqtt[0].port, 1883);
        assert_eq!(state.config.mqtt[1].port, 8883);
        assert_eq!(state.config.mqtt[0].server.as_str(), "broker.local");
        assert!(reg.set(&mut state, "mqttport1", "80").is_err());
    }

    #[test]
    fn test_timezone_range() {
        let (reg, mut state) = setup(InterfaceSet::default());
        assert!(reg.set(&mut state, "tz", "-12").is_ok());
        assert_eq!(state.config.sntp.timezone, -12);
        assert!(reg.set(&mut state, "tz", "15").is_err());
    }
}
