//! Detected network devices and the ethernet ports they expose.

use serde::{Deserialize, Serialize};

/// ARPHRD of the HaLow monitor interface, which reports itself as ethernet.
pub const ARPHRD_MONITOR: u16 = 803;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Ethernet,
    Vlan,
    Wifi,
    Bridge,
    Tunnel,
    Other,
}

/// One OS-level network device.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NetDevice {
    pub name: String,
    pub kind: DeviceKind,
    #[serde(default)]
    pub mac: Option<String>,
    /// Radio modes reported for wireless devices (`ah` for HaLow).
    #[serde(default)]
    pub hwmodes: Vec<String>,
    #[serde(default)]
    pub arphrd: Option<u16>,
}

impl NetDevice {
    pub fn is_halow(&self) -> bool {
        self.kind == DeviceKind::Wifi && self.hwmodes.iter().any(|m| m == "ah")
    }

    fn is_ethernet_port(&self) -> bool {
        matches!(self.kind, DeviceKind::Ethernet | DeviceKind::Vlan)
            && self.arphrd != Some(ARPHRD_MONITOR)
    }
}

/// An ethernet port with its intended role (`lan` / `wan`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EthernetPort {
    pub device: String,
    pub role: String,
    #[serde(default = "builtin_default")]
    pub builtin: bool,
}

fn builtin_default() -> bool {
    true
}

/// Merge built-in ports (which know their role) with detected devices.
///
/// Switch ports show up as vlan devices so those count too. Detected ports
/// that are not built in get role `wan`.
pub fn ethernet_ports(builtin: &[EthernetPort], devices: &[NetDevice]) -> Vec<EthernetPort> {
    let mut ports: Vec<EthernetPort> = builtin
        .iter()
        .cloned()
        .map(|p| EthernetPort { builtin: true, ..p })
        .collect();

    for device in devices.iter().filter(|d| d.is_ethernet_port()) {
        if ports.iter().all(|p| p.device != device.name) {
            ports.push(EthernetPort {
                device: device.name.clone(),
                role: "wan".to_string(),
                builtin: false,
            });
        }
    }
    ports
}
