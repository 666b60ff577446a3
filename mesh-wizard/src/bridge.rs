//! Bridge devices for networks that carry more than one device.
//!
//! Edits are conservative: bridges are only created or dropped when the
//! current state disagrees with what the network needs, so repeated runs
//! leave a settled config alone.
//!
//! A non-WDS Wi-Fi client (`adhoc`, or `sta` without `wds '1'`) cannot be
//! bridged. It may only be the sole device on its network;
//! [`validate_bridge`] reports configurations that break this.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use uci_core::{ConfigStore, Section, StoreError};

use crate::network::{bridge_device, network_bridge, network_devices, network_wifi_ifaces};

/// True for wifi-ifaces that cannot be bridged.
pub fn is_non_wds_client(iface: &Section) -> bool {
    match iface.get_str("mode") {
        Some("adhoc") => true,
        Some("sta") => iface.get_str("wds") != Some("1"),
        _ => false,
    }
}

/// Whether the network ends up with more than one device.
///
/// WDS APs and mesh-mode ifaces count twice since they spawn extra
/// datapaths.
pub fn has_multiple_devices(store: &dyn ConfigStore, network: &str) -> bool {
    let mut count = network_devices(store, network).len();
    for iface in network_wifi_ifaces(store, network) {
        let mode = iface.get_str("mode");
        let multi = (mode == Some("ap") && iface.get_str("wds") == Some("1")) || mode == Some("mesh");
        count += if multi { 2 } else { 1 };
    }
    count > 1
}

/// Put `network` on a bridge called `bridge_name`, whatever it uses now.
///
/// The bridge is created if missing and detached from any other network
/// that used it. When the network was on a different bridge, that bridge's
/// ports move over to the new one.
pub fn force_bridge(
    store: &mut dyn ConfigStore,
    network: &str,
    bridge_name: &str,
    mac: Option<&str>,
) -> Result<(), StoreError> {
    let current = store.get_str("network", network, "device");

    let bridge_id = match bridge_device(store, bridge_name) {
        Some(bridge) => {
            for iface in store.sections("network", Some("interface")) {
                if iface.id != network && iface.get_str("device") == Some(bridge_name) {
                    debug!(network = %iface.id, bridge = bridge_name, "detaching bridge");
                    store.unset("network", &iface.id, "device");
                }
            }
            bridge.id
        }
        None => {
            debug!(network, bridge = bridge_name, "creating bridge");
            let id = store.add("network", "device", None)?;
            store.set_str("network", &id, "name", bridge_name)?;
            store.set_str("network", &id, "type", "bridge")?;
            id
        }
    };
    if let Some(mac) = mac {
        store.set_str("network", &bridge_id, "macaddr", mac)?;
    }

    if current.as_deref() == Some(bridge_name) {
        return Ok(());
    }

    if let Some(old) = current.as_deref().and_then(|name| bridge_device(store, name)) {
        store.unset("network", network, "device");
        if let Some(ports) = old.get("ports").filter(|p| !p.is_empty()) {
            debug!(from = %old.id, to = %bridge_id, %ports, "moving bridge ports");
            store.set("network", &bridge_id, "ports", ports.clone())?;
        }
        store.unset("network", &old.id, "ports");
    }
    store.set_str("network", network, "device", bridge_name)
}

/// Add or drop the network's bridge when it disagrees with
/// [`has_multiple_devices`].
///
/// An unneeded bridge is only dropped when its last device is a non-WDS
/// client; any other leftover makes removal ambiguous so the bridge stays.
/// A missing bridge is created with the current device as its first port.
pub fn create_or_remove_bridge_as_needed(
    store: &mut dyn ConfigStore,
    network: &str,
) -> Result<(), StoreError> {
    let current = store.get_str("network", network, "device");
    let has_bridge = network_bridge(store, network).is_some();
    let needs_bridge = has_multiple_devices(store, network);

    if has_bridge && !needs_bridge {
        let ifaces = network_wifi_ifaces(store, network);
        if let [iface] = ifaces.as_slice() {
            if is_non_wds_client(iface) {
                debug!(network, iface = %iface.id, "dropping bridge for non-WDS client");
                store.unset("network", network, "device");
            }
        }
    } else if !has_bridge && needs_bridge {
        let ports: Vec<String> = current.into_iter().collect();
        set_bridge_with_ports(store, network, &ports)?;
    }
    Ok(())
}

/// Make sure `network` is on a bridge carrying `ports` and return the bridge
/// name.
///
/// A bridge the network already uses keeps its name; its ports are only
/// replaced when `ports` is non-empty. Otherwise `br-<network>` (or
/// `br-<network>N`) is used, reusing a bridge of that name that no network
/// references.
pub fn set_bridge_with_ports(
    store: &mut dyn ConfigStore,
    network: &str,
    ports: &[String],
) -> Result<String, StoreError> {
    if let Some(existing) = network_bridge(store, network) {
        if !ports.is_empty() {
            store.set_list("network", &existing.id, "ports", ports)?;
        }
        return Ok(existing.get_str("name").unwrap_or_default().to_string());
    }

    let prefix = format!("br-{network}");
    let mut proposed = prefix.clone();
    let mut suffix = 0;
    let bridge_id = loop {
        let same_name = store
            .sections("network", Some("device"))
            .into_iter()
            .find(|d| d.get_str("name") == Some(proposed.as_str()));
        match same_name {
            None => {
                debug!(network, bridge = %proposed, "creating bridge");
                let id = store.add("network", "device", None)?;
                store.set_str("network", &id, "name", &proposed)?;
                store.set_str("network", &id, "type", "bridge")?;
                break id;
            }
            Some(device)
                if device.get_str("type") == Some("bridge")
                    && !is_referenced(store, &proposed) =>
            {
                debug!(network, bridge = %proposed, "reusing unreferenced bridge");
                break device.id;
            }
            Some(_) => {
                suffix += 1;
                proposed = format!("{prefix}{suffix}");
            }
        }
    };

    if !ports.is_empty() {
        store.set_list("network", &bridge_id, "ports", ports)?;
    }
    store.set_str("network", network, "device", &proposed)?;
    Ok(proposed)
}

fn is_referenced(store: &dyn ConfigStore, device: &str) -> bool {
    store
        .sections("network", Some("interface"))
        .iter()
        .any(|iface| iface.get_str("device") == Some(device))
}

/// A bridged wifi-iface as shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WifiSummary {
    pub iface: String,
    /// Radio driver type (`morse`, `mac80211`, ...) or `unknown`.
    pub device_type: String,
    pub mode: String,
    pub ssid: Option<String>,
}

impl Display for WifiSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "A {} Wi-Fi device in \"{}\" mode with SSID \"{}\"",
            self.device_type,
            self.mode,
            self.ssid.as_deref().unwrap_or_default()
        )
    }
}

/// Something else sharing a bridge with a non-WDS client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BridgedDevice {
    Port { name: String },
    Wifi(WifiSummary),
}

impl Display for BridgedDevice {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BridgedDevice::Port { name } => write!(f, "A \"{name}\" port"),
            BridgedDevice::Wifi(wifi) => wifi.fmt(f),
        }
    }
}

/// A bridge that mixes a non-WDS client with other devices.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error(
    "network '{network}' bridges {} non-WDS Wi-Fi client(s) with {} other device(s)",
    .non_wds_clients.len(),
    .other_devices.len()
)]
pub struct BridgeConflict {
    pub network: String,
    pub bridge: String,
    pub non_wds_clients: Vec<WifiSummary>,
    pub other_devices: Vec<BridgedDevice>,
}

/// Check that a non-WDS client on `network`'s bridge is alone there.
///
/// `wifi_device_types` maps `wifi-device` ids to their `type`. Networks
/// without a bridge always pass.
pub fn validate_bridge(
    store: &dyn ConfigStore,
    network: &str,
    wifi_device_types: &BTreeMap<String, String>,
) -> Result<(), BridgeConflict> {
    let Some(bridge) = network_bridge(store, network) else {
        return Ok(());
    };

    let summarize = |iface: &Section| WifiSummary {
        iface: iface.id.clone(),
        device_type: iface
            .get_str("device")
            .and_then(|d| wifi_device_types.get(d))
            .cloned()
            .unwrap_or_else(|| "unknown".to_string()),
        mode: iface.get_str("mode").unwrap_or_default().to_string(),
        ssid: iface.get_str("ssid").map(str::to_string),
    };

    let (clients, others): (Vec<Section>, Vec<Section>) = network_wifi_ifaces(store, network)
        .into_iter()
        .partition(is_non_wds_client);
    let non_wds_clients: Vec<WifiSummary> = clients.iter().map(summarize).collect();
    let other_devices: Vec<BridgedDevice> = bridge
        .get_list("ports")
        .into_iter()
        .map(|name| BridgedDevice::Port { name })
        .chain(others.iter().map(|iface| BridgedDevice::Wifi(summarize(iface))))
        .collect();

    if non_wds_clients.is_empty() || non_wds_clients.len() + other_devices.len() == 1 {
        return Ok(());
    }
    Err(BridgeConflict {
        network: network.to_string(),
        bridge: bridge.get_str("name").unwrap_or_default().to_string(),
        non_wds_clients,
        other_devices,
    })
}

/// `wifi-device` id → `type` for every radio in `wireless`.
pub fn wifi_device_types(store: &dyn ConfigStore) -> BTreeMap<String, String> {
    store
        .sections("wireless", Some("wifi-device"))
        .into_iter()
        .filter_map(|d| {
            let kind = d.get_str("type")?.to_string();
            Some((d.id, kind))
        })
        .collect()
}
