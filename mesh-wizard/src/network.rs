//! Network interface helpers shared by the reconcilers.

use tracing::debug;
use uci_core::{ConfigStore, Section, StoreError};

use crate::bridge::set_bridge_with_ports;
use crate::zone::get_or_create_zone;

/// Network the HaLow radio and mesh backhaul live on.
pub const MESH_NETWORK: &str = "ahwlan";

/// The `type bridge` device section named `name`.
pub fn bridge_device(store: &dyn ConfigStore, name: &str) -> Option<Section> {
    store
        .sections("network", Some("device"))
        .into_iter()
        .find(|d| d.get_str("type") == Some("bridge") && d.get_str("name") == Some(name))
}

/// Bridge device the network currently points at, if any.
pub fn network_bridge(store: &dyn ConfigStore, network: &str) -> Option<Section> {
    let device = store.get_str("network", network, "device")?;
    bridge_device(store, &device)
}

/// Plain devices on a network: the bridge ports if it is bridged, otherwise
/// its single device. Wi-Fi interfaces are not included.
pub fn network_devices(store: &dyn ConfigStore, network: &str) -> Vec<String> {
    if let Some(bridge) = network_bridge(store, network) {
        return bridge.get_list("ports");
    }
    store
        .get_str("network", network, "device")
        .into_iter()
        .collect()
}

/// Point a network at `devices`, going through a bridge when needed.
///
/// A network already on a bridge gets that bridge's ports replaced. One device
/// is referenced directly; several get a bridge via [`set_bridge_with_ports`].
pub fn set_network_devices(
    store: &mut dyn ConfigStore,
    network: &str,
    devices: &[String],
) -> Result<(), StoreError> {
    let current = store.get_str("network", network, "device");
    let device_section = current.as_deref().and_then(|name| {
        store
            .sections("network", Some("device"))
            .into_iter()
            .find(|d| d.get_str("name") == Some(name))
    });

    match device_section {
        Some(section) if section.get_str("type") == Some("bridge") => {
            debug!(network, bridge = %section.id, ?devices, "replacing bridge ports");
            store.set_list_keeping_form("network", &section.id, "ports", devices)
        }
        _ if devices.len() == 1 => store.set_str("network", network, "device", &devices[0]),
        _ if devices.len() > 1 => set_bridge_with_ports(store, network, devices).map(|_| ()),
        _ => Ok(()),
    }
}

/// Enabled wifi-ifaces attached to a network.
pub fn network_wifi_ifaces(store: &dyn ConfigStore, network: &str) -> Vec<Section> {
    store
        .sections("wireless", Some("wifi-iface"))
        .into_iter()
        .filter(|iface| iface.get_str("disabled") != Some("1"))
        .filter(|iface| iface.get("network").is_some_and(|n| n.contains(network)))
        .collect()
}

/// Ids of all `interface` sections.
pub fn network_interfaces(store: &dyn ConfigStore) -> Vec<String> {
    store
        .sections("network", Some("interface"))
        .into_iter()
        .map(|s| s.id)
        .collect()
}

/// First address of an interface and the netmask that goes with it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpConfig {
    pub ipaddr: Option<String>,
    pub netmask: Option<String>,
}

/// Read `ipaddr`/`netmask`, folding the list-of-CIDR form into the plain one.
///
/// Only the first address is kept when `ipaddr` is a list. A `/nn` suffix
/// overrides `netmask`.
pub fn first_ipaddr_and_netmask(store: &dyn ConfigStore, network: &str) -> IpConfig {
    let mut netmask = store.get_str("network", network, "netmask");
    let ipaddr = store.get_str("network", network, "ipaddr").map(|addr| {
        match addr.split_once('/') {
            Some((ip, prefix)) => {
                netmask = prefix.parse().ok().and_then(prefix_to_mask);
                ip.to_string()
            }
            None => addr,
        }
    });
    IpConfig { ipaddr, netmask }
}

pub fn first_ipaddr(store: &dyn ConfigStore, network: &str) -> Option<String> {
    first_ipaddr_and_netmask(store, network).ipaddr
}

/// Dotted netmask for a prefix length (0..=32).
pub fn prefix_to_mask(prefix: u8) -> Option<String> {
    if prefix > 32 {
        return None;
    }
    let bits = u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0);
    let [a, b, c, d] = bits.to_be_bytes();
    Some(format!("{a}.{b}.{c}.{d}"))
}

/// Make sure a named interface section exists and has a firewall zone.
/// Returns the zone name.
pub fn ensure_network_iface(store: &mut dyn ConfigStore, network: &str) -> Result<String, StoreError> {
    if store.section("network", network).is_none() {
        debug!(network, "creating network interface");
        store.add("network", "interface", Some(network))?;
    }
    get_or_create_zone(store, network)
}

/// Create a named section when it is missing. Existing sections are left alone.
pub(crate) fn ensure_section(
    store: &mut dyn ConfigStore,
    package: &str,
    kind: &str,
    name: &str,
) -> Result<(), StoreError> {
    if store.section(package, name).is_none() {
        store.add(package, kind, Some(name))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use uci_core::{parse, ConfigStore, OptionValue, StagedStore};

    use super::{
        bridge_device, first_ipaddr_and_netmask, network_devices, network_interfaces,
        network_wifi_ifaces, prefix_to_mask, set_network_devices, IpConfig,
    };

    fn store(network: &str, wireless: &str) -> StagedStore {
        StagedStore::from_packages([
            parse("network", network).expect("network"),
            parse("wireless", wireless).expect("wireless"),
        ])
    }

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn devices_come_from_bridge_ports_or_device() {
        let store = store(
            "config device\n\toption name 'br-lan'\n\toption type 'bridge'\n\tlist ports 'eth0'\n\tlist ports 'eth1'\n\n\
             config interface 'lan'\n\toption device 'br-lan'\n\n\
             config interface 'wan'\n\toption device 'eth2'\n\n\
             config interface 'loopback'\n",
            "",
        );
        assert_eq!(network_devices(&store, "lan"), names(&["eth0", "eth1"]));
        assert_eq!(network_devices(&store, "wan"), names(&["eth2"]));
        assert!(network_devices(&store, "loopback").is_empty());
        assert_eq!(network_interfaces(&store), names(&["lan", "wan", "loopback"]));
    }

    #[test]
    fn growing_to_two_devices_creates_one_bridge() {
        let mut store = store("config interface 'lan'\n\toption device 'eth0'\n", "");

        set_network_devices(&mut store, "lan", &names(&["eth0"])).expect("one");
        assert_eq!(store.get_str("network", "lan", "device").as_deref(), Some("eth0"));

        set_network_devices(&mut store, "lan", &names(&["eth0", "eth1"])).expect("two");
        assert_eq!(store.get_str("network", "lan", "device").as_deref(), Some("br-lan"));
        let bridge = bridge_device(&store, "br-lan").expect("bridge");
        assert_eq!(bridge.get_list("ports"), names(&["eth0", "eth1"]));
        assert_eq!(store.sections("network", Some("device")).len(), 1);

        set_network_devices(&mut store, "lan", &names(&["eth0", "eth1"])).expect("again");
        assert_eq!(store.sections("network", Some("device")).len(), 1);
    }

    #[test]
    fn bridge_ports_keep_the_option_form_they_were_read_in() {
        let mut store = store(
            "config device 'brdev'\n\toption name 'br-lan'\n\toption type 'bridge'\n\toption ports 'eth0'\n\n\
             config interface 'lan'\n\toption device 'br-lan'\n",
            "",
        );
        set_network_devices(&mut store, "lan", &names(&["eth1"])).expect("one");
        assert_eq!(store.get("network", "brdev", "ports"), Some(OptionValue::from("eth1")));

        set_network_devices(&mut store, "lan", &names(&["eth1", "eth2"])).expect("two");
        assert_eq!(
            store.get("network", "brdev", "ports"),
            Some(OptionValue::list(["eth1", "eth2"]))
        );
    }

    #[test]
    fn empty_device_list_leaves_plain_network_alone() {
        let mut store = store("config interface 'lan'\n\toption device 'eth0'\n", "");
        set_network_devices(&mut store, "lan", &[]).expect("set");
        assert_eq!(store.get_str("network", "lan", "device").as_deref(), Some("eth0"));
        assert!(!store.has_changes());
    }

    #[test]
    fn wifi_ifaces_skip_disabled_and_other_networks() {
        let store = store(
            "config interface 'lan'\n",
            "config wifi-iface 'a'\n\toption network 'lan'\n\n\
             config wifi-iface 'b'\n\toption network 'lan'\n\toption disabled '1'\n\n\
             config wifi-iface 'c'\n\tlist network 'wan'\n\tlist network 'lan'\n\n\
             config wifi-iface 'd'\n\toption network 'wan'\n",
        );
        let ids: Vec<String> = network_wifi_ifaces(&store, "lan")
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, names(&["a", "c"]));
    }

    #[test]
    fn cidr_addresses_override_netmask() {
        let store = store(
            "config interface 'lan'\n\tlist ipaddr '10.0.0.1/16'\n\tlist ipaddr '10.1.0.1/24'\n\toption netmask '255.0.0.0'\n\n\
             config interface 'wan'\n\toption ipaddr '192.168.1.1'\n\toption netmask '255.255.255.0'\n",
            "",
        );
        assert_eq!(
            first_ipaddr_and_netmask(&store, "lan"),
            IpConfig {
                ipaddr: Some("10.0.0.1".to_string()),
                netmask: Some("255.255.0.0".to_string()),
            }
        );
        assert_eq!(
            first_ipaddr_and_netmask(&store, "wan").netmask.as_deref(),
            Some("255.255.255.0")
        );
        assert_eq!(first_ipaddr_and_netmask(&store, "missing"), IpConfig::default());
    }

    #[test]
    fn prefix_lengths_map_to_masks() {
        assert_eq!(prefix_to_mask(0).as_deref(), Some("0.0.0.0"));
        assert_eq!(prefix_to_mask(28).as_deref(), Some("255.255.255.240"));
        assert_eq!(prefix_to_mask(32).as_deref(), Some("255.255.255.255"));
        assert_eq!(prefix_to_mask(33), None);
    }
}
