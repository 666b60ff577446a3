//! batman-adv layer 2 mesh over the HaLow radio.

use tracing::debug;
use uci_core::{ConfigStore, StoreError};

use crate::forwarding::get_or_create_forwarding;
use crate::network::{ensure_section, MESH_NETWORK};
use crate::zone::get_or_create_zone;

/// Default batadv interface.
pub const BATMAN_DEVICE: &str = "bat0";
/// Hard interface that attaches the HaLow iface to batman.
pub const BATMAN_HARDIF: &str = "batmesh0";
/// Bridge the batman device joins.
pub const MESH_BRIDGE: &str = "br-ahwlan";

const BATMAN_TUNING: &[(&str, &str)] = &[
    ("proto", "batadv"),
    ("routing_algo", "BATMAN_V"),
    ("bridge_loop_avoidance", "1"),
    ("hop_penalty", "30"),
    ("bonding", "1"),
    ("aggregated_ogms", "1"),
    ("ap_isolation", "0"),
    ("fragmentation", "1"),
    ("orig_interval", "1000"),
    ("distributed_arp_table", "1"),
    ("multicast_mode", "1"),
    ("network_coding", "1"),
    ("isolation_mark", "0x00000000/0x00000000"),
];

/// Create or retune the batadv interface `device`.
pub fn setup_batman_device_on_network(
    store: &mut dyn ConfigStore,
    gw_mode: &str,
    device: &str,
) -> Result<String, StoreError> {
    ensure_section(store, "network", "interface", device)?;
    for (option, value) in BATMAN_TUNING {
        store.set_str("network", device, option, value)?;
    }
    store.set_str("network", device, "gw_mode", gw_mode)?;
    Ok(device.to_string())
}

/// Attach the HaLow iface to `device` through a `batadv_hardif` interface.
///
/// Returns the hard interface id. When a hard interface for `device` already
/// exists nothing is changed.
pub fn setup_batman_interface_on_device(
    store: &mut dyn ConfigStore,
    device: &str,
) -> Result<String, StoreError> {
    let existing = store
        .sections("network", Some("interface"))
        .into_iter()
        .find(|s| s.get_str("proto") == Some("batadv_hardif") && s.get_str("master") == Some(device));
    if let Some(hardif) = existing {
        return Ok(hardif.id);
    }

    debug!(device, hardif = BATMAN_HARDIF, "creating batman hard interface");
    ensure_section(store, "network", "interface", BATMAN_HARDIF)?;
    store.set_str("network", BATMAN_HARDIF, "proto", "batadv_hardif")?;
    store.set_str("network", BATMAN_HARDIF, "master", device)?;

    let bridge = store
        .sections("network", Some("device"))
        .into_iter()
        .find(|d| d.get_str("type") == Some("bridge") && d.get_str("name") == Some(MESH_BRIDGE));
    if let Some(bridge) = bridge {
        let mut ports = bridge.get_list("ports");
        if !ports.iter().any(|p| p == device) {
            ports.push(device.to_string());
        }
        store.set_list("network", &bridge.id, "ports", &ports)?;
        store.set_str("network", &bridge.id, "igmp_snooping", "1")?;
    }

    let morse = store
        .sections("wireless", Some("wifi-device"))
        .into_iter()
        .find(|d| d.get_str("type") == Some("morse"));
    if let Some(morse) = morse {
        let iface = format!("default_{}", morse.id);
        if store.section("wireless", &iface).is_some() {
            store.set_str("wireless", &iface, "network", BATMAN_HARDIF)?;
        }
    }

    if store.section("mesh11sd", "mesh_params").is_some() {
        store.set_str("mesh11sd", "mesh_params", "mesh_fwding", "0")?;
    }
    if store.section("network", "lan").is_some() {
        store.set_str("network", "lan", "dns", "1.1.1.1")?;
    }

    let src = get_or_create_zone(store, MESH_NETWORK)?;
    let dest = get_or_create_zone(store, "lan")?;
    get_or_create_forwarding(store, &src, &dest, None)?;

    Ok(BATMAN_HARDIF.to_string())
}

#[cfg(test)]
mod tests {
    use uci_core::{parse, ConfigStore, StagedStore};

    use super::{setup_batman_device_on_network, setup_batman_interface_on_device};

    fn fixture() -> StagedStore {
        StagedStore::from_packages([
            parse(
                "network",
                "config device 'brdev'\n\toption name 'br-ahwlan'\n\toption type 'bridge'\n\tlist ports 'eth1'\n\n\
                 config interface 'lan'\n\toption device 'eth0'\n\n\
                 config interface 'ahwlan'\n\toption device 'br-ahwlan'\n",
            )
            .expect("network"),
            parse(
                "wireless",
                "config wifi-device 'radio0'\n\toption type 'morse'\n\n\
                 config wifi-iface 'default_radio0'\n\toption device 'radio0'\n\toption network 'ahwlan'\n",
            )
            .expect("wireless"),
            parse(
                "firewall",
                "config zone\n\toption name 'lan'\n\tlist network 'lan'\n\n\
                 config zone\n\toption name 'ahwlan'\n\tlist network 'ahwlan'\n",
            )
            .expect("firewall"),
        ])
    }

    #[test]
    fn device_gets_tuning_and_gateway_mode() {
        let mut store = StagedStore::new();
        setup_batman_device_on_network(&mut store, "server", "bat0").expect("setup");
        assert_eq!(store.get_str("network", "bat0", "proto").as_deref(), Some("batadv"));
        assert_eq!(store.get_str("network", "bat0", "gw_mode").as_deref(), Some("server"));
        assert_eq!(
            store.get_str("network", "bat0", "routing_algo").as_deref(),
            Some("BATMAN_V")
        );
    }

    #[test]
    fn hard_interface_joins_bridge_and_repoints_halow() {
        let mut store = fixture();
        let hardif = setup_batman_interface_on_device(&mut store, "bat0").expect("setup");

        assert_eq!(hardif, "batmesh0");
        assert_eq!(
            store.get_list("network", "brdev", "ports"),
            vec!["eth1".to_string(), "bat0".to_string()]
        );
        assert_eq!(
            store.get_str("wireless", "default_radio0", "network").as_deref(),
            Some("batmesh0")
        );
        assert_eq!(store.get_str("network", "lan", "dns").as_deref(), Some("1.1.1.1"));
        assert!(store.section("mesh11sd", "mesh_params").is_none());

        let rules = store.sections("firewall", Some("forwarding"));
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].get_str("src"), Some("ahwlan"));
        assert_eq!(rules[0].get_str("dest"), Some("lan"));
    }

    #[test]
    fn second_run_changes_nothing() {
        let mut store = fixture();
        setup_batman_interface_on_device(&mut store, "bat0").expect("first");
        store.commit();
        setup_batman_interface_on_device(&mut store, "bat0").expect("second");
        assert!(!store.has_changes());
    }
}
