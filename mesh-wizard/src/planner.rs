//! EasyMesh topology planning.
//!
//! The planner turns three intents (device role, uplink for controllers,
//! traffic mode for agents) into calls on the reconcilers. It works on the
//! staged store only; committing is left to the caller.
//!
//! Typical use:
//!
//! 1. [`TopologyPlanner::load_options`] infers the current intents from the
//!    store, before anything is changed.
//! 2. Explicit choices are layered on top with [`WizardOptions::or`].
//! 3. [`TopologyPlanner::apply`] reconciles the store and validates the
//!    resulting bridges.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use rand::Rng;
use serde::{Serialize, Serializer};
use tracing::{debug, info};
use uci_core::{ConfigStore, StoreError};

use crate::bridge::{
    create_or_remove_bridge_as_needed, force_bridge, validate_bridge, wifi_device_types,
};
use crate::defaults::{default_ssid, default_wifi_key};
use crate::devices::EthernetPort;
use crate::dhcp::setup_network_with_dnsmasq;
use crate::error::TopologyError;
use crate::forwarding::get_or_create_forwarding;
use crate::inventory::Inventory;
use crate::mac::{fake_morse_mac, is_generated_mac, random_mac};
use crate::network::{
    bridge_device, ensure_network_iface, ensure_section, first_ipaddr, network_bridge, network_devices,
    set_network_devices, MESH_NETWORK,
};
use crate::zone::{get_or_create_zone, zone_for_network};

/// Bridge the mesh network is forced onto.
pub const PRPL_BRIDGE: &str = "br-prpl";
const LAN: &str = "lan";
const WAN: &str = "wan";
const DEFAULT_LAN_IP: &str = "192.168.1.1";
const DEFAULT_WLAN_IP: &str = "10.42.0.1";
const FRONTHAUL_IFNAME: &str = "wlan-prpl";
const BACKHAUL_IFNAME: &str = "wlan-prpl-1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceRole {
    Controller,
    Agent,
}

impl FromStr for DeviceRole {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "controller" => Ok(Self::Controller),
            "agent" => Ok(Self::Agent),
            other => Err(TopologyError::InvalidIntent {
                kind: "role",
                value: other.to_string(),
            }),
        }
    }
}

impl Display for DeviceRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Controller => "controller",
            Self::Agent => "agent",
        })
    }
}

/// Where a controller gets its upstream connectivity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Uplink {
    None,
    /// DHCP client on ethernet, optionally pinned to one port.
    Ethernet(Option<String>),
    /// DHCP client on a Wi-Fi station iface.
    Wifi(String),
}

impl FromStr for Uplink {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TopologyError::InvalidIntent {
            kind: "uplink",
            value: s.to_string(),
        };
        match s.split_once('-') {
            None if s == "none" => Ok(Self::None),
            None if s == "ethernet" => Ok(Self::Ethernet(None)),
            Some(("ethernet", port)) if !port.is_empty() => Ok(Self::Ethernet(Some(port.to_string()))),
            Some(("wifi", iface)) if !iface.is_empty() => Ok(Self::Wifi(iface.to_string())),
            _ => Err(invalid()),
        }
    }
}

impl Display for Uplink {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Ethernet(None) => f.write_str("ethernet"),
            Self::Ethernet(Some(port)) => write!(f, "ethernet-{port}"),
            Self::Wifi(iface) => write!(f, "wifi-{iface}"),
        }
    }
}

impl Serialize for Uplink {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// How an agent forwards traffic between ethernet and the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficMode {
    /// Ethernet isolated from the mesh.
    None,
    /// Ethernet bridged onto the mesh network.
    Bridge,
    /// Ethernet routed (NAT) into the mesh.
    Extender,
}

impl FromStr for TrafficMode {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "bridge" => Ok(Self::Bridge),
            "extender" => Ok(Self::Extender),
            other => Err(TopologyError::InvalidIntent {
                kind: "traffic mode",
                value: other.to_string(),
            }),
        }
    }
}

impl Display for TrafficMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Bridge => "bridge",
            Self::Extender => "extender",
        })
    }
}

/// The operator's intents. Unset fields are unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WizardOptions {
    pub role: Option<DeviceRole>,
    pub uplink: Option<Uplink>,
    pub traffic_mode: Option<TrafficMode>,
    /// Fronthaul SSID (controller only).
    pub ssid: Option<String>,
    /// Fronthaul passphrase (controller only).
    pub key: Option<String>,
}

impl WizardOptions {
    /// Fill unset fields from `fallback`.
    pub fn or(self, fallback: WizardOptions) -> WizardOptions {
        WizardOptions {
            role: self.role.or(fallback.role),
            uplink: self.uplink.or(fallback.uplink),
            traffic_mode: self.traffic_mode.or(fallback.traffic_mode),
            ssid: self.ssid.or(fallback.ssid),
            key: self.key.or(fallback.key),
        }
    }
}

/// A non-HaLow radio and the iface names the planner uses for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiDeviceInfo {
    pub name: String,
    pub ap_iface: String,
    pub sta_iface: String,
}

/// Section names the planner works with, read from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionInfo {
    pub wifi_devices: Vec<WifiDeviceInfo>,
    pub morse_device: String,
    /// HaLow fronthaul AP.
    pub morse_iface: String,
    /// HaLow backhaul station used by agents.
    pub morse_backhaul_sta: String,
    pub lan_ip: String,
    pub wlan_ip: String,
}

pub fn read_section_info(store: &dyn ConfigStore) -> Result<SectionInfo, TopologyError> {
    let radios = store.sections("wireless", Some("wifi-device"));
    let morse = radios
        .iter()
        .find(|r| r.get_str("type") == Some("morse"))
        .ok_or(TopologyError::NoHalowDevice)?;

    let wifi_devices = radios
        .iter()
        .filter(|r| r.id != morse.id)
        .map(|r| WifiDeviceInfo {
            name: r.id.clone(),
            ap_iface: format!("default_{}", r.id),
            sta_iface: format!("sta_{}", r.id),
        })
        .collect();

    Ok(SectionInfo {
        wifi_devices,
        morse_device: morse.id.clone(),
        morse_iface: format!("default_{}", morse.id),
        morse_backhaul_sta: format!("bh_{}", morse.id),
        lan_ip: first_ipaddr(store, LAN).unwrap_or_else(|| DEFAULT_LAN_IP.to_string()),
        wlan_ip: first_ipaddr(store, MESH_NETWORK).unwrap_or_else(|| DEFAULT_WLAN_IP.to_string()),
    })
}

/// Which networks the ethernet ports currently serve.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EthernetPortInfo {
    /// First network running a DHCP client on a port, and that port.
    pub dhcp_network: Option<String>,
    pub dhcp_port: Option<String>,
    /// First network with static addressing on a port.
    pub static_network: Option<String>,
}

pub fn read_ethernet_port_info(store: &dyn ConfigStore, ports: &[EthernetPort]) -> EthernetPortInfo {
    let mut info = EthernetPortInfo::default();
    for network in store.sections("network", Some("interface")) {
        let proto = network.get_str("proto");
        for device in network_devices(store, &network.id) {
            if ports.iter().all(|p| p.device != device) {
                continue;
            }
            match proto {
                Some("dhcp") if info.dhcp_network.is_none() => {
                    info.dhcp_network = Some(network.id.clone());
                    info.dhcp_port = Some(device);
                }
                Some("static") if info.static_network.is_none() => {
                    info.static_network = Some(network.id.clone());
                }
                _ => {}
            }
        }
    }
    info
}

/// What [`TopologyPlanner::apply`] did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub role: DeviceRole,
    pub uplink: Option<Uplink>,
    pub traffic_mode: Option<TrafficMode>,
    pub bridge_mac: String,
    /// Forwarding rules made active by this plan.
    pub forwardings: Vec<String>,
}

/// Reconciles the store towards an EasyMesh topology.
pub struct TopologyPlanner<'a, R: Rng + ?Sized> {
    store: &'a mut dyn ConfigStore,
    rng: &'a mut R,
    inventory: &'a Inventory,
}

impl<'a, R: Rng + ?Sized> TopologyPlanner<'a, R> {
    pub fn new(store: &'a mut dyn ConfigStore, rng: &'a mut R, inventory: &'a Inventory) -> Self {
        Self {
            store,
            rng,
            inventory,
        }
    }

    /// Infer the intents the store is currently configured for.
    ///
    /// Role comes from the prplmesh config. Uplink is only inferred for a
    /// controller and traffic mode only for an agent; anything ambiguous is
    /// left unset.
    pub fn load_options(&self) -> Result<WizardOptions, TopologyError> {
        let store: &dyn ConfigStore = &*self.store;
        let info = read_section_info(store)?;
        let ports = self.inventory.ethernet_ports();
        let ports_info = read_ethernet_port_info(store, &ports);

        let role = if store.get_str("prplmesh", "config", "enable").as_deref() == Some("1") {
            match store.get_str("prplmesh", "config", "master").as_deref() {
                Some("1") => Some(DeviceRole::Controller),
                Some("0") => Some(DeviceRole::Agent),
                _ => None,
            }
        } else {
            None
        };

        let uplink = (role == Some(DeviceRole::Controller))
            .then(|| infer_uplink(store, &info, &ports, &ports_info))
            .flatten();

        let traffic_mode = (role == Some(DeviceRole::Agent)).then(|| {
            if ports_info.static_network.as_deref() == Some(LAN) {
                if forwards_lan_to_mesh(store) {
                    TrafficMode::Extender
                } else {
                    TrafficMode::None
                }
            } else {
                TrafficMode::Bridge
            }
        });

        Ok(WizardOptions {
            role,
            uplink,
            traffic_mode,
            ssid: None,
            key: None,
        })
    }

    /// Create the wireless and prplmesh sections the plan writes to.
    ///
    /// Switching into EasyMesh from another mode clears the stored role so
    /// it has to be chosen again.
    pub fn prepare(&mut self) -> Result<(), TopologyError> {
        let info = read_section_info(&*self.store)?;
        let store = &mut *self.store;

        for dev in &info.wifi_devices {
            if store.section("wireless", &dev.ap_iface).is_some() {
                store.set_str("wireless", &dev.ap_iface, "device", &dev.name)?;
                store.set_str("wireless", &dev.ap_iface, "mode", "ap")?;
            }
            ensure_section(store, "wireless", "wifi-iface", &dev.sta_iface)?;
            store.set_str("wireless", &dev.sta_iface, "device", &dev.name)?;
            store.set_str("wireless", &dev.sta_iface, "mode", "sta")?;
        }

        for iface in [&info.morse_iface, &info.morse_backhaul_sta] {
            ensure_section(store, "wireless", "wifi-iface", iface)?;
            store.set_str("wireless", iface, "device", &info.morse_device)?;
        }

        ensure_section(store, "prplmesh", "prplmesh", "config")?;
        if store.get_str("prplmesh", "config", "enable").as_deref() != Some("1") {
            store.unset("prplmesh", "config", "master");
            store.set_str("prplmesh", "config", "enable", "1")?;
        }
        ensure_section(store, "prplmesh", "wifi-device", &info.morse_device)?;
        Ok(())
    }

    /// Reconcile the store towards `opts`.
    ///
    /// Intents are checked before anything is written. On error the staged
    /// store may hold partial changes.
    pub fn apply(&mut self, opts: &WizardOptions) -> Result<PlanSummary, TopologyError> {
        let role = opts.role.ok_or(TopologyError::MissingIntent("role"))?;
        let info = read_section_info(&*self.store)?;
        let (uplink, traffic_mode) = match role {
            DeviceRole::Controller => {
                let uplink = opts.uplink.clone().ok_or(TopologyError::MissingIntent("uplink"))?;
                if let Uplink::Wifi(sta) = &uplink {
                    if info.wifi_devices.iter().all(|d| &d.sta_iface != sta) {
                        return Err(TopologyError::UnknownUplink(sta.clone()));
                    }
                }
                (Some(uplink), None)
            }
            DeviceRole::Agent => {
                let mode = opts
                    .traffic_mode
                    .ok_or(TopologyError::MissingIntent("traffic mode"))?;
                (None, Some(mode))
            }
        };
        info!(%role, uplink = ?uplink, traffic_mode = ?traffic_mode, "planning topology");

        let credentials = self.fronthaul_credentials(&info, opts);
        let aps_enabled: Vec<bool> = info
            .wifi_devices
            .iter()
            .map(|d| {
                self.store.section("wireless", &d.ap_iface).is_some()
                    && self.store.get_str("wireless", &d.ap_iface, "disabled").as_deref() != Some("1")
            })
            .collect();

        self.prepare()?;
        let is_controller = role == DeviceRole::Controller;
        self.store
            .set_str("prplmesh", "config", "master", if is_controller { "1" } else { "0" })?;

        for network in [LAN, MESH_NETWORK, WAN] {
            ensure_network_iface(&mut *self.store, network)?;
        }

        let bridge_mac = match fake_morse_mac(&self.inventory.devices) {
            Some(mac) => mac,
            None => bridge_device(&*self.store, PRPL_BRIDGE)
                .and_then(|d| d.get_str("macaddr").map(str::to_string))
                .filter(|mac| is_generated_mac(mac))
                .unwrap_or_else(|| random_mac(&mut *self.rng)),
        };
        force_bridge(&mut *self.store, MESH_NETWORK, PRPL_BRIDGE, Some(&bridge_mac))?;

        for dev in &info.wifi_devices {
            let wanted = matches!(&uplink, Some(Uplink::Wifi(sta)) if sta == &dev.sta_iface);
            self.store
                .set_str("wireless", &dev.sta_iface, "disabled", if wanted { "0" } else { "1" })?;
        }

        self.set_easymesh_config(&info, is_controller)?;
        self.set_multiap_wireless_config(&info)?;
        self.set_wps_config(&info)?;
        if is_controller {
            if let Some((ssid, key)) = credentials {
                self.store.set_str("wireless", &info.morse_iface, "ssid", &ssid)?;
                self.store.set_str("wireless", &info.morse_iface, "key", &key)?;
            }
        }

        let ctx = PlanContext {
            info: &info,
            aps_enabled: &aps_enabled,
            ports: self.inventory.ethernet_ports(),
        };
        let forwardings = match (&uplink, traffic_mode) {
            (Some(Uplink::Ethernet(port)), _) => self.controller_ethernet(&ctx, port.as_deref())?,
            (Some(Uplink::None), _) => self.controller_isolated(&ctx)?,
            (Some(Uplink::Wifi(sta)), _) => self.controller_wifi(&ctx, sta)?,
            (None, Some(TrafficMode::Extender)) => self.agent_extender(&ctx)?,
            (None, Some(TrafficMode::None)) => self.agent_isolated(&ctx)?,
            (None, Some(TrafficMode::Bridge)) => self.agent_bridge(&ctx)?,
            (None, None) => Vec::new(),
        };

        let types = wifi_device_types(&*self.store);
        for network in [LAN, MESH_NETWORK, WAN] {
            validate_bridge(&*self.store, network, &types)?;
        }

        Ok(PlanSummary {
            role,
            uplink,
            traffic_mode,
            bridge_mac,
            forwardings,
        })
    }

    /// SSID and key for the HaLow AP: given values, else the current ones if
    /// the radio already is an AP, else factory defaults.
    fn fronthaul_credentials(&mut self, info: &SectionInfo, opts: &WizardOptions) -> Option<(String, String)> {
        let store: &dyn ConfigStore = &*self.store;
        let is_ap = store.get_str("wireless", &info.morse_iface, "mode").as_deref() == Some("ap");
        let current = |option: &str| {
            if is_ap {
                store.get_str("wireless", &info.morse_iface, option).filter(|v| !v.is_empty())
            } else {
                None
            }
        };

        let ssid = opts
            .ssid
            .clone()
            .or_else(|| current("ssid"))
            .or_else(|| default_ssid(store))?;
        let key = match opts.key.clone().or_else(|| current("key")) {
            Some(key) => key,
            None => default_wifi_key(store, &mut *self.rng),
        };
        Some((ssid, key))
    }

    fn set_easymesh_config(&mut self, info: &SectionInfo, is_controller: bool) -> Result<(), StoreError> {
        let store = &mut *self.store;
        let (gateway, management, operating, wired_backhaul, backhaul_disabled) = if is_controller {
            ("1", "Multi-AP-Controller-and-Agent", "Gateway", "1", "1")
        } else {
            ("0", "Multi-AP-Agent", "WDS-Repeater", "0", "0")
        };
        store.set_str("prplmesh", "config", "gateway", gateway)?;
        store.set_str("prplmesh", "config", "management_mode", management)?;
        store.set_str("prplmesh", "config", "operating_mode", operating)?;
        store.set_str("prplmesh", "config", "wired_backhaul", wired_backhaul)?;
        store.set_str("wireless", &info.morse_backhaul_sta, "disabled", backhaul_disabled)?;
        store.set_str("prplmesh", &info.morse_device, "hostap_iface", FRONTHAUL_IFNAME)?;
        store.set_str("prplmesh", &info.morse_device, "sta_iface", BACKHAUL_IFNAME)
    }

    /// Fronthaul must be PSK+SAE transition mode for EasyMesh.
    fn set_multiap_wireless_config(&mut self, info: &SectionInfo) -> Result<(), StoreError> {
        let store = &mut *self.store;
        let fronthaul = [
            ("encryption", "sae-mixed"),
            ("mode", "ap"),
            ("wds", "1"),
            ("bss_transition", "1"),
            ("multi_ap", "3"),
            ("ieee80211k", "1"),
            ("ieee80211w", "2"),
            ("disabled", "0"),
            ("ifname", FRONTHAUL_IFNAME),
        ];
        for (option, value) in fronthaul {
            store.set_str("wireless", &info.morse_iface, option, value)?;
        }
        let backhaul = [
            ("mode", "sta"),
            ("multi_ap", "1"),
            ("wds", "1"),
            ("ifname", BACKHAUL_IFNAME),
        ];
        for (option, value) in backhaul {
            store.set_str("wireless", &info.morse_backhaul_sta, option, value)?;
        }
        Ok(())
    }

    fn set_wps_config(&mut self, info: &SectionInfo) -> Result<(), StoreError> {
        let store = &mut *self.store;
        store.set_str("wireless", &info.morse_iface, "wps_virtual_push_button", "1")?;
        store.set_str("wireless", &info.morse_iface, "wps_independent", "0")?;
        store.set_str("wireless", &info.morse_iface, "auth_cache", "0")
    }

    fn controller_ethernet(&mut self, ctx: &PlanContext<'_>, port: Option<&str>) -> Result<Vec<String>, TopologyError> {
        let upstream = if ctx.ports.len() > 1 { WAN } else { LAN };
        let name = (upstream == LAN).then_some("mmrouter");
        let forwarding = self.forward(MESH_NETWORK, upstream, name)?;

        self.store
            .set_str("wireless", &ctx.info.morse_iface, "network", MESH_NETWORK)?;
        self.attach_enabled_aps(ctx, MESH_NETWORK)?;

        match port {
            Some(port) => {
                self.assign_ports(upstream, &[port.to_string()])?;
                let others: Vec<String> = ctx
                    .ports
                    .iter()
                    .filter(|p| p.device != port)
                    .map(|p| p.device.clone())
                    .collect();
                self.assign_ports(MESH_NETWORK, &others)?;
            }
            None => {
                let all: Vec<String> = ctx.ports.iter().map(|p| p.device.clone()).collect();
                self.assign_ports(upstream, &all)?;
            }
        }
        create_or_remove_bridge_as_needed(&mut *self.store, upstream)?;

        self.store.set_str("network", upstream, "proto", "dhcp")?;
        setup_network_with_dnsmasq(&mut *self.store, &mut *self.rng, MESH_NETWORK, &ctx.info.wlan_ip, true, true)?;
        Ok(vec![forwarding])
    }

    fn controller_isolated(&mut self, ctx: &PlanContext<'_>) -> Result<Vec<String>, TopologyError> {
        self.non_bridge_mode(ctx)?;
        setup_network_with_dnsmasq(&mut *self.store, &mut *self.rng, LAN, &ctx.info.lan_ip, false, true)?;
        setup_network_with_dnsmasq(&mut *self.store, &mut *self.rng, MESH_NETWORK, &ctx.info.wlan_ip, false, true)?;
        Ok(Vec::new())
    }

    fn controller_wifi(&mut self, ctx: &PlanContext<'_>, sta: &str) -> Result<Vec<String>, TopologyError> {
        self.bridge_mode(ctx)?;
        ensure_network_iface(&mut *self.store, LAN)?;
        self.store.set_str("network", LAN, "proto", "dhcp")?;
        self.store.set_str("wireless", sta, "network", LAN)?;
        create_or_remove_bridge_as_needed(&mut *self.store, LAN)?;
        setup_network_with_dnsmasq(&mut *self.store, &mut *self.rng, MESH_NETWORK, &ctx.info.wlan_ip, true, true)?;
        Ok(vec![self.forward(MESH_NETWORK, LAN, Some("mmrouter"))?])
    }

    fn agent_extender(&mut self, ctx: &PlanContext<'_>) -> Result<Vec<String>, TopologyError> {
        self.non_bridge_mode(ctx)?;
        self.store.set_str("network", MESH_NETWORK, "proto", "dhcp")?;
        setup_network_with_dnsmasq(&mut *self.store, &mut *self.rng, LAN, &ctx.info.lan_ip, true, true)?;
        Ok(vec![self.forward(LAN, MESH_NETWORK, Some("mmextender"))?])
    }

    fn agent_isolated(&mut self, ctx: &PlanContext<'_>) -> Result<Vec<String>, TopologyError> {
        self.non_bridge_mode(ctx)?;
        self.store.set_str("network", MESH_NETWORK, "proto", "dhcp")?;
        setup_network_with_dnsmasq(&mut *self.store, &mut *self.rng, LAN, &ctx.info.lan_ip, false, true)?;
        Ok(Vec::new())
    }

    fn agent_bridge(&mut self, ctx: &PlanContext<'_>) -> Result<Vec<String>, TopologyError> {
        self.bridge_mode(ctx)?;
        self.store.set_str("network", MESH_NETWORK, "proto", "dhcp")?;
        Ok(Vec::new())
    }

    /// Everything (ethernet, HaLow, enabled APs) on the mesh network.
    fn bridge_mode(&mut self, ctx: &PlanContext<'_>) -> Result<(), TopologyError> {
        self.store
            .set_str("wireless", &ctx.info.morse_iface, "network", MESH_NETWORK)?;
        self.store
            .set_str("wireless", &ctx.info.morse_backhaul_sta, "network", MESH_NETWORK)?;
        self.attach_enabled_aps(ctx, MESH_NETWORK)?;
        let all: Vec<String> = ctx.ports.iter().map(|p| p.device.clone()).collect();
        self.assign_ports(MESH_NETWORK, &all)?;
        Ok(())
    }

    /// Built-in ethernet and enabled APs on lan, HaLow on the mesh network.
    ///
    /// Hotplugged ports stay out of lan so a USB modem running its own DHCP
    /// server does not end up bridged in.
    fn non_bridge_mode(&mut self, ctx: &PlanContext<'_>) -> Result<(), TopologyError> {
        let builtin: Vec<String> = ctx
            .ports
            .iter()
            .filter(|p| p.builtin)
            .map(|p| p.device.clone())
            .collect();
        self.assign_ports(LAN, &builtin)?;
        self.store
            .set_str("wireless", &ctx.info.morse_iface, "network", MESH_NETWORK)?;
        self.store
            .set_str("wireless", &ctx.info.morse_backhaul_sta, "network", MESH_NETWORK)?;
        self.attach_enabled_aps(ctx, LAN)?;
        create_or_remove_bridge_as_needed(&mut *self.store, LAN)?;
        Ok(())
    }

    fn attach_enabled_aps(&mut self, ctx: &PlanContext<'_>, network: &str) -> Result<(), StoreError> {
        for (dev, enabled) in ctx.info.wifi_devices.iter().zip(ctx.aps_enabled) {
            if *enabled {
                self.store.set_str("wireless", &dev.ap_iface, "network", network)?;
            }
        }
        Ok(())
    }

    /// Move `ports` onto `network`, taking them off every other network
    /// first so no port ends up in two places.
    fn assign_ports(&mut self, network: &str, ports: &[String]) -> Result<(), StoreError> {
        let store = &mut *self.store;
        for other in store.sections("network", Some("interface")) {
            if other.id == network {
                continue;
            }
            if let Some(bridge) = network_bridge(store, &other.id) {
                let current = bridge.get_list("ports");
                let kept: Vec<String> = current.iter().filter(|p| !ports.contains(*p)).cloned().collect();
                if kept.len() != current.len() {
                    debug!(network = %other.id, bridge = %bridge.id, "releasing ports");
                    store.set_list("network", &bridge.id, "ports", &kept)?;
                }
            } else if other.get_str("device").is_some_and(|d| ports.iter().any(|p| p == d)) {
                debug!(network = %other.id, "releasing device");
                store.unset("network", &other.id, "device");
            }
        }
        set_network_devices(store, network, ports)
    }

    fn forward(&mut self, src_network: &str, dest_network: &str, name: Option<&str>) -> Result<String, StoreError> {
        let src = get_or_create_zone(&mut *self.store, src_network)?;
        let dest = get_or_create_zone(&mut *self.store, dest_network)?;
        get_or_create_forwarding(&mut *self.store, &src, &dest, name)
    }
}

struct PlanContext<'i> {
    info: &'i SectionInfo,
    aps_enabled: &'i [bool],
    ports: Vec<EthernetPort>,
}

fn infer_uplink(
    store: &dyn ConfigStore,
    info: &SectionInfo,
    ports: &[EthernetPort],
    ports_info: &EthernetPortInfo,
) -> Option<Uplink> {
    let active_sta = info.wifi_devices.iter().find(|d| {
        store.section("wireless", &d.sta_iface).is_some()
            && store.get_str("wireless", &d.sta_iface, "disabled").as_deref() != Some("1")
    });
    if let Some(dev) = active_sta {
        return Some(Uplink::Wifi(dev.sta_iface.clone()));
    }

    if ports_info.dhcp_network.is_some() {
        let port = (ports.len() > 1).then(|| ports_info.dhcp_port.clone()).flatten();
        return Some(Uplink::Ethernet(port));
    }
    let halow_network = store.get_str("wireless", &info.morse_iface, "network");
    // HaLow separate from ethernet with no DHCP client anywhere.
    (ports_info.static_network != halow_network).then_some(Uplink::None)
}

fn forwards_lan_to_mesh(store: &dyn ConfigStore) -> bool {
    let (Some(lan), Some(mesh)) = (zone_for_network(store, LAN), zone_for_network(store, MESH_NETWORK))
    else {
        return false;
    };
    store
        .sections("firewall", Some("forwarding"))
        .iter()
        .any(|f| {
            f.get_str("src") == Some(lan.as_str())
                && f.get_str("dest") == Some(mesh.as_str())
                && f.get_str("enabled") != Some("0")
        })
}
