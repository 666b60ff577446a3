//! EasyMesh topology reconciliation over UCI configuration.
//!
//! Given a few operator intents (is this device a mesh Controller or Agent,
//! where does its uplink come from, how should ethernet traffic reach the
//! mesh) this crate edits the `network`, `wireless`, `firewall`, `dhcp` and
//! `prplmesh` packages of an OpenWrt-style config so the device ends up in
//! that topology. All edits go through [`uci_core::ConfigStore`], so they are
//! staged and can be inspected, committed or discarded as one unit.
//!
//! # Architecture
//!
//! ## Reconcilers
//!
//! Each one is idempotent and edits conservatively: existing sections are
//! reused, conflicting forwarding rules are disabled rather than deleted.
//!
//! - [`zone`]: network → firewall zone, created on demand
//! - [`forwarding`]: one active forwarding rule per source zone
//! - [`bridge`]: bridge creation, removal and non-WDS client validation
//! - [`dhcp`]: DHCP pools and the dnsmasq instances serving them
//! - [`batman`]: batman-adv mesh interfaces
//!
//! ## Planning
//!
//! - [`planner`]: the EasyMesh decision tree driving the reconcilers
//! - [`network`]: interface, device and address lookups
//! - [`devices`] / [`inventory`]: detected network devices and ethernet ports
//! - [`mac`]: locally administered bridge MACs
//! - [`defaults`]: factory SSID and passphrase
//!
//! ## Reporting
//!
//! - [`report`]: colored change sets and bridge conflict messages
//!
//! # Examples
//!
//! ```ignore
//! use mesh_wizard::{load_inventory, DeviceRole, TopologyPlanner, Uplink, WizardOptions};
//! use rand::SeedableRng;
//! use uci_core::StagedStore;
//!
//! let mut store = StagedStore::load_dir("/etc/config".as_ref())?;
//! let inventory = load_inventory("inventory.toml".as_ref())?;
//! let mut rng = rand::rngs::StdRng::seed_from_u64(7);
//!
//! let opts = WizardOptions {
//!     role: Some(DeviceRole::Controller),
//!     uplink: Some(Uplink::Ethernet(None)),
//!     ..WizardOptions::default()
//! };
//! TopologyPlanner::new(&mut store, &mut rng, &inventory).apply(&opts)?;
//! for change in store.changes() {
//!     println!("{}", change.path());
//! }
//! ```

pub mod batman;
pub mod bridge;
pub mod defaults;
pub mod devices;
pub mod dhcp;
pub mod error;
pub mod forwarding;
pub mod inventory;
pub mod mac;
pub mod network;
pub mod planner;
pub mod report;
pub mod zone;

pub use bridge::{validate_bridge, wifi_device_types, BridgeConflict, BridgedDevice, WifiSummary};
pub use error::{InvalidIpAddr, TopologyError};
pub use inventory::{load_inventory, Inventory, InventoryLoadError};
pub use planner::{
    DeviceRole, PlanSummary, TopologyPlanner, TrafficMode, Uplink, WizardOptions,
};
