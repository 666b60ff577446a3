use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::devices::{ethernet_ports, EthernetPort, NetDevice};

/// Network devices detected on the target and its built-in ethernet ports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Inventory {
    #[serde(default, rename = "ethernet_port")]
    pub builtin_ports: Vec<EthernetPort>,
    #[serde(default, rename = "device")]
    pub devices: Vec<NetDevice>,
}

impl Inventory {
    /// Built-in ports merged with detected ones.
    pub fn ethernet_ports(&self) -> Vec<EthernetPort> {
        ethernet_ports(&self.builtin_ports, &self.devices)
    }
}

/// Errors returned when loading an inventory file.
#[derive(Debug, Error)]
pub enum InventoryLoadError {
    #[error("failed to read inventory file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse inventory file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

/// Load an inventory from a TOML file.
pub fn load_inventory(path: &Path) -> Result<Inventory, InventoryLoadError> {
    let raw = fs::read_to_string(path).map_err(|source| InventoryLoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_inventory(&raw, path.display().to_string())
}

fn parse_inventory(raw: &str, path: String) -> Result<Inventory, InventoryLoadError> {
    toml::from_str(raw).map_err(|source| InventoryLoadError::Parse { path, source })
}
