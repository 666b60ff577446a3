use thiserror::Error;
use uci_core::StoreError;

use crate::bridge::BridgeConflict;

/// A dotted-quad address that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid IP address: {0}")]
pub struct InvalidIpAddr(pub String);

/// Errors that abort a topology reconciliation pass.
///
/// Staged changes made before the error are left in the store; the caller
/// decides whether to discard them.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    BridgeConflict(#[from] BridgeConflict),
    #[error(transparent)]
    InvalidIp(#[from] InvalidIpAddr),
    /// No `wifi-device` of type `morse` is configured.
    #[error("no HaLow wifi-device found in wireless config")]
    NoHalowDevice,
    /// A required intent was neither given nor inferable from the store.
    #[error("missing {0}: pass it explicitly or configure the device first")]
    MissingIntent(&'static str),
    #[error("unknown {kind} '{value}'")]
    InvalidIntent { kind: &'static str, value: String },
    /// Wi-Fi uplink names a station interface that no radio provides.
    #[error("unknown Wi-Fi uplink interface '{0}'")]
    UnknownUplink(String),
}
