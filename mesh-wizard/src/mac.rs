//! MAC addresses for generated bridge devices.
//!
//! Every generated address starts with the `F2` octet so it can be told apart
//! from hardware-assigned ones.

use rand::Rng;

use crate::devices::NetDevice;

/// First octet of every generated MAC address.
pub const GENERATED_MAC_PREFIX: &str = "F2";

/// `F2` followed by five random lowercase hex octets.
pub fn random_mac<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut out = String::from(GENERATED_MAC_PREFIX);
    for _ in 0..5 {
        let octet: u8 = rng.gen();
        out.push_str(&format!(":{octet:02x}"));
    }
    out
}

/// Bridge MAC correlated with the HaLow radio: `F2` plus the radio MAC's
/// last five octets.
///
/// Returns `None` when no HaLow device exposes a well-formed MAC.
pub fn fake_morse_mac(devices: &[NetDevice]) -> Option<String> {
    devices
        .iter()
        .filter(|d| d.is_halow())
        .filter_map(|d| d.mac.as_deref())
        .filter(|mac| is_valid_mac(mac))
        .map(|mac| format!("{GENERATED_MAC_PREFIX}:{}", &mac[mac.len() - 14..]))
        .next()
}

/// Six colon-separated groups of two hex digits.
pub fn is_valid_mac(mac: &str) -> bool {
    let groups: Vec<&str> = mac.split(':').collect();
    groups.len() == 6
        && groups
            .iter()
            .all(|g| g.len() == 2 && g.chars().all(|c| c.is_ascii_hexdigit()))
}

/// A well-formed MAC carrying the generated `F2` prefix.
pub fn is_generated_mac(mac: &str) -> bool {
    is_valid_mac(mac) && mac[..2].eq_ignore_ascii_case(GENERATED_MAC_PREFIX)
}
