//! Zone-to-zone forwarding rules.
//!
//! Rules are never deleted. A rule that conflicts with the requested one is
//! soft-disabled (`enabled '0'`) so vendor defaults such as `mmrouter` can be
//! brought back by selecting the same topology again.

use tracing::{debug, warn};
use uci_core::{ConfigStore, Section, StoreError};

fn is_enabled(rule: &Section) -> bool {
    rule.get_str("enabled") != Some("0")
}

fn matches(rule: &Section, src: &str, dest: &str) -> bool {
    rule.get_str("src") == Some(src) && rule.get_str("dest") == Some(dest)
}

/// Make `src → dest` the one active forwarding rule out of `src`.
///
/// An enabled `src → dest` rule is returned untouched, so saving an unchanged
/// topology never rewrites a hand-edited firewall. Otherwise the destination
/// zone gets NAT settings, every enabled rule from `src` is disabled, and a
/// disabled `src → dest` rule is re-enabled or a new one is added (named
/// `name` when given and that id is free, anonymous otherwise).
pub fn get_or_create_forwarding(
    store: &mut dyn ConfigStore,
    src: &str,
    dest: &str,
    name: Option<&str>,
) -> Result<String, StoreError> {
    let rules = store.sections("firewall", Some("forwarding"));
    if let Some(existing) = rules.iter().find(|r| matches(r, src, dest) && is_enabled(r)) {
        return Ok(existing.id.clone());
    }

    let dest_zone = store
        .sections("firewall", Some("zone"))
        .into_iter()
        .find(|z| z.get_str("name") == Some(dest));
    match dest_zone {
        Some(zone) => {
            store.set_str("firewall", &zone.id, "mtu_fix", "1")?;
            store.set_str("firewall", &zone.id, "masq", "1")?;
        }
        None => warn!(dest, "forwarding destination zone does not exist; skipping NAT setup"),
    }

    for rule in rules.iter().filter(|r| r.get_str("src") == Some(src) && is_enabled(r)) {
        debug!(rule = %rule.id, src, "disabling forwarding");
        store.set_str("firewall", &rule.id, "enabled", "0")?;
    }

    if let Some(disabled) = rules.iter().find(|r| matches(r, src, dest)) {
        debug!(rule = %disabled.id, src, dest, "re-enabling forwarding");
        store.set_str("firewall", &disabled.id, "enabled", "1")?;
        return Ok(disabled.id.clone());
    }

    let name = name.filter(|n| store.section("firewall", n).is_none());
    let id = store.add("firewall", "forwarding", name)?;
    debug!(rule = %id, src, dest, "adding forwarding");
    store.set_str("firewall", &id, "src", src)?;
    store.set_str("firewall", &id, "dest", dest)?;
    Ok(id)
}
