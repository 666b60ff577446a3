//! Firewall zone lookup and creation.

use tracing::debug;
use uci_core::{ConfigStore, OptionValue, StoreError};

/// Display name of the zone whose `network` list contains `network`.
///
/// This is the zone's `name` option, which forwarding rules refer to. A zone
/// without a `name` is identified by its section id.
pub fn zone_for_network(store: &dyn ConfigStore, network: &str) -> Option<String> {
    store
        .sections("firewall", Some("zone"))
        .into_iter()
        .find(|z| z.get("network").is_some_and(|n| n.contains(network)))
        .map(|z| z.get_str("name").map(str::to_string).unwrap_or(z.id))
}

/// Return the zone for `network`, creating an ACCEPT-all zone when there is
/// none.
///
/// New zones are named after the network, with a numeric suffix if that name
/// already appears as a section id or a zone name anywhere in `firewall`.
pub fn get_or_create_zone(store: &mut dyn ConfigStore, network: &str) -> Result<String, StoreError> {
    if let Some(zone) = zone_for_network(store, network) {
        return Ok(zone);
    }

    let taken: Vec<(String, Option<String>)> = store
        .sections("firewall", None)
        .into_iter()
        .map(|s| {
            let name = s.get_str("name").map(str::to_string);
            (s.id, name)
        })
        .collect();
    let is_taken = |candidate: &str| {
        taken
            .iter()
            .any(|(id, name)| id == candidate || name.as_deref() == Some(candidate))
    };

    let mut proposed = network.to_string();
    let mut suffix = 0;
    while is_taken(&proposed) {
        suffix += 1;
        proposed = format!("{network}{suffix}");
    }

    debug!(network, zone = %proposed, "creating firewall zone");
    store.add("firewall", "zone", Some(&proposed))?;
    store.set_str("firewall", &proposed, "name", &proposed)?;
    store.set("firewall", &proposed, "network", OptionValue::list([network]))?;
    for direction in ["input", "output", "forward"] {
        store.set_str("firewall", &proposed, direction, "ACCEPT")?;
    }
    Ok(proposed)
}

#[cfg(test)]
mod tests {
    use uci_core::{parse, ConfigStore, StagedStore};

    use super::{get_or_create_zone, zone_for_network};

    fn firewall(text: &str) -> StagedStore {
        StagedStore::from_packages([parse("firewall", text).expect("firewall")])
    }

    #[test]
    fn finds_zone_by_member_and_returns_display_name() {
        let store = firewall(
            "config zone\n\toption name 'lan'\n\tlist network 'lan'\n\tlist network 'guest'\n",
        );
        assert_eq!(zone_for_network(&store, "guest").as_deref(), Some("lan"));
        assert_eq!(zone_for_network(&store, "wan"), None);
    }

    #[test]
    fn existing_zone_is_returned_without_changes() {
        let mut store = firewall("config zone 'z'\n\toption name 'mesh'\n\toption network 'ahwlan'\n");
        assert_eq!(get_or_create_zone(&mut store, "ahwlan").expect("zone"), "mesh");
        assert!(!store.has_changes());
    }

    #[test]
    fn unnamed_zone_is_reused_by_section_id() {
        let mut store = firewall("config zone\n\toption network 'lan'\n");
        let id = store.sections("firewall", Some("zone"))[0].id.clone();

        assert_eq!(get_or_create_zone(&mut store, "lan").expect("zone"), id);
        assert!(!store.has_changes());
        assert_eq!(store.sections("firewall", Some("zone")).len(), 1);
    }

    #[test]
    fn new_zone_avoids_ids_and_names_in_use() {
        let mut store = firewall(
            "config zone 'ahwlan'\n\toption name 'other'\n\n\
             config zone\n\toption name 'ahwlan1'\n",
        );
        let zone = get_or_create_zone(&mut store, "ahwlan").expect("zone");
        assert_eq!(zone, "ahwlan2");

        let section = store.section("firewall", "ahwlan2").expect("created");
        assert_eq!(section.get_str("name"), Some("ahwlan2"));
        assert_eq!(section.get_list("network"), vec!["ahwlan".to_string()]);
        assert_eq!(section.get_str("input"), Some("ACCEPT"));
        assert_eq!(section.get_str("output"), Some("ACCEPT"));
        assert_eq!(section.get_str("forward"), Some("ACCEPT"));
    }

    #[test]
    fn creation_is_idempotent() {
        let mut store = StagedStore::new();
        let first = get_or_create_zone(&mut store, "wan").expect("first");
        let second = get_or_create_zone(&mut store, "wan").expect("second");
        assert_eq!(first, second);
        assert_eq!(store.sections("firewall", Some("zone")).len(), 1);
    }
}
