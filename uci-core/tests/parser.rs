use std::path::PathBuf;

use uci_core::{parse_file, OptionValue};

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(path)
}

#[test]
fn parses_network_fixture_sections_and_lists() {
    let network = parse_file(&fixture("fixtures/easymesh/network")).expect("parse should succeed");
    assert_eq!(network.name, "network");

    let lan = network.section("lan").expect("lan should exist");
    assert_eq!(lan.kind, "interface");
    assert_eq!(lan.get_str("device"), Some("br-lan"));

    let bridge = network
        .sections_of("device")
        .next()
        .expect("bridge device should exist");
    assert!(bridge.anonymous);
    assert_eq!(bridge.get("ports"), Some(&OptionValue::list(["eth0"])));
}

#[test]
fn anonymous_firewall_sections_get_distinct_ids() {
    let firewall = parse_file(&fixture("fixtures/easymesh/firewall")).expect("parse");
    let zones: Vec<_> = firewall.sections_of("zone").collect();
    assert_eq!(zones.len(), 2);
    assert_ne!(zones[0].id, zones[1].id);
    assert!(zones.iter().all(|z| z.id.starts_with("cfg")));

    let forwarding = firewall.section("mmrouter").expect("named forwarding");
    assert_eq!(forwarding.get_str("dest"), Some("wan"));
}
