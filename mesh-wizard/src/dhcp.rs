//! DHCP pools and the dnsmasq instances that own them.
//!
//! Existing instances and pools are reused wherever they apply; new ones are
//! only added when nothing fits.

use rand::Rng;
use tracing::{debug, warn};
use uci_core::{ConfigStore, OptionValue, Section, StoreError};

use crate::error::{InvalidIpAddr, TopologyError};
use crate::network::MESH_NETWORK;

/// Public resolver handed to mesh points.
pub const PUBLIC_DNS: &str = "1.1.1.1";
/// IPv6 resolver announced by new pools.
pub const PUBLIC_DNS_V6: &str = "2606:4700:4700::1111";
/// Netmask of the mesh network.
pub const MESH_NETMASK: &str = "255.255.0.0";
/// Addresses handed out by one pool.
pub const POOL_SIZE: u32 = 16;

fn scoped_interfaces(dnsmasq: &Section) -> Vec<String> {
    dnsmasq
        .get_list("interface")
        .into_iter()
        .filter(|i| !i.is_empty())
        .collect()
}

/// Serves every interface not in its `notinterface` list.
fn serves_generically(dnsmasq: &Section, network: &str) -> bool {
    scoped_interfaces(dnsmasq).is_empty()
        && !dnsmasq.get_list("notinterface").iter().any(|n| n == network)
}

fn serves_explicitly(dnsmasq: &Section, network: &str) -> bool {
    scoped_interfaces(dnsmasq).iter().any(|n| n == network)
}

/// Pick the dnsmasq instance that should serve `network`.
///
/// Generic instances win over scoped ones, first match in store order. More
/// than one candidate means a broken config: it is logged and the first one
/// is used anyway. When nothing applies, a lone instance is widened to cover
/// the network, an empty config gets a new generic instance, and anything
/// else gets a new instance scoped to just this network.
pub fn get_or_create_dnsmasq(store: &mut dyn ConfigStore, network: &str) -> Result<String, StoreError> {
    let all = store.sections("dhcp", Some("dnsmasq"));
    let generic: Vec<&Section> = all.iter().filter(|d| serves_generically(d, network)).collect();
    let scoped: Vec<&Section> = all.iter().filter(|d| serves_explicitly(d, network)).collect();

    if generic.len() + scoped.len() > 1 {
        warn!(
            network,
            candidates = generic.len() + scoped.len(),
            "more than one dnsmasq instance applies; config is probably broken"
        );
    }
    if let Some(found) = generic.first().or(scoped.first()) {
        return Ok(found.id.clone());
    }

    match all.as_slice() {
        [] => {
            let id = store.add("dhcp", "dnsmasq", None)?;
            debug!(network, dnsmasq = %id, "creating dnsmasq instance");
            setup_dnsmasq(store, &id, network)?;
            Ok(id)
        }
        [only] => {
            debug!(network, dnsmasq = %only.id, "widening dnsmasq instance");
            if only.has("interface") {
                store.unset("dhcp", &only.id, "interface");
            }
            let excluded = only.get_list("notinterface");
            if excluded.iter().any(|n| n == network) {
                let kept: Vec<String> = excluded.into_iter().filter(|n| n != network).collect();
                store.set_list("dhcp", &only.id, "notinterface", &kept)?;
            }
            Ok(only.id.clone())
        }
        _ => {
            let id = unique_name(store, &format!("{network}_dns"));
            debug!(network, dnsmasq = %id, "creating scoped dnsmasq instance");
            store.add("dhcp", "dnsmasq", Some(&id))?;
            setup_dnsmasq(store, &id, network)?;
            store.set("dhcp", &id, "interface", OptionValue::list([network]))?;
            store.set_str("dhcp", &id, "localuse", "0")?;
            store.set("dhcp", &id, "notinterface", OptionValue::list(["loopback"]))?;
            Ok(id)
        }
    }
}

/// Options a new dnsmasq instance needs on top of the dnsmasq defaults.
pub fn setup_dnsmasq(store: &mut dyn ConfigStore, dnsmasq: &str, network: &str) -> Result<(), StoreError> {
    let local = format!("/{network}/");
    let options = [
        ("domainneeded", "1"),
        ("localise_queries", "1"),
        ("rebind_localhost", "1"),
        ("local", local.as_str()),
        ("domain", network),
        ("expandhosts", "1"),
        ("cachesize", "1000"),
        ("authoritative", "1"),
        ("readethers", "1"),
        ("localservice", "1"),
        ("ednspacket_max", "1232"),
    ];
    for (option, value) in options {
        store.set_str("dhcp", dnsmasq, option, value)?;
    }
    Ok(())
}

/// `base`, or `base1`, `base2`, ... whichever is not a section id in `dhcp`.
fn unique_name(store: &dyn ConfigStore, base: &str) -> String {
    let sections = store.sections("dhcp", None);
    let mut proposed = base.to_string();
    let mut suffix = 0;
    while sections.iter().any(|s| s.id == proposed) {
        suffix += 1;
        proposed = format!("{base}{suffix}");
    }
    proposed
}

/// Add a pool for `network` with a randomized `/28` lease range.
///
/// `start` is `255 + 16k` for `k` in `0..15`, so leases begin in the third
/// octet and co-located devices rarely collide.
pub fn create_dhcp<R: Rng + ?Sized>(
    store: &mut dyn ConfigStore,
    rng: &mut R,
    dnsmasq: &str,
    network: &str,
) -> Result<String, StoreError> {
    let id = unique_name(store, network);
    let start = 255 + POOL_SIZE * rng.gen_range(0..15u32);
    debug!(network, pool = %id, start, "creating dhcp pool");

    store.add("dhcp", "dhcp", Some(&id))?;
    let limit = POOL_SIZE.to_string();
    let start = start.to_string();
    let options = [
        ("start", start.as_str()),
        ("limit", limit.as_str()),
        ("leasetime", "3m"),
        ("ra", "server"),
        ("ra_slaac", "1"),
        ("dns_service", "0"),
        ("ignore", "0"),
        ("force", "1"),
        ("dns", PUBLIC_DNS_V6),
        ("ra_flags", "none"),
        ("interface", network),
    ];
    for (option, value) in options {
        store.set_str("dhcp", &id, option, value)?;
    }

    let named_instance = store
        .section("dhcp", dnsmasq)
        .is_some_and(|d| !d.anonymous);
    if named_instance {
        store.set_str("dhcp", &id, "instance", dnsmasq)?;
    }
    Ok(id)
}

fn pool_matches(pool: &Section, dnsmasq: &str, network: &str) -> bool {
    pool.get_str("interface") == Some(network)
        && pool.get_str("instance").map_or(true, |i| i.is_empty() || i == dnsmasq)
}

/// Enabled pool for `network`, else a disabled one re-enabled, else a new
/// one.
pub fn get_or_create_dhcp<R: Rng + ?Sized>(
    store: &mut dyn ConfigStore,
    rng: &mut R,
    dnsmasq: &str,
    network: &str,
) -> Result<String, StoreError> {
    let pools = store.sections("dhcp", Some("dhcp"));
    let candidates: Vec<&Section> = pools
        .iter()
        .filter(|p| pool_matches(p, dnsmasq, network))
        .collect();

    if let Some(on) = candidates.iter().find(|p| p.get_str("ignore") != Some("1")) {
        return Ok(on.id.clone());
    }
    if let Some(off) = candidates.first() {
        debug!(network, pool = %off.id, "re-enabling dhcp pool");
        store.unset("dhcp", &off.id, "ignore");
        return Ok(off.id.clone());
    }
    create_dhcp(store, rng, dnsmasq, network)
}

fn ipv4_octets(ip: &str) -> Result<[u8; 4], InvalidIpAddr> {
    let invalid = || InvalidIpAddr(ip.to_string());
    let parts: Vec<&str> = ip.split('.').collect();
    if parts.len() != 4 {
        return Err(invalid());
    }
    let mut octets = [0u8; 4];
    for (slot, part) in octets.iter_mut().zip(&parts) {
        if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        *slot = part.parse().map_err(|_| invalid())?;
    }
    Ok(octets)
}

/// `<o1>.<o2>.254.<r>` with `r` in `0..254`.
///
/// Only the first two octets of `ip` are kept; the address lands in a `/24`
/// set aside for mesh points.
pub fn get_random_ipaddr<R: Rng + ?Sized>(rng: &mut R, ip: &str) -> Result<String, InvalidIpAddr> {
    let octets = ipv4_octets(ip)?;
    let host: u8 = rng.gen_range(0..254);
    Ok(format!("{}.{}.254.{host}", octets[0], octets[1]))
}

/// Whether `addr` is a mesh point address that [`get_random_ipaddr`] could
/// have drawn for `ip`.
pub fn is_mesh_point_ipaddr(addr: &str, ip: &str) -> bool {
    match (ipv4_octets(addr), ipv4_octets(ip)) {
        (Ok(a), Ok(base)) => a[..2] == base[..2] && a[2] == 254 && a[3] < 254,
        _ => false,
    }
}

/// Bring up addressing and DHCP for `network`.
///
/// The mesh network gets static `/16` addressing with EUI-64 IPv6. As a
/// mesh point it also gets a random host address, kept across runs once
/// drawn, and a public resolver;
/// otherwise the routing daemon owns the address. A non-uplink pool only
/// hands out its own router and DNS (`dhcp_option 3,6`); an uplink pool
/// clears that and any dnsmasq `notinterface` exclusion.
pub fn setup_network_with_dnsmasq<R: Rng + ?Sized>(
    store: &mut dyn ConfigStore,
    rng: &mut R,
    network: &str,
    ip: &str,
    uplink: bool,
    mesh_point: bool,
) -> Result<(), TopologyError> {
    let is_mesh = network == MESH_NETWORK;
    let host_addr = if is_mesh && mesh_point {
        let current = store
            .get_str("network", network, "ipaddr")
            .filter(|addr| is_mesh_point_ipaddr(addr, ip));
        match current {
            Some(addr) => Some(addr),
            None => Some(get_random_ipaddr(rng, ip)?),
        }
    } else {
        None
    };

    let dnsmasq = get_or_create_dnsmasq(store, network)?;
    let pool = get_or_create_dhcp(store, rng, &dnsmasq, network)?;

    if is_mesh {
        store.set_str("network", network, "proto", "static")?;
        store.set_str("network", network, "netmask", MESH_NETMASK)?;
        store.set_str("network", network, "ip6assign", "64")?;
        store.set_str("network", network, "ip6ifaceid", "eui64")?;
        let mut ip6class = store.get_list("network", network, "ip6class");
        if !ip6class.iter().any(|c| c == "local") {
            ip6class.push("local".to_string());
            store.set_list("network", network, "ip6class", &ip6class)?;
        }
        if let Some(addr) = host_addr {
            store.set_str("network", network, "ipaddr", &addr)?;
            store.set_str("network", network, "dns", PUBLIC_DNS)?;
        }
    }

    if uplink {
        store.unset("dhcp", &dnsmasq, "notinterface");
        store.unset("dhcp", &pool, "dhcp_option");
    } else {
        store.set("dhcp", &pool, "dhcp_option", OptionValue::list(["3", "6"]))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use uci_core::{parse, ConfigStore, OptionValue, StagedStore};

    use super::{
        create_dhcp, get_or_create_dhcp, get_or_create_dnsmasq, get_random_ipaddr,
        is_mesh_point_ipaddr, setup_network_with_dnsmasq,
    };
    use crate::error::TopologyError;

    fn dhcp(text: &str) -> StagedStore {
        StagedStore::from_packages([parse("dhcp", text).expect("dhcp")])
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn empty_config_gets_one_generic_instance() {
        let mut store = StagedStore::new();
        let first = get_or_create_dnsmasq(&mut store, "lan").expect("first");
        let second = get_or_create_dnsmasq(&mut store, "lan").expect("second");

        assert_eq!(first, second);
        let instances = store.sections("dhcp", Some("dnsmasq"));
        assert_eq!(instances.len(), 1);
        assert!(instances[0].anonymous);
        assert_eq!(instances[0].get_str("local"), Some("/lan/"));
        assert_eq!(instances[0].get_str("ednspacket_max"), Some("1232"));
    }

    #[test]
    fn generic_instance_wins_over_scoped() {
        let mut store = dhcp(
            "config dnsmasq 'scoped'\n\tlist interface 'lan'\n\n\
             config dnsmasq 'generic'\n\tlist notinterface 'wan'\n",
        );
        assert_eq!(get_or_create_dnsmasq(&mut store, "lan").expect("pick"), "generic");
        assert!(!store.has_changes());
    }

    #[test]
    fn lone_instance_is_widened() {
        let mut store = dhcp(
            "config dnsmasq 'only'\n\tlist notinterface 'loopback'\n\tlist notinterface 'ahwlan'\n",
        );
        assert_eq!(get_or_create_dnsmasq(&mut store, "ahwlan").expect("pick"), "only");
        assert_eq!(
            store.get_list("dhcp", "only", "notinterface"),
            vec!["loopback".to_string()]
        );

        let mut scoped = dhcp("config dnsmasq 'only'\n\tlist interface 'lan'\n");
        get_or_create_dnsmasq(&mut scoped, "ahwlan").expect("pick");
        assert_eq!(scoped.get("dhcp", "only", "interface"), None);
    }

    #[test]
    fn several_instances_get_a_new_scoped_one() {
        let mut store = dhcp(
            "config dnsmasq 'a'\n\tlist interface 'lan'\n\n\
             config dnsmasq 'b'\n\tlist interface 'wan'\n\n\
             config dhcp 'ahwlan_dns'\n",
        );
        let id = get_or_create_dnsmasq(&mut store, "ahwlan").expect("create");
        assert_eq!(id, "ahwlan_dns1");
        assert_eq!(
            store.get_list("dhcp", &id, "interface"),
            vec!["ahwlan".to_string()]
        );
        assert_eq!(
            store.get_list("dhcp", &id, "notinterface"),
            vec!["loopback".to_string()]
        );
        assert_eq!(store.get_str("dhcp", &id, "localuse").as_deref(), Some("0"));
        assert_eq!(get_or_create_dnsmasq(&mut store, "ahwlan").expect("again"), id);
    }

    #[test]
    fn pool_start_is_aligned_and_limited() {
        let allowed: Vec<u32> = (0..15).map(|k| 255 + 16 * k).collect();
        for seed in 0..200 {
            let mut store = StagedStore::new();
            let mut rng = StdRng::seed_from_u64(seed);
            let pool = create_dhcp(&mut store, &mut rng, "cfg000001", "lan").expect("create");
            let start: u32 = store
                .get_str("dhcp", &pool, "start")
                .and_then(|s| s.parse().ok())
                .expect("start");
            assert!(allowed.contains(&start), "start {start}");
            assert_eq!(store.get_str("dhcp", &pool, "limit").as_deref(), Some("16"));
        }
    }

    #[test]
    fn pool_instance_follows_dnsmasq_naming() {
        let mut store = dhcp("config dnsmasq\n\nconfig dnsmasq 'named'\n\nconfig dhcp 'lan'\n");
        let anon = store.sections("dhcp", Some("dnsmasq"))[0].id.clone();

        let pool = create_dhcp(&mut store, &mut rng(), &anon, "lan").expect("anon");
        assert_eq!(pool, "lan1");
        assert_eq!(store.get_str("dhcp", &pool, "instance"), None);

        let pool = create_dhcp(&mut store, &mut rng(), "named", "lan").expect("named");
        assert_eq!(pool, "lan2");
        assert_eq!(store.get_str("dhcp", &pool, "instance").as_deref(), Some("named"));
    }

    #[test]
    fn reuses_enabled_then_disabled_pools() {
        let mut store = dhcp(
            "config dnsmasq 'dns'\n\n\
             config dhcp 'other'\n\toption interface 'lan'\n\toption instance 'elsewhere'\n\n\
             config dhcp 'off'\n\toption interface 'lan'\n\toption ignore '1'\n",
        );
        let pool = get_or_create_dhcp(&mut store, &mut rng(), "dns", "lan").expect("pool");
        assert_eq!(pool, "off");
        assert_eq!(store.get_str("dhcp", "off", "ignore"), None);

        let again = get_or_create_dhcp(&mut store, &mut rng(), "dns", "lan").expect("again");
        assert_eq!(again, "off");
        assert_eq!(store.sections("dhcp", Some("dhcp")).len(), 2);
    }

    #[test]
    fn random_ip_keeps_first_two_octets() {
        let mut rng = rng();
        for _ in 0..100 {
            let ip = get_random_ipaddr(&mut rng, "10.42.0.1").expect("ip");
            let parts: Vec<&str> = ip.split('.').collect();
            assert_eq!(&parts[..3], &["10", "42", "254"]);
            let host: u32 = parts[3].parse().expect("host");
            assert!(host < 254);
        }
    }

    #[test]
    fn malformed_addresses_are_rejected() {
        for bad in ["", "10.42.0", "10.42.0.1.5", "10.42.x.1", "10.42.0.256", "10..0.1", "-1.2.3.4", "1.2.3. 4"] {
            assert!(get_random_ipaddr(&mut rng(), bad).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn bad_ip_leaves_store_untouched() {
        let mut store = StagedStore::from_packages([
            parse("network", "config interface 'ahwlan'\n").expect("network"),
        ]);
        let err = setup_network_with_dnsmasq(&mut store, &mut rng(), "ahwlan", "10.42", true, true)
            .expect_err("invalid");
        assert!(matches!(err, TopologyError::InvalidIp(_)));
        assert!(!store.has_changes());
    }

    #[test]
    fn mesh_network_gets_static_addressing() {
        let mut store = StagedStore::from_packages([parse(
            "network",
            "config interface 'ahwlan'\n\toption ip6class 'local'\n",
        )
        .expect("network")]);
        setup_network_with_dnsmasq(&mut store, &mut rng(), "ahwlan", "10.42.0.1", false, true)
            .expect("setup");

        assert_eq!(store.get_str("network", "ahwlan", "proto").as_deref(), Some("static"));
        assert_eq!(
            store.get_str("network", "ahwlan", "netmask").as_deref(),
            Some("255.255.0.0")
        );
        assert_eq!(
            store.get_list("network", "ahwlan", "ip6class"),
            vec!["local".to_string()]
        );
        let addr = store.get_str("network", "ahwlan", "ipaddr").expect("ipaddr");
        assert!(addr.starts_with("10.42.254."), "{addr}");
        assert_eq!(store.get_str("network", "ahwlan", "dns").as_deref(), Some("1.1.1.1"));

        let pool = store.sections("dhcp", Some("dhcp")).remove(0);
        assert_eq!(pool.get("dhcp_option"), Some(&OptionValue::list(["3", "6"])));
    }

    #[test]
    fn mesh_point_keeps_an_address_already_drawn() {
        let mut store = StagedStore::from_packages([parse(
            "network",
            "config interface 'ahwlan'\n\toption ipaddr '10.42.254.104'\n",
        )
        .expect("network")]);
        setup_network_with_dnsmasq(&mut store, &mut rng(), "ahwlan", "10.42.254.104", true, true)
            .expect("setup");
        assert_eq!(
            store.get_str("network", "ahwlan", "ipaddr").as_deref(),
            Some("10.42.254.104")
        );

        assert!(is_mesh_point_ipaddr("10.42.254.20", "10.42.0.1"));
        assert!(!is_mesh_point_ipaddr("10.42.254.254", "10.42.0.1"));
        assert!(!is_mesh_point_ipaddr("10.42.0.1", "10.42.0.1"));
        assert!(!is_mesh_point_ipaddr("10.43.254.20", "10.42.0.1"));
        assert!(!is_mesh_point_ipaddr("10.42.254.x", "10.42.0.1"));
    }

    #[test]
    fn uplink_clears_option_and_exclusions() {
        let mut store = StagedStore::from_packages([
            parse("network", "config interface 'lan'\n").expect("network"),
            parse(
                "dhcp",
                "config dnsmasq 'dns'\n\tlist notinterface 'loopback'\n\n\
                 config dhcp 'lan'\n\toption interface 'lan'\n\tlist dhcp_option '3'\n",
            )
            .expect("dhcp"),
        ]);
        setup_network_with_dnsmasq(&mut store, &mut rng(), "lan", "192.168.1.1", true, true)
            .expect("setup");

        assert_eq!(store.get("dhcp", "dns", "notinterface"), None);
        assert_eq!(store.get("dhcp", "lan", "dhcp_option"), None);
        assert_eq!(store.get("network", "lan", "proto"), None);
    }
}
