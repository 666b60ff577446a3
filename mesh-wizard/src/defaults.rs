//! Factory defaults for the HaLow access point.

use rand::seq::SliceRandom;
use rand::Rng;
use uci_core::ConfigStore;

const WIFI_KEY_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz023456789";
const WIFI_KEY_LEN: usize = 8;

/// SSID to offer when the radio is not already an AP: the system hostname.
pub fn default_ssid(store: &dyn ConfigStore) -> Option<String> {
    store
        .first_section("system", "system")
        .and_then(|s| s.get_str("hostname").map(str::to_string))
}

/// The provisioned `default_wifi_key`, or eight random characters.
pub fn default_wifi_key<R: Rng + ?Sized>(store: &dyn ConfigStore, rng: &mut R) -> String {
    let provisioned = store
        .first_section("system", "system")
        .and_then(|s| s.get_str("default_wifi_key").map(str::to_string));
    if let Some(key) = provisioned {
        return key;
    }
    (0..WIFI_KEY_LEN)
        .filter_map(|_| WIFI_KEY_CHARS.choose(rng).map(|&b| char::from(b)))
        .collect()
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use uci_core::{parse, StagedStore};

    use super::{default_ssid, default_wifi_key};

    #[test]
    fn reads_hostname_and_provisioned_key() {
        let store = StagedStore::from_packages([parse(
            "system",
            "config system\n\toption hostname 'halow-1a2b'\n\toption default_wifi_key 'secretkey1'\n",
        )
        .expect("system")]);
        let mut rng = StdRng::seed_from_u64(1);

        assert_eq!(default_ssid(&store).as_deref(), Some("halow-1a2b"));
        assert_eq!(default_wifi_key(&store, &mut rng), "secretkey1");
    }

    #[test]
    fn random_key_uses_the_fixed_alphabet() {
        let store = StagedStore::new();
        let mut rng = StdRng::seed_from_u64(3);
        let key = default_wifi_key(&store, &mut rng);

        assert_eq!(key.len(), 8);
        assert!(key
            .chars()
            .all(|c| c.is_ascii_lowercase() || (c.is_ascii_digit() && c != '1')));
        assert_eq!(default_ssid(&store), None);
    }
}
