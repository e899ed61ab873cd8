//! Store-key construction.
//!
//! Counter and throttle keys follow a single layout, `{pool}_{sub}`,
//! optionally prefixed with a short hash for shard distribution in backing
//! stores that partition by key prefix. Building keys in one place keeps the
//! layout testable and stops each call site from rolling its own hashing.

use sha2::{Digest, Sha256};

/// How store keys are laid out for a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyScheme {
    /// `{pool}_{sub}` as-is.
    #[default]
    Plain,
    /// `{prefix}_{pool}_{sub}` where `prefix` is derived from the key itself;
    /// see [`sharded_key`].
    Sharded,
}

impl KeyScheme {
    /// Build the store key for `(pool_key, sub_key)` under this scheme.
    pub fn key(&self, pool_key: &str, sub_key: &str) -> String {
        match self {
            KeyScheme::Plain => plain_key(pool_key, sub_key),
            KeyScheme::Sharded => sharded_key(pool_key, sub_key),
        }
    }
}

/// `{pool}_{sub}` with no prefix.
pub fn plain_key(pool_key: &str, sub_key: &str) -> String {
    format!("{pool_key}_{sub_key}")
}

/// `{pool}_{sub}` prefixed with 8 hex characters of its own SHA-256 digest.
///
/// Contract: the prefix is characters 4..12 of the lowercase hex digest of
/// the plain key. The prefix is a pure function of `(pool_key, sub_key)`, so
/// every caller derives the same key, while the leading bytes spread keys
/// across hash-partitioned shards.
pub fn sharded_key(pool_key: &str, sub_key: &str) -> String {
    let plain = plain_key(pool_key, sub_key);
    let digest = format!("{:x}", Sha256::digest(plain.as_bytes()));
    format!("{}_{plain}", &digest[4..12])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_key_joins_with_underscore() {
        assert_eq!(plain_key("summer-sale", "gold"), "summer-sale_gold");
    }

    #[test]
    fn sharded_key_matches_documented_contract() {
        // Fixed vectors; a change here is a breaking change for deployed
        // stores since existing counters would become unreachable.
        assert_eq!(sharded_key("summer-sale", "gold"), "5f671a9c_summer-sale_gold");
        assert_eq!(sharded_key("summer-sale", "silver"), "0eb982c5_summer-sale_silver");
        assert_eq!(sharded_key("lottery01", "user-42"), "2f80e1c5_lottery01_user-42");
    }

    #[test]
    fn sharded_key_is_deterministic() {
        assert_eq!(sharded_key("pool", "a"), sharded_key("pool", "a"));
    }

    #[test]
    fn sharded_prefix_is_eight_hex_chars() {
        let key = sharded_key("waiting-room", "window-1693382400");
        let (prefix, rest) = key.split_once('_').expect("prefix separator");
        assert_eq!(prefix.len(), 8);
        assert!(prefix.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(rest, "waiting-room_window-1693382400");
    }

    #[test]
    fn scheme_dispatches() {
        assert_eq!(KeyScheme::Plain.key("pool", "a"), "pool_a");
        assert_eq!(KeyScheme::Sharded.key("pool", "a"), "4c372e35_pool_a");
    }
}
