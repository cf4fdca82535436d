use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use radsched_core::ids::PhoneHash;

/// Deterministic sticky-sender projection: a stable projection of
/// phone_hash over the pool so the same recipient always receives from the
/// same number. `SHA-256(phone_hash) mod pool_len` is stable for a fixed
/// pool; a pool change may remap some hashes — no mapping is stored.
pub fn sticky_index(phone_hash: &PhoneHash, pool_len: usize) -> usize {
    assert!(pool_len > 0, "sticky_index requires a non-empty pool");
    let digest = Sha256::digest(phone_hash.0.as_bytes());
    let n = u64::from_be_bytes(digest[0..8].try_into().unwrap());
    (n % pool_len as u64) as usize
}

/// Round-robin counters for organizations with `sticky_sender = false`,
/// keyed by `(organization_id, provider)` so the primary and failover pools
/// advance independently.
#[derive(Clone, Default)]
pub struct RoundRobinCounters {
    counters: Arc<DashMap<String, AtomicUsize>>,
}

impl RoundRobinCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_index(&self, key: &str, pool_len: usize) -> usize {
        assert!(pool_len > 0, "round robin requires a non-empty pool");
        let counter = self
            .counters
            .entry(key.to_string())
            .or_insert_with(|| AtomicUsize::new(0));
        counter.fetch_add(1, Ordering::Relaxed) % pool_len
    }
}

/// Pick a `from_number` from `pool`, either deterministically (sticky) or by
/// round robin.
pub fn select_from_number<'a>(
    pool: &'a [String],
    phone_hash: &PhoneHash,
    sticky: bool,
    round_robin: &RoundRobinCounters,
    round_robin_key: &str,
) -> &'a str {
    let idx = if sticky {
        sticky_index(phone_hash, pool.len())
    } else {
        round_robin.next_index(round_robin_key, pool.len())
    };
    &pool[idx]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sticky_index_is_deterministic_for_a_fixed_pool() {
        let hash = PhoneHash("abc123".into());
        let i1 = sticky_index(&hash, 3);
        let i2 = sticky_index(&hash, 3);
        assert_eq!(i1, i2);
    }

    #[test]
    fn sticky_index_stays_in_bounds() {
        let hash = PhoneHash("abc123".into());
        for pool_len in 1..=8 {
            assert!(sticky_index(&hash, pool_len) < pool_len);
        }
    }

    #[test]
    fn different_hashes_can_land_on_different_indices() {
        let pool_len = 5;
        let indices: std::collections::HashSet<usize> = (0..50)
            .map(|i| sticky_index(&PhoneHash(format!("hash-{i}")), pool_len))
            .collect();
        assert!(indices.len() > 1, "50 distinct hashes should not all collide");
    }

    #[test]
    fn round_robin_cycles_through_the_pool() {
        let rr = RoundRobinCounters::new();
        let seen: Vec<usize> = (0..6).map(|_| rr.next_index("org1:twilio", 3)).collect();
        assert_eq!(seen, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn round_robin_keys_are_independent() {
        let rr = RoundRobinCounters::new();
        assert_eq!(rr.next_index("org1:twilio", 2), 0);
        assert_eq!(rr.next_index("org1:bandwidth", 2), 0);
        assert_eq!(rr.next_index("org1:twilio", 2), 1);
    }

    #[test]
    fn select_from_number_picks_the_sticky_slot() {
        let pool = vec!["+1a".to_string(), "+1b".to_string(), "+1c".to_string()];
        let hash = PhoneHash("stable-hash".into());
        let rr = RoundRobinCounters::new();
        let a = select_from_number(&pool, &hash, true, &rr, "org1:twilio");
        let b = select_from_number(&pool, &hash, true, &rr, "org1:twilio");
        assert_eq!(a, b);
    }
}
