use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use radsched_core::OrganizationSmsConfig;
use tracing::debug;

struct Entry {
    value: OrganizationSmsConfig,
    fetched_at: Instant,
}

/// In-memory, bounded-TTL cache of per-organization SMS config.
///
/// Settings change rarely (sender pools, provider preference) so the
/// dispatch hot path should never block on a database round trip for them.
/// A DashMap-backed lookup cache with an expiry per entry instead of
/// push-based invalidation (no change-notification channel exists for this
/// table; a stale read for a handful of seconds is harmless for config that
/// changes on the order of days).
#[derive(Clone)]
pub struct OrgConfigCache {
    entries: Arc<DashMap<String, Entry>>,
    ttl: Duration,
}

impl OrgConfigCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Return a cached config if present and not yet expired.
    pub fn get(&self, organization_id: &str) -> Option<OrganizationSmsConfig> {
        let entry = self.entries.get(organization_id)?;
        if entry.fetched_at.elapsed() > self.ttl {
            debug!(organization_id, "org config cache entry expired");
            return None;
        }
        Some(entry.value.clone())
    }

    pub fn put(&self, config: OrganizationSmsConfig) {
        self.entries.insert(
            config.organization_id.clone(),
            Entry {
                value: config,
                fetched_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, organization_id: &str) {
        self.entries.remove(organization_id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(org: &str) -> OrganizationSmsConfig {
        OrganizationSmsConfig {
            organization_id: org.to_string(),
            primary_provider: "twilio".into(),
            primary_phone_numbers: vec!["+15551234567".into()],
            failover_provider: None,
            failover_phone_numbers: vec![],
            sticky_sender: true,
            modality_aggregation_overrides: Default::default(),
            consent_prompt_template: None,
        }
    }

    #[test]
    fn returns_none_when_absent() {
        let cache = OrgConfigCache::new(Duration::from_secs(60));
        assert!(cache.get("org1").is_none());
    }

    #[test]
    fn returns_cached_value_within_ttl() {
        let cache = OrgConfigCache::new(Duration::from_secs(60));
        cache.put(sample("org1"));
        assert!(cache.get("org1").is_some());
    }

    #[test]
    fn expires_after_ttl() {
        let cache = OrgConfigCache::new(Duration::from_millis(1));
        cache.put(sample("org1"));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("org1").is_none());
    }

    #[test]
    fn invalidate_removes_entry_immediately() {
        let cache = OrgConfigCache::new(Duration::from_secs(60));
        cache.put(sample("org1"));
        cache.invalidate("org1");
        assert!(cache.get("org1").is_none());
    }
}
