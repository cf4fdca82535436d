use serde::{Deserialize, Serialize};

use crate::config::AggregationRule;

/// Per-organization SMS and scheduling-policy overrides.
/// Cached with a bounded TTL by `radsched-store::cache` so the dispatch hot
/// path never blocks on a database round trip for settings that change
/// rarely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationSmsConfig {
    pub organization_id: String,

    /// Primary provider name (e.g. "twilio"), tried first on every send.
    pub primary_provider: String,

    /// Primary sender-number pool. A conversation sticks to one of these for
    /// its whole lifetime when `sticky_sender` is enabled.
    pub primary_phone_numbers: Vec<String>,

    /// Failover provider name, tried once when the primary send fails with a
    /// failover-eligible error (step 5). `None` disables
    /// failover for this organization.
    #[serde(default)]
    pub failover_provider: Option<String>,

    /// Failover sender-number pool, selected the same way as the primary
    /// pool. Empty disables failover even if `failover_provider` is set.
    #[serde(default)]
    pub failover_phone_numbers: Vec<String>,

    /// Whether a recipient always receives from the same sender number
    /// within a pool (sticky-sender invariant). Defaults to
    /// `true` 
    #[serde(default = "default_sticky_sender")]
    pub sticky_sender: bool,

    /// Per-modality aggregation-rule overrides; falls back to
    /// `SessionConfig::default_aggregation_rule` when a modality is absent.
    #[serde(default)]
    pub modality_aggregation_overrides: std::collections::HashMap<String, AggregationRule>,

    /// Organization-specific consent prompt template override. `None` uses
    /// the global default copy.
    #[serde(default)]
    pub consent_prompt_template: Option<String>,
}

fn default_sticky_sender() -> bool {
    true
}

impl OrganizationSmsConfig {
    pub fn aggregation_rule_for(&self, modality: &str, default: AggregationRule) -> AggregationRule {
        self.modality_aggregation_overrides
            .get(modality)
            .copied()
            .unwrap_or(default)
    }

    /// Whether a failover attempt is possible at all for this organization:
    /// a failover provider is configured and its sender pool is non-empty.
    pub fn has_failover(&self) -> bool {
        self.failover_provider.is_some() && !self.failover_phone_numbers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> OrganizationSmsConfig {
        OrganizationSmsConfig {
            organization_id: "org1".into(),
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
    fn falls_back_to_default_aggregation_when_no_override() {
        let cfg = sample();
        assert_eq!(
            cfg.aggregation_rule_for("MRI", AggregationRule::Sum),
            AggregationRule::Sum
        );
    }

    #[test]
    fn modality_override_takes_precedence() {
        let mut cfg = sample();
        cfg.modality_aggregation_overrides
            .insert("MRI".to_string(), AggregationRule::Max);
        assert_eq!(
            cfg.aggregation_rule_for("MRI", AggregationRule::Sum),
            AggregationRule::Max
        );
    }

    #[test]
    fn no_failover_without_provider_and_pool() {
        let mut cfg = sample();
        assert!(!cfg.has_failover());
        cfg.failover_provider = Some("bandwidth".into());
        assert!(!cfg.has_failover(), "empty pool still disables failover");
        cfg.failover_phone_numbers.push("+15559876543".into());
        assert!(cfg.has_failover());
    }
}
