use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Top-level configuration for the scheduling core.
///
/// Loaded once at process start via [`AppConfig::load`] and treated as
/// immutable for the process lifetime (secrets are not hot-reloaded; see
/// ).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Inbound webhook listener configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Admin read-API listener configuration.
    #[serde(default)]
    pub admin: AdminConfig,

    /// Postgres connection configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Conversation-engine timing/retry policy.
    #[serde(default)]
    pub session: SessionConfig,

    /// Interface-engine client configuration.
    #[serde(default)]
    pub ie: IeConfig,

    /// Audit retention policy.
    #[serde(default)]
    pub audit: AuditConfig,

    /// Sweep/monitor intervals.
    #[serde(default)]
    pub sweeps: SweepConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Inbound HTTP listener address (order/SMS/IE-callback webhooks).
    #[serde(default = "default_server_addr")]
    pub http_addr: SocketAddr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Admin read-API listener address.
    #[serde(default = "default_admin_addr")]
    pub addr: SocketAddr,

    /// Enable the admin API.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// CORS allowed origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Bearer token required on every admin request via `Authorization:
    /// Bearer <token>`. `None` disables auth entirely — only sane for local
    /// development, never set in a deployed config.
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres connection URL (`DATABASE_URL`).
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Maximum pool connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// Timing/retry policy for the conversation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Absolute session lifetime, `SESSION_TTL_HOURS` (default 24).
    #[serde(default = "default_session_ttl_hours")]
    pub ttl_hours: i64,

    /// `SLOT_RESPONSE_SLA_SECONDS` (default 90).
    #[serde(default = "default_slot_sla_seconds")]
    pub slot_response_sla_seconds: i64,

    /// `SLOT_MAX_RETRIES` (default 1).
    #[serde(default = "default_slot_max_retries")]
    pub slot_max_retries: i32,

    /// `BOOKING_SLA_SECONDS` (default 30).
    #[serde(default = "default_booking_sla_seconds")]
    pub booking_sla_seconds: i64,

    /// Maximum unrecognized replies at a given state before the engine
    /// gives up and cancels (default 3: "after three unrecognized
    /// replies").
    #[serde(default = "default_max_unrecognized_replies")]
    pub max_unrecognized_replies: i32,

    /// Default booking-aggregation rule; this is the fallback when no
    /// modality-specific override is configured.
    #[serde(default)]
    pub default_aggregation_rule: AggregationRule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationRule {
    /// Aggregate duration = sum of per-procedure estimated durations.
    Sum,
    /// Aggregate duration = max of per-procedure estimated durations.
    Max,
}

impl Default for AggregationRule {
    fn default() -> Self {
        Self::Sum
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IeConfig {
    /// Base URL of the interface engine's REST facade.
    #[serde(default = "default_ie_base_url")]
    pub base_url: String,

    /// `IE_TIMEOUT_MS` (default 5000).
    #[serde(default = "default_ie_timeout_ms")]
    pub timeout_ms: u64,

    /// Transport-level retry attempts (default 3).
    #[serde(default = "default_ie_retry_attempts")]
    pub retry_attempts: u32,

    /// Base backoff delay in milliseconds (default 2000 -> 2s/4s/8s).
    #[serde(default = "default_ie_retry_base_ms")]
    pub retry_base_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// `AUDIT_RETENTION_DAYS` (default 2555 = 7 years).
    #[serde(default = "default_audit_retention_days")]
    pub retention_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// `EXPIRY_SWEEP_INTERVAL_SECONDS` (default 300, must be <= 300 per
    /// ).
    #[serde(default = "default_expiry_sweep_interval")]
    pub expiry_sweep_interval_seconds: u64,

    /// `STUCK_MONITOR_INTERVAL_SECONDS` (default 60, must be <= 60 per
    /// ).
    #[serde(default = "default_stuck_monitor_interval")]
    pub stuck_monitor_interval_seconds: u64,

    /// How often the audit retention sweep runs.
    #[serde(default = "default_retention_sweep_interval")]
    pub retention_sweep_interval_seconds: u64,
}

impl AppConfig {
    /// Load configuration from an optional YAML file plus environment
    /// variables. Env vars are prefixed `RADSCHED_` with `__` as the nesting
    /// separator, e.g. `RADSCHED_SESSION__TTL_HOURS=24`.
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        let mut figment = Figment::new();

        if let Some(path) = config_path {
            figment = figment.merge(Yaml::file(path));
        } else {
            for default_path in &["radsched.yaml", "/etc/radsched/radsched.yaml"] {
                if std::path::Path::new(default_path).exists() {
                    figment = figment.merge(Yaml::file(default_path));
                    break;
                }
            }
        }

        figment = figment.merge(Env::prefixed("RADSCHED_").split("__"));

        let config: Self = figment.extract()?;
        Ok(config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_server_addr(),
        }
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            addr: default_admin_addr(),
            enabled: true,
            cors_origins: vec![],
            api_key: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_session_ttl_hours(),
            slot_response_sla_seconds: default_slot_sla_seconds(),
            slot_max_retries: default_slot_max_retries(),
            booking_sla_seconds: default_booking_sla_seconds(),
            max_unrecognized_replies: default_max_unrecognized_replies(),
            default_aggregation_rule: AggregationRule::default(),
        }
    }
}

impl Default for IeConfig {
    fn default() -> Self {
        Self {
            base_url: default_ie_base_url(),
            timeout_ms: default_ie_timeout_ms(),
            retry_attempts: default_ie_retry_attempts(),
            retry_base_delay_ms: default_ie_retry_base_ms(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            retention_days: default_audit_retention_days(),
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            expiry_sweep_interval_seconds: default_expiry_sweep_interval(),
            stuck_monitor_interval_seconds: default_stuck_monitor_interval(),
            retention_sweep_interval_seconds: default_retention_sweep_interval(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            admin: AdminConfig::default(),
            database: DatabaseConfig::default(),
            session: SessionConfig::default(),
            ie: IeConfig::default(),
            audit: AuditConfig::default(),
            sweeps: SweepConfig::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_server_addr() -> SocketAddr {
    "0.0.0.0:8080".parse().unwrap()
}

fn default_admin_addr() -> SocketAddr {
    "0.0.0.0:8081".parse().unwrap()
}

fn default_database_url() -> String {
    "postgres://localhost/radsched".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_session_ttl_hours() -> i64 {
    24
}

fn default_slot_sla_seconds() -> i64 {
    90
}

fn default_slot_max_retries() -> i32 {
    1
}

fn default_booking_sla_seconds() -> i64 {
    30
}

fn default_max_unrecognized_replies() -> i32 {
    3
}

fn default_ie_base_url() -> String {
    "http://localhost:9090".to_string()
}

fn default_ie_timeout_ms() -> u64 {
    5000
}

fn default_ie_retry_attempts() -> u32 {
    3
}

fn default_ie_retry_base_ms() -> u64 {
    2000
}

fn default_audit_retention_days() -> i64 {
    2555
}

fn default_expiry_sweep_interval() -> u64 {
    300
}

fn default_stuck_monitor_interval() -> u64 {
    60
}

fn default_retention_sweep_interval() -> u64 {
    3600
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.session.ttl_hours, 24);
        assert_eq!(cfg.session.slot_response_sla_seconds, 90);
        assert_eq!(cfg.session.slot_max_retries, 1);
        assert_eq!(cfg.session.booking_sla_seconds, 30);
        assert_eq!(cfg.audit.retention_days, 2555);
        assert_eq!(cfg.sweeps.expiry_sweep_interval_seconds, 300);
        assert_eq!(cfg.sweeps.stuck_monitor_interval_seconds, 60);
        assert_eq!(cfg.session.default_aggregation_rule, AggregationRule::Sum);
    }

    #[test]
    fn load_with_no_file_falls_back_to_env_and_defaults() {
        let cfg = AppConfig::load(None).expect("defaults must always load");
        assert_eq!(cfg.session.ttl_hours, 24);
    }
}
