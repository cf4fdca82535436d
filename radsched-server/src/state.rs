use std::sync::Arc;

use radsched_audit::metrics::SchedulerMetrics;
use radsched_core::config::SessionConfig;
use radsched_crypto::KeyMaterial;
use radsched_engine::{NoopSafetyCheck, SafetyCheck};
use radsched_ie::IeClient;
use radsched_sms::Dispatcher;
use radsched_store::{AuditRepo, ConsentRepo, ConversationRepo, OrgConfigRepo};

/// Everything an inbound-edge handler needs, assembled once at startup and
/// shared (via `Arc`) across every request.
pub struct AppState {
    /// Raw pool, kept alongside the repositories for the sweep loops'
    /// `pg_try_advisory_lock` single-runner coordination, which operates
    /// below the repository abstraction.
    pub db_pool: sqlx::PgPool,
    pub conversations: ConversationRepo,
    pub consent: ConsentRepo,
    pub org_config: OrgConfigRepo,
    /// Writes the unconditional inbound audit row every webhook handler owes
    /// directly (the dispatcher only ever writes outbound rows).
    pub audit: AuditRepo,
    pub dispatcher: Dispatcher,
    pub ie: IeClient,
    pub session: SessionConfig,
    pub safety: Arc<dyn SafetyCheck>,
    pub metrics: Arc<SchedulerMetrics>,

    /// Derives `phone_hash` — never used to recover a plaintext number.
    pub phone_hash_key: KeyMaterial,
    /// Encrypts/decrypts the phone number held on a [`radsched_core::Conversation`].
    pub phone_enc_key: KeyMaterial,

    /// Shared secret for `POST /orders/webhook`'s `X-Webhook-Signature`
    /// HMAC scheme (the bearer-token alternative is a plain string compare
    /// against this same value).
    pub order_webhook_secret: String,
    /// Bearer token the interface engine presents on both HL7 webhooks.
    pub ie_bearer_token: String,
    /// Per-provider signing secrets for inbound SMS webhook verification,
    /// keyed by provider name (e.g. "twilio" -> auth token).
    pub sms_provider_secrets: std::collections::HashMap<String, String>,
}

impl AppState {
    pub fn default_safety() -> Arc<dyn SafetyCheck> {
        Arc::new(NoopSafetyCheck)
    }
}
