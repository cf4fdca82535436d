use std::collections::HashMap;

use anyhow::{Context, Result};
use radsched_crypto::KeyMaterial;

/// Secrets the process needs, loaded directly from the environment rather
/// than through [`radsched_core::config::AppConfig`]'s figment layering.
/// Per these are never hot-reloaded and never belong in a
/// YAML file that might end up in version control, so they get their own
/// narrow env-only loading path.
pub struct Secrets {
    pub phone_hash_key: KeyMaterial,
    pub phone_enc_key: KeyMaterial,
    pub order_webhook_secret: String,
    pub ie_bearer_token: String,
    /// Provider name -> inbound-webhook signing secret (e.g. a Twilio auth
    /// token), keyed the same way as `OrganizationSmsConfig::primary_provider`.
    pub sms_provider_secrets: HashMap<String, String>,
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
}

impl Secrets {
    pub fn load_from_env() -> Result<Self> {
        let phone_hash_key = KeyMaterial::from_base64(&require_env("RADSCHED_PHONE_HASH_KEY")?)
            .context("RADSCHED_PHONE_HASH_KEY must be 32 bytes, base64-encoded")?;
        let phone_enc_key = KeyMaterial::from_base64(&require_env("RADSCHED_PHONE_ENC_KEY")?)
            .context("RADSCHED_PHONE_ENC_KEY must be 32 bytes, base64-encoded")?;
        let order_webhook_secret = require_env("RADSCHED_ORDER_WEBHOOK_SECRET")?;
        let ie_bearer_token = require_env("RADSCHED_IE_BEARER_TOKEN")?;

        let twilio_auth_token = std::env::var("RADSCHED_TWILIO_AUTH_TOKEN").ok();
        let twilio_account_sid = std::env::var("RADSCHED_TWILIO_ACCOUNT_SID").ok();

        let mut sms_provider_secrets = HashMap::new();
        if let Some(token) = &twilio_auth_token {
            sms_provider_secrets.insert("twilio".to_string(), token.clone());
        }

        Ok(Self {
            phone_hash_key,
            phone_enc_key,
            order_webhook_secret,
            ie_bearer_token,
            sms_provider_secrets,
            twilio_account_sid,
            twilio_auth_token,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("missing required environment variable {key}"))
}
