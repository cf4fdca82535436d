use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::provider::{ErrorCode, ProviderResult, ProviderStatus, SmsProvider};

/// Twilio-shaped HTTP provider: `POST .../Messages.json` with form-encoded
/// `To`/`From`/`Body`, basic auth via account SID + auth token. Uses one
/// shared `reqwest::Client` for the provider's lifetime and expects a JSON
/// error body on non-2xx responses.
pub struct TwilioProvider {
    http: Client,
    account_sid: String,
    auth_token: String,
    base_url: String,
}

impl TwilioProvider {
    pub fn new(account_sid: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            base_url: "https://api.twilio.com/2010-04-01".to_string(),
        }
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Map a Twilio numeric error code to this system's normalized
    /// taxonomy. Twilio's own code space is much larger; this covers the
    /// ranges that matter for failover/recipient-side classification.
    fn classify(code: i32) -> (ProviderStatus, ErrorCode) {
        match code {
            21610 | 21612 => (ProviderStatus::PermanentFailFailover, ErrorCode::NumberBlocked),
            30007 => (ProviderStatus::PermanentFailFailover, ErrorCode::CarrierViolation),
            20429 | 21611 => (ProviderStatus::PermanentFailFailover, ErrorCode::RateLimited),
            21211 | 21614 => (ProviderStatus::PermanentFailRecipient, ErrorCode::InvalidNumber),
            21602 => (ProviderStatus::PermanentFailRecipient, ErrorCode::InvalidContent),
            30003 | 30005 | 30006 => (ProviderStatus::PermanentFailRecipient, ErrorCode::Undeliverable),
            _ => (ProviderStatus::PermanentFailFailover, ErrorCode::ProviderError),
        }
    }
}

#[derive(Deserialize)]
struct TwilioErrorBody {
    code: i32,
    #[allow(dead_code)]
    message: String,
}

#[async_trait]
impl SmsProvider for TwilioProvider {
    fn name(&self) -> &str {
        "twilio"
    }

    async fn send(&self, to: &str, body: &str, from: &str) -> ProviderResult {
        let url = format!("{}/Accounts/{}/Messages.json", self.base_url, self.account_sid);
        let form = [("To", to), ("From", from), ("Body", body)];

        let resp = match self
            .http
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                return ProviderResult::failure(
                    ProviderStatus::TransientFail,
                    ErrorCode::NetworkError,
                    e.to_string(),
                )
            }
        };

        if resp.status().is_success() {
            return ProviderResult::sent();
        }

        if resp.status().is_server_error() {
            return ProviderResult::failure(
                ProviderStatus::TransientFail,
                ErrorCode::NetworkError,
                resp.status().to_string(),
            );
        }

        match resp.json::<TwilioErrorBody>().await {
            Ok(err) => {
                let (status, code) = Self::classify(err.code);
                ProviderResult::failure(status, code, err.code.to_string())
            }
            Err(_) => ProviderResult::failure(
                ProviderStatus::PermanentFailFailover,
                ErrorCode::ProviderError,
                "unparseable Twilio error body".to_string(),
            ),
        }
    }
}
