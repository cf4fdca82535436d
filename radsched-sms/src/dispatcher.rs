use std::sync::Arc;

use chrono::Utc;
use radsched_core::audit::{AuditEntry, AuditSink, Direction, MessageType};
use radsched_core::ids::{ConversationId, PhoneHash};
use radsched_store::{ConsentRepo, OrgConfigRepo};

use crate::error::SmsError;
use crate::provider::{ErrorCode, ProviderStatus};
use crate::registry::ProviderRegistry;
use crate::sticky::{select_from_number, RoundRobinCounters};

/// Outcome of one [`Dispatcher::send`] call: `{sent_from, provider,
/// failed_over, error_code}`.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub sent_from: String,
    pub provider: String,
    pub failed_over: bool,
    pub error_code: Option<String>,
}

/// Message types that may be sent without a prior granted consent record —
/// the consent prompt itself (how consent is solicited) and the opt-out
/// confirmation (required regardless of consent status once STOP is
/// received).
fn is_consent_exempt(message_type: MessageType) -> bool {
    matches!(message_type, MessageType::ConsentPrompted | MessageType::OptOut)
}

/// Multi-provider SMS dispatcher: sticky/round-robin sender selection,
/// consent enforcement, same-provider retry for transient failures, and
/// failover to a secondary pool for sender-side permanent failures. Writes
/// exactly one [`AuditEntry`] per call that reaches the consent check,
/// regardless of outcome.
#[derive(Clone)]
pub struct Dispatcher {
    org_config: OrgConfigRepo,
    consent: ConsentRepo,
    audit: Arc<dyn AuditSink>,
    registry: ProviderRegistry,
    round_robin: RoundRobinCounters,
}

impl Dispatcher {
    pub fn new(
        org_config: OrgConfigRepo,
        consent: ConsentRepo,
        audit: Arc<dyn AuditSink>,
        registry: ProviderRegistry,
    ) -> Self {
        Self {
            org_config,
            consent,
            audit,
            registry,
            round_robin: RoundRobinCounters::new(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn send(
        &self,
        organization_id: &str,
        conversation_id: Option<ConversationId>,
        phone_hash: &PhoneHash,
        recipient_phone_plaintext: &str,
        body: &str,
        message_type: MessageType,
    ) -> Result<SendOutcome, SmsError> {
        let org = self
            .org_config
            .get(organization_id)
            .await?
            .ok_or_else(|| SmsError::OrgConfigNotFound(organization_id.to_string()))?;

        let consent_status = if is_consent_exempt(message_type) {
            true
        } else {
            let consent = self.consent.get(organization_id, phone_hash).await?;
            consent.map(|c| c.is_active()).unwrap_or(false)
        };

        if !consent_status && !is_consent_exempt(message_type) {
            self.record_audit(
                conversation_id,
                organization_id,
                phone_hash,
                message_type,
                false,
                None,
                false,
                Some("CONSENT_NOT_GRANTED".to_string()),
            )
            .await;
            return Err(SmsError::ConsentNotGranted);
        }

        let primary_from = select_from_number(
            &org.primary_phone_numbers,
            phone_hash,
            org.sticky_sender,
            &self.round_robin,
            &format!("{}:{}", organization_id, org.primary_provider),
        )
        .to_string();

        let primary_provider = self
            .registry
            .get(&org.primary_provider)
            .ok_or_else(|| SmsError::ProviderNotRegistered(org.primary_provider.clone()))?;

        let mut result = primary_provider.send(recipient_phone_plaintext, body, &primary_from).await;

        // Same-provider retry once for a transient failure before
        // considering failover.
        if result.status == ProviderStatus::TransientFail {
            result = primary_provider.send(recipient_phone_plaintext, body, &primary_from).await;
        }

        let (sent_from, provider, failed_over, error_code) = match result.status {
            ProviderStatus::Sent => (primary_from, org.primary_provider.clone(), false, None),
            ProviderStatus::PermanentFailRecipient => {
                (primary_from, org.primary_provider.clone(), false, result.error_code)
            }
            ProviderStatus::TransientFail | ProviderStatus::PermanentFailFailover => {
                if org.has_failover() {
                    let failover_provider_name = org
                        .failover_provider
                        .clone()
                        .expect("has_failover guarantees a failover provider name");
                    let failover_from = select_from_number(
                        &org.failover_phone_numbers,
                        phone_hash,
                        org.sticky_sender,
                        &self.round_robin,
                        &format!("{}:{}", organization_id, failover_provider_name),
                    )
                    .to_string();

                    let failover_provider = self
                        .registry
                        .get(&failover_provider_name)
                        .ok_or_else(|| SmsError::ProviderNotRegistered(failover_provider_name.clone()))?;

                    let failover_result = failover_provider
                        .send(recipient_phone_plaintext, body, &failover_from)
                        .await;

                    match failover_result.status {
                        ProviderStatus::Sent => (failover_from, failover_provider_name, true, None),
                        _ => (
                            failover_from,
                            failover_provider_name,
                            true,
                            failover_result.error_code.or(Some(ErrorCode::ProviderError)),
                        ),
                    }
                } else {
                    (primary_from, org.primary_provider.clone(), false, result.error_code)
                }
            }
        };

        let success = error_code.is_none();
        self.record_audit(
            conversation_id,
            organization_id,
            phone_hash,
            message_type,
            consent_status,
            Some(sent_from.clone()),
            success,
            error_code.map(|c| c.as_str().to_string()),
        )
        .await;

        Ok(SendOutcome {
            sent_from,
            provider,
            failed_over,
            error_code: if success { None } else { error_code_as_string(error_code) },
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn record_audit(
        &self,
        conversation_id: Option<ConversationId>,
        organization_id: &str,
        phone_hash: &PhoneHash,
        message_type: MessageType,
        consent_status: bool,
        from_number: Option<String>,
        success: bool,
        error_code: Option<String>,
    ) {
        let entry = AuditEntry::new_with_from_number(
            conversation_id,
            organization_id,
            phone_hash.clone(),
            message_type,
            Direction::Outbound,
            consent_status,
            from_number,
            success,
            error_code,
            Utc::now(),
        );
        if let Err(e) = self.audit.record(entry).await {
            tracing::error!(error = %e, organization_id, "failed to record outbound SMS audit entry");
        }
    }
}

fn error_code_as_string(code: Option<ErrorCode>) -> Option<String> {
    code.map(|c| c.as_str().to_string())
}
