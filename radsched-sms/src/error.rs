use thiserror::Error;

#[derive(Error, Debug)]
pub enum SmsError {
    /// No [`radsched_core::OrganizationSmsConfig`] row exists for this
    /// organization — a deployment/config mistake, not a patient-facing
    /// failure.
    #[error("no SMS configuration for organization {0}")]
    OrgConfigNotFound(String),

    /// The backing store was unavailable while loading config, consent, or
    /// writing the audit entry.
    #[error("storage error: {0}")]
    Storage(#[from] radsched_store::StoreError),

    /// Attempted a send outside the consent-exempt whitelist without an
    /// active, granted consent record for this recipient.
    #[error("consent not granted for this recipient")]
    ConsentNotGranted,

    /// No provider registered under the name configured for this
    /// organization's primary or failover pool.
    #[error("no provider registered under the name {0}")]
    ProviderNotRegistered(String),
}
