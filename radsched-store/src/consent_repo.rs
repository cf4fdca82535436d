use chrono::Utc;
use radsched_core::consent::{Consent, ConsentMethod};
use radsched_core::ids::PhoneHash;
use sqlx::postgres::PgPool;

use crate::error::StoreError;

#[derive(Clone)]
pub struct ConsentRepo {
    pool: PgPool,
}

impl ConsentRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(
        &self,
        organization_id: &str,
        phone_hash: &PhoneHash,
    ) -> Result<Option<Consent>, StoreError> {
        let row = sqlx::query_as::<_, ConsentRow>(
            "SELECT * FROM consents WHERE organization_id = $1 AND phone_hash = $2",
        )
        .bind(organization_id)
        .bind(&phone_hash.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Record a fresh grant, overwriting any prior consent row for this
    /// recipient — a new grant always supersedes a prior revocation.
    pub async fn grant(
        &self,
        phone_hash: &PhoneHash,
        organization_id: &str,
        method: ConsentMethod,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO consents (organization_id, phone_hash, granted, method, granted_at, revoked_at)
            VALUES ($1, $2, true, $3, $4, NULL)
            ON CONFLICT (organization_id, phone_hash) DO UPDATE SET
                granted = true, method = $3, granted_at = $4, revoked_at = NULL
            "#,
        )
        .bind(organization_id)
        .bind(&phone_hash.0)
        .bind(method_str(method))
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn revoke(
        &self,
        phone_hash: &PhoneHash,
        organization_id: &str,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE consents SET granted = false, revoked_at = $1 WHERE organization_id = $2 AND phone_hash = $3",
        )
        .bind(now)
        .bind(organization_id)
        .bind(&phone_hash.0)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn method_str(m: ConsentMethod) -> &'static str {
    match m {
        ConsentMethod::SmsReply => "SMS_REPLY",
        ConsentMethod::Prior => "PRIOR",
    }
}

#[derive(sqlx::FromRow)]
struct ConsentRow {
    phone_hash: String,
    organization_id: String,
    granted: bool,
    method: String,
    granted_at: chrono::DateTime<Utc>,
    revoked_at: Option<chrono::DateTime<Utc>>,
}

impl From<ConsentRow> for Consent {
    fn from(r: ConsentRow) -> Self {
        Consent {
            phone_hash: PhoneHash(r.phone_hash),
            organization_id: r.organization_id,
            granted: r.granted,
            method: match r.method.as_str() {
                "SMS_REPLY" => ConsentMethod::SmsReply,
                _ => ConsentMethod::Prior,
            },
            granted_at: r.granted_at,
            revoked_at: r.revoked_at,
        }
    }
}
