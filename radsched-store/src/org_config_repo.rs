use radsched_core::config::AggregationRule;
use radsched_core::org_config::OrganizationSmsConfig;
use sqlx::postgres::PgPool;

use crate::cache::OrgConfigCache;
use crate::error::StoreError;

/// Cache-through repository for [`OrganizationSmsConfig`]. Reads check the
/// cache first; a miss falls through to Postgres and repopulates it.
#[derive(Clone)]
pub struct OrgConfigRepo {
    pool: PgPool,
    cache: OrgConfigCache,
}

impl OrgConfigRepo {
    pub fn new(pool: PgPool, cache: OrgConfigCache) -> Self {
        Self { pool, cache }
    }

    pub async fn get(&self, organization_id: &str) -> Result<Option<OrganizationSmsConfig>, StoreError> {
        if let Some(cached) = self.cache.get(organization_id) {
            return Ok(Some(cached));
        }

        let row = sqlx::query_as::<_, OrgConfigRow>(
            "SELECT * FROM org_sms_config WHERE organization_id = $1",
        )
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };
        let config = row.into_domain()?;
        self.cache.put(config.clone());
        Ok(Some(config))
    }

    pub async fn upsert(&self, config: &OrganizationSmsConfig) -> Result<(), StoreError> {
        let primary_phone_numbers = serde_json::to_value(&config.primary_phone_numbers)?;
        let failover_phone_numbers = serde_json::to_value(&config.failover_phone_numbers)?;
        let overrides = serde_json::to_value(&config.modality_aggregation_overrides)?;
        sqlx::query(
            r#"
            INSERT INTO org_sms_config (
                organization_id, primary_provider, primary_phone_numbers,
                failover_provider, failover_phone_numbers, sticky_sender,
                modality_aggregation_overrides, consent_prompt_template
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
            ON CONFLICT (organization_id) DO UPDATE SET
                primary_provider = $2, primary_phone_numbers = $3,
                failover_provider = $4, failover_phone_numbers = $5,
                sticky_sender = $6, modality_aggregation_overrides = $7,
                consent_prompt_template = $8
            "#,
        )
        .bind(&config.organization_id)
        .bind(&config.primary_provider)
        .bind(primary_phone_numbers)
        .bind(&config.failover_provider)
        .bind(failover_phone_numbers)
        .bind(config.sticky_sender)
        .bind(overrides)
        .bind(&config.consent_prompt_template)
        .execute(&self.pool)
        .await?;

        self.cache.invalidate(&config.organization_id);
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct OrgConfigRow {
    organization_id: String,
    primary_provider: String,
    primary_phone_numbers: serde_json::Value,
    failover_provider: Option<String>,
    failover_phone_numbers: serde_json::Value,
    sticky_sender: bool,
    modality_aggregation_overrides: serde_json::Value,
    consent_prompt_template: Option<String>,
}

impl OrgConfigRow {
    fn into_domain(self) -> Result<OrganizationSmsConfig, StoreError> {
        let primary_phone_numbers: Vec<String> = serde_json::from_value(self.primary_phone_numbers)?;
        let failover_phone_numbers: Vec<String> = serde_json::from_value(self.failover_phone_numbers)?;
        let modality_aggregation_overrides: std::collections::HashMap<String, AggregationRule> =
            serde_json::from_value(self.modality_aggregation_overrides)?;
        Ok(OrganizationSmsConfig {
            organization_id: self.organization_id,
            primary_provider: self.primary_provider,
            primary_phone_numbers,
            failover_provider: self.failover_provider,
            failover_phone_numbers,
            sticky_sender: self.sticky_sender,
            modality_aggregation_overrides,
            consent_prompt_template: self.consent_prompt_template,
        })
    }
}
