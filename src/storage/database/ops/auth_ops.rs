//! Tenant, environment, and API key persistence operations

use crate::core::models::{ApiKey, Environment, KeyStatus, Tenant, TenantStatus};
use crate::storage::database::Database;
use crate::storage::database::entities::{api_key, environment, tenant};
use crate::utils::error::{FleetError, Result};
use chrono::Utc;
use sea_orm::{ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter};

fn tenant_from_row(row: tenant::Model) -> Tenant {
    Tenant {
        id: row.id,
        name: row.name,
        status: if row.status == "suspended" {
            TenantStatus::Suspended
        } else {
            TenantStatus::Active
        },
        rps_override: row.rps_override.map(|v| v.max(0) as u32),
        tokens_per_minute_override: row.tokens_per_minute_override.map(|v| v.max(0) as u64),
        created_at: row.created_at.with_timezone(&Utc),
    }
}

fn environment_from_row(row: environment::Model) -> Environment {
    Environment {
        id: row.id,
        tenant_id: row.tenant_id,
        name: row.name,
        region_preference: row.region_preference,
        rps_override: row.rps_override.map(|v| v.max(0) as u32),
        created_at: row.created_at.with_timezone(&Utc),
    }
}

fn api_key_from_row(row: api_key::Model) -> ApiKey {
    ApiKey {
        id: row.id,
        fingerprint: row.fingerprint,
        environment_id: row.environment_id,
        status: if row.status == "revoked" {
            KeyStatus::Revoked
        } else {
            KeyStatus::Active
        },
        rps_override: row.rps_override.map(|v| v.max(0) as u32),
        concurrency_override: row.concurrency_override.map(|v| v.max(0) as u32),
        created_at: row.created_at.with_timezone(&Utc),
    }
}

impl Database {
    /// Resolve a key fingerprint to its full principal chain
    ///
    /// Returns the key, its environment, and the owning tenant, or None when
    /// no key carries the fingerprint.
    pub async fn find_principal_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<(ApiKey, Environment, Tenant)>> {
        let Some(key_row) = api_key::Entity::find()
            .filter(api_key::Column::Fingerprint.eq(fingerprint))
            .one(&self.db)
            .await
            .map_err(FleetError::Database)?
        else {
            return Ok(None);
        };

        let env_row = environment::Entity::find_by_id(key_row.environment_id)
            .one(&self.db)
            .await
            .map_err(FleetError::Database)?
            .ok_or_else(|| {
                FleetError::internal(format!(
                    "API key {} references missing environment",
                    key_row.id
                ))
            })?;

        let tenant_row = tenant::Entity::find_by_id(env_row.tenant_id)
            .one(&self.db)
            .await
            .map_err(FleetError::Database)?
            .ok_or_else(|| {
                FleetError::internal(format!(
                    "Environment {} references missing tenant",
                    env_row.id
                ))
            })?;

        Ok(Some((
            api_key_from_row(key_row),
            environment_from_row(env_row),
            tenant_from_row(tenant_row),
        )))
    }

    /// Insert a tenant
    pub async fn insert_tenant(&self, t: &Tenant) -> Result<()> {
        let row = tenant::Model {
            id: t.id,
            name: t.name.clone(),
            status: match t.status {
                TenantStatus::Active => "active".to_string(),
                TenantStatus::Suspended => "suspended".to_string(),
            },
            rps_override: t.rps_override.map(|v| v as i32),
            tokens_per_minute_override: t.tokens_per_minute_override.map(|v| v as i64),
            created_at: t.created_at.fixed_offset(),
        };
        tenant::Entity::insert(row.into_active_model())
            .exec(&self.db)
            .await
            .map_err(FleetError::Database)?;
        Ok(())
    }

    /// Insert an environment
    pub async fn insert_environment(&self, e: &Environment) -> Result<()> {
        let row = environment::Model {
            id: e.id,
            tenant_id: e.tenant_id,
            name: e.name.clone(),
            region_preference: e.region_preference.clone(),
            rps_override: e.rps_override.map(|v| v as i32),
            created_at: e.created_at.fixed_offset(),
        };
        environment::Entity::insert(row.into_active_model())
            .exec(&self.db)
            .await
            .map_err(FleetError::Database)?;
        Ok(())
    }

    /// Insert an API key record (fingerprint only)
    pub async fn insert_api_key(&self, k: &ApiKey) -> Result<()> {
        let row = api_key::Model {
            id: k.id,
            fingerprint: k.fingerprint.clone(),
            environment_id: k.environment_id,
            status: match k.status {
                KeyStatus::Active => "active".to_string(),
                KeyStatus::Revoked => "revoked".to_string(),
            },
            rps_override: k.rps_override.map(|v| v as i32),
            concurrency_override: k.concurrency_override.map(|v| v as i32),
            created_at: k.created_at.fixed_offset(),
        };
        api_key::Entity::insert(row.into_active_model())
            .exec(&self.db)
            .await
            .map_err(FleetError::Database)?;
        Ok(())
    }
}
