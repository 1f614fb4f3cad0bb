//! Tenant CRUD operations.

use sqlx::{SqliteExecutor, SqlitePool};

use crate::error::{DatabaseError, Result};
use crate::models::{NewTenant, Tenant, TenantUpdate, DEFAULT_SYSTEM_PROMPT};

const TENANT_COLUMNS: &str = "id, phone_id, wh_token, system_prompt, created_at, updated_at";

fn map_unique_violation(e: sqlx::Error, id: &str, phone_id: Option<&str>) -> DatabaseError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_unique_violation() {
            return match phone_id {
                Some(phone_id) if db_err.message().contains("phone_id") => {
                    DatabaseError::AlreadyExists {
                        entity: "Tenant phone_id",
                        id: phone_id.to_string(),
                    }
                }
                _ => DatabaseError::AlreadyExists {
                    entity: "Tenant",
                    id: id.to_string(),
                },
            };
        }
    }
    DatabaseError::Sqlx(e)
}

/// Create a new tenant.
pub async fn create_tenant(pool: &SqlitePool, tenant: &NewTenant) -> Result<Tenant> {
    let system_prompt = tenant
        .system_prompt
        .as_deref()
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);

    sqlx::query_as::<_, Tenant>(&format!(
        r#"
        INSERT INTO tenants (id, phone_id, wh_token, system_prompt)
        VALUES (?, ?, ?, ?)
        RETURNING {TENANT_COLUMNS}
        "#
    ))
    .bind(&tenant.id)
    .bind(&tenant.phone_id)
    .bind(&tenant.wh_token)
    .bind(system_prompt)
    .fetch_one(pool)
    .await
    .map_err(|e| map_unique_violation(e, &tenant.id, Some(&tenant.phone_id)))
}

/// Get a tenant by ID.
pub async fn get_tenant<'e, E>(executor: E, id: &str) -> Result<Tenant>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, Tenant>(&format!(
        "SELECT {TENANT_COLUMNS} FROM tenants WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Tenant",
        id: id.to_string(),
    })
}

/// Resolve the tenant that owns a WhatsApp phone-number identifier.
pub async fn get_tenant_by_phone_id<'e, E>(executor: E, phone_id: &str) -> Result<Option<Tenant>>
where
    E: SqliteExecutor<'e>,
{
    let tenant = sqlx::query_as::<_, Tenant>(&format!(
        "SELECT {TENANT_COLUMNS} FROM tenants WHERE phone_id = ?"
    ))
    .bind(phone_id)
    .fetch_optional(executor)
    .await?;

    Ok(tenant)
}

/// List all tenants ordered by ID.
pub async fn list_tenants(pool: &SqlitePool) -> Result<Vec<Tenant>> {
    let tenants = sqlx::query_as::<_, Tenant>(&format!(
        "SELECT {TENANT_COLUMNS} FROM tenants ORDER BY id"
    ))
    .fetch_all(pool)
    .await?;

    Ok(tenants)
}

/// Apply a partial update and return the stored tenant.
pub async fn update_tenant(pool: &SqlitePool, id: &str, update: &TenantUpdate) -> Result<Tenant> {
    sqlx::query_as::<_, Tenant>(&format!(
        r#"
        UPDATE tenants
        SET phone_id = COALESCE(?, phone_id),
            wh_token = COALESCE(?, wh_token),
            system_prompt = COALESCE(?, system_prompt),
            updated_at = datetime('now')
        WHERE id = ?
        RETURNING {TENANT_COLUMNS}
        "#
    ))
    .bind(&update.phone_id)
    .bind(&update.wh_token)
    .bind(&update.system_prompt)
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| map_unique_violation(e, id, update.phone_id.as_deref()))?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Tenant",
        id: id.to_string(),
    })
}

/// Delete a tenant. Messages and FAQs cascade.
pub async fn delete_tenant(pool: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM tenants WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Tenant",
            id: id.to_string(),
        });
    }

    Ok(())
}
