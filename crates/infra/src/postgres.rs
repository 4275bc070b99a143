//! Postgres store backend over `sqlx`.
//!
//! Uses the runtime query API with explicit binds and row mapping so the
//! crate builds without a live database. Schema lives in
//! `migrations/0001_init.sql`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use gatekeeper_core::{
    DomainError, DomainResult, Permission, Role, Tenant, TenantId, TenantStatus, TenantStore,
    User, UserId, UserStatus, UserStore,
};

fn map_err(e: sqlx::Error) -> DomainError {
    match e {
        sqlx::Error::RowNotFound => DomainError::NotFound,
        other => DomainError::store(other.to_string()),
    }
}

fn parse_tenant_status(s: &str) -> DomainResult<TenantStatus> {
    match s {
        "active" => Ok(TenantStatus::Active),
        "inactive" => Ok(TenantStatus::Inactive),
        "suspended" => Ok(TenantStatus::Suspended),
        other => Err(DomainError::store(format!("unknown tenant status: {other}"))),
    }
}

fn parse_user_status(s: &str) -> DomainResult<UserStatus> {
    match s {
        "active" => Ok(UserStatus::Active),
        "suspended" => Ok(UserStatus::Suspended),
        other => Err(DomainError::store(format!("unknown user status: {other}"))),
    }
}

fn tenant_from_row(row: &PgRow) -> DomainResult<Tenant> {
    let status: String = row.try_get("status").map_err(map_err)?;
    Ok(Tenant {
        id: TenantId::from_uuid(row.try_get::<Uuid, _>("id").map_err(map_err)?),
        slug: row.try_get("slug").map_err(map_err)?,
        domain: row.try_get("domain").map_err(map_err)?,
        name: row.try_get("name").map_err(map_err)?,
        status: parse_tenant_status(&status)?,
        plan: row.try_get("plan").map_err(map_err)?,
        max_users: row.try_get::<i32, _>("max_users").map_err(map_err)? as u32,
        max_storage_mb: row.try_get::<i64, _>("max_storage_mb").map_err(map_err)? as u64,
        expires_at: row
            .try_get::<Option<DateTime<Utc>>, _>("expires_at")
            .map_err(map_err)?,
        created_at: row.try_get("created_at").map_err(map_err)?,
        updated_at: row.try_get("updated_at").map_err(map_err)?,
    })
}

fn user_from_row(row: &PgRow) -> DomainResult<User> {
    let status: String = row.try_get("status").map_err(map_err)?;
    let roles: Vec<String> = row.try_get("roles").map_err(map_err)?;
    let permissions: Option<Vec<String>> = row.try_get("permissions").map_err(map_err)?;
    let tenant_ids: Vec<Uuid> = row.try_get("tenant_ids").map_err(map_err)?;
    Ok(User {
        id: UserId::from_uuid(row.try_get::<Uuid, _>("id").map_err(map_err)?),
        name: row.try_get("name").map_err(map_err)?,
        email: row.try_get("email").map_err(map_err)?,
        password_hash: row.try_get("password_hash").map_err(map_err)?,
        is_landlord: row.try_get("is_landlord").map_err(map_err)?,
        roles: roles.into_iter().map(Role::new).collect(),
        permissions: permissions.map(|p| p.into_iter().map(Permission::new).collect()),
        tenant_id: row
            .try_get::<Option<Uuid>, _>("tenant_id")
            .map_err(map_err)?
            .map(TenantId::from_uuid),
        tenant_ids: tenant_ids.into_iter().map(TenantId::from_uuid).collect(),
        status: parse_user_status(&status)?,
        created_at: row.try_get("created_at").map_err(map_err)?,
        updated_at: row.try_get("updated_at").map_err(map_err)?,
    })
}

const TENANT_COLUMNS: &str = "id, slug, domain, name, status, plan, max_users, max_storage_mb, \
     expires_at, created_at, updated_at";

const USER_COLUMNS: &str = "id, name, email, password_hash, is_landlord, roles, permissions, \
     tenant_id, tenant_ids, status, created_at, updated_at";

/// Postgres-backed tenant store.
#[derive(Clone)]
pub struct PgTenantStore {
    pool: PgPool,
}

impl PgTenantStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantStore for PgTenantStore {
    async fn get(&self, id: TenantId) -> DomainResult<Tenant> {
        let row = sqlx::query(&format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)?;
        tenant_from_row(&row)
    }

    async fn get_by_slug(&self, slug: &str) -> DomainResult<Tenant> {
        let row = sqlx::query(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenants WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_one(&self.pool)
        .await
        .map_err(map_err)?;
        tenant_from_row(&row)
    }

    async fn get_by_domain(&self, domain: &str) -> DomainResult<Tenant> {
        let row = sqlx::query(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenants WHERE domain = $1"
        ))
        .bind(domain)
        .fetch_one(&self.pool)
        .await
        .map_err(map_err)?;
        tenant_from_row(&row)
    }

    async fn list_active(&self) -> DomainResult<Vec<Tenant>> {
        let rows = sqlx::query(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenants WHERE status = 'active' ORDER BY slug"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;
        rows.iter().map(tenant_from_row).collect()
    }

    async fn count(&self) -> DomainResult<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM tenants")
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(row.try_get::<i64, _>("n").map_err(map_err)? as u64)
    }

    async fn count_active(&self) -> DomainResult<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM tenants WHERE status = 'active'")
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(row.try_get::<i64, _>("n").map_err(map_err)? as u64)
    }

    async fn user_count(&self, id: TenantId) -> DomainResult<u64> {
        let row =
            sqlx::query("SELECT COUNT(*) AS n FROM users WHERE tenant_id = $1 OR $1 = ANY(tenant_ids)")
                .bind(id.as_uuid())
                .fetch_one(&self.pool)
                .await
                .map_err(map_err)?;
        Ok(row.try_get::<i64, _>("n").map_err(map_err)? as u64)
    }

    async fn insert(&self, tenant: Tenant) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO tenants (id, slug, domain, name, status, plan, max_users, \
             max_storage_mb, expires_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(tenant.id.as_uuid())
        .bind(&tenant.slug)
        .bind(&tenant.domain)
        .bind(&tenant.name)
        .bind(tenant.status.to_string())
        .bind(&tenant.plan)
        .bind(tenant.max_users as i32)
        .bind(tenant.max_storage_mb as i64)
        .bind(tenant.expires_at)
        .bind(tenant.created_at)
        .bind(tenant.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn update(&self, tenant: Tenant) -> DomainResult<()> {
        let result = sqlx::query(
            "UPDATE tenants SET slug = $2, domain = $3, name = $4, status = $5, plan = $6, \
             max_users = $7, max_storage_mb = $8, expires_at = $9, updated_at = $10 \
             WHERE id = $1",
        )
        .bind(tenant.id.as_uuid())
        .bind(&tenant.slug)
        .bind(&tenant.domain)
        .bind(&tenant.name)
        .bind(tenant.status.to_string())
        .bind(&tenant.plan)
        .bind(tenant.max_users as i32)
        .bind(tenant.max_storage_mb as i64)
        .bind(tenant.expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: TenantId) -> DomainResult<()> {
        let owned = self.user_count(id).await?;
        if owned > 0 {
            return Err(DomainError::conflict(format!(
                "tenant still owns {owned} users"
            )));
        }
        let result = sqlx::query("DELETE FROM tenants WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound);
        }
        Ok(())
    }
}

/// Postgres-backed user store.
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn get(&self, id: UserId) -> DomainResult<User> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)?;
        user_from_row(&row)
    }

    async fn find_by_email(&self, email: &str) -> DomainResult<User> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(map_err)?;
        user_from_row(&row)
    }

    async fn count(&self) -> DomainResult<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(row.try_get::<i64, _>("n").map_err(map_err)? as u64)
    }

    async fn count_landlords(&self) -> DomainResult<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM users WHERE is_landlord")
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(row.try_get::<i64, _>("n").map_err(map_err)? as u64)
    }

    async fn count_members(&self, tenant_id: TenantId) -> DomainResult<u64> {
        let row =
            sqlx::query("SELECT COUNT(*) AS n FROM users WHERE tenant_id = $1 OR $1 = ANY(tenant_ids)")
                .bind(tenant_id.as_uuid())
                .fetch_one(&self.pool)
                .await
                .map_err(map_err)?;
        Ok(row.try_get::<i64, _>("n").map_err(map_err)? as u64)
    }

    async fn insert(&self, user: User) -> DomainResult<()> {
        let roles: Vec<String> = user.roles.iter().map(|r| r.as_str().to_string()).collect();
        let permissions: Option<Vec<String>> = user
            .permissions
            .as_ref()
            .map(|ps| ps.iter().map(|p| p.as_str().to_string()).collect());
        let tenant_ids: Vec<Uuid> = user.tenant_ids.iter().map(|t| *t.as_uuid()).collect();

        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, is_landlord, roles, \
             permissions, tenant_id, tenant_ids, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(user.id.as_uuid())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_landlord)
        .bind(&roles)
        .bind(&permissions)
        .bind(user.tenant_id.map(|t| *t.as_uuid()))
        .bind(&tenant_ids)
        .bind(match user.status {
            UserStatus::Active => "active",
            UserStatus::Suspended => "suspended",
        })
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn update(&self, user: User) -> DomainResult<()> {
        let roles: Vec<String> = user.roles.iter().map(|r| r.as_str().to_string()).collect();
        let permissions: Option<Vec<String>> = user
            .permissions
            .as_ref()
            .map(|ps| ps.iter().map(|p| p.as_str().to_string()).collect());
        let tenant_ids: Vec<Uuid> = user.tenant_ids.iter().map(|t| *t.as_uuid()).collect();

        let result = sqlx::query(
            "UPDATE users SET name = $2, email = $3, password_hash = $4, is_landlord = $5, \
             roles = $6, permissions = $7, tenant_id = $8, tenant_ids = $9, status = $10, \
             updated_at = $11 WHERE id = $1",
        )
        .bind(user.id.as_uuid())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_landlord)
        .bind(&roles)
        .bind(&permissions)
        .bind(user.tenant_id.map(|t| *t.as_uuid()))
        .bind(&tenant_ids)
        .bind(match user.status {
            UserStatus::Active => "active",
            UserStatus::Suspended => "suspended",
        })
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound);
        }
        Ok(())
    }
}
