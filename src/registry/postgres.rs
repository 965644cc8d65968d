use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{FromRow, PgPool};
use tracing::info;

use super::{DataSourceDescriptor, PoolHints, RegistryError, TenantRecord, TenantRegistry, TenantStatus};
use crate::config::RegistryConfig;

/// Registry lookups always go through the primary key; no listing query exists.
const FIND_TENANT_SQL: &str = r#"
    SELECT
        id, name, subdomain, status,
        endpoint, region,
        encrypted_read_credential, encrypted_write_credential,
        pool_max_connections, pool_min_connections,
        pool_acquire_timeout_ms, pool_idle_timeout_secs,
        foreign_tenant_id
    FROM tenants
    WHERE id = $1
"#;

#[derive(Debug, FromRow)]
struct TenantRow {
    id: String,
    name: String,
    subdomain: Option<String>,
    status: String,
    endpoint: Option<String>,
    region: Option<String>,
    encrypted_read_credential: Option<String>,
    encrypted_write_credential: Option<String>,
    pool_max_connections: Option<i32>,
    pool_min_connections: Option<i32>,
    pool_acquire_timeout_ms: Option<i64>,
    pool_idle_timeout_secs: Option<i64>,
    foreign_tenant_id: Option<String>,
}

impl From<TenantRow> for TenantRecord {
    fn from(row: TenantRow) -> Self {
        let pool = PoolHints {
            max_connections: row.pool_max_connections.and_then(|v| u32::try_from(v).ok()),
            min_connections: row.pool_min_connections.and_then(|v| u32::try_from(v).ok()),
            acquire_timeout_ms: row.pool_acquire_timeout_ms.and_then(|v| u64::try_from(v).ok()),
            idle_timeout_secs: row.pool_idle_timeout_secs.and_then(|v| u64::try_from(v).ok()),
        };

        // A descriptor needs at least an endpoint and a read credential.
        let data_source = match (row.endpoint, row.encrypted_read_credential) {
            (Some(endpoint), Some(read)) if !read.trim().is_empty() => Some(DataSourceDescriptor {
                endpoint,
                region: row.region,
                encrypted_read_credential: read,
                encrypted_write_credential: row.encrypted_write_credential.filter(|w| !w.trim().is_empty()),
                pool,
                foreign_tenant_id: row.foreign_tenant_id,
            }),
            _ => None,
        };

        TenantRecord {
            id: row.id,
            name: row.name,
            subdomain: row.subdomain,
            status: TenantStatus::parse(&row.status),
            data_source,
        }
    }
}

/// Central registry backed by the catalog Postgres database.
#[derive(Clone)]
pub struct PgTenantRegistry {
    pool: PgPool,
}

impl PgTenantRegistry {
    /// Build the registry pool lazily so the service can start while the
    /// catalog is unreachable; lookups then fail with `Store`.
    pub fn connect_lazy(config: &RegistryConfig) -> Result<Self, RegistryError> {
        let mut options = PgConnectOptions::from_str(&config.url)
            .map_err(|e| RegistryError::Store(format!("invalid registry url: {e}")))?;
        if let Some(password) = &config.password {
            options = options.password(password.expose_secret());
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect_lazy_with(options);

        info!(max_connections = config.max_connections, "Created tenant registry pool");
        Ok(Self { pool })
    }
}

#[async_trait]
impl TenantRegistry for PgTenantRegistry {
    async fn find_record(&self, tenant_id: &str) -> Result<Option<TenantRecord>, RegistryError> {
        let row = sqlx::query_as::<_, TenantRow>(FIND_TENANT_SQL)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(TenantRecord::from))
    }

    async fn ping(&self) -> Result<(), RegistryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
