pub mod memory;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

pub use memory::MemoryRegistry;
pub use postgres::PgTenantRegistry;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 0;
const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;

/// Errors from the central tenant registry.
///
/// `NotFound` covers a missing row, an inactive tenant and a row without a
/// usable data source. Callers must not be able to tell these apart.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tenant has no data source configured")]
    NotFound,

    #[error("registry unavailable: {0}")]
    Store(String),
}

impl From<sqlx::Error> for RegistryError {
    fn from(err: sqlx::Error) -> Self {
        RegistryError::Store(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Active,
    Suspended,
    Archived,
}

impl TenantStatus {
    /// Unknown status strings yield `None` and are treated as inactive.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Some(TenantStatus::Active),
            "suspended" => Some(TenantStatus::Suspended),
            "archived" => Some(TenantStatus::Archived),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TenantStatus::Active => "active",
            TenantStatus::Suspended => "suspended",
            TenantStatus::Archived => "archived",
        }
    }
}

/// Pool sizing hints carried on a descriptor. Every field is optional;
/// `effective()` fills in the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolHints {
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub acquire_timeout_ms: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EffectivePoolHints {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_ms: u64,
    pub idle_timeout_secs: u64,
}

impl PoolHints {
    pub fn effective(&self) -> EffectivePoolHints {
        let max_connections = self
            .max_connections
            .filter(|max| *max > 0)
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);
        EffectivePoolHints {
            max_connections,
            min_connections: self
                .min_connections
                .unwrap_or(DEFAULT_MIN_CONNECTIONS)
                .min(max_connections),
            acquire_timeout_ms: self.acquire_timeout_ms.unwrap_or(DEFAULT_ACQUIRE_TIMEOUT_MS),
            idle_timeout_secs: self.idle_timeout_secs.unwrap_or(DEFAULT_IDLE_TIMEOUT_SECS),
        }
    }
}

/// Connection information for one tenant's data database, as stored in the
/// registry. Credentials are still sealed at this point.
#[derive(Clone, PartialEq, Eq)]
pub struct DataSourceDescriptor {
    pub endpoint: String,
    pub region: Option<String>,
    pub encrypted_read_credential: String,
    pub encrypted_write_credential: Option<String>,
    pub pool: PoolHints,
    pub foreign_tenant_id: Option<String>,
}

impl fmt::Debug for DataSourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSourceDescriptor")
            .field("endpoint", &crate::secrets::redact_endpoint(&self.endpoint))
            .field("region", &self.region)
            .field("encrypted_read_credential", &"[REDACTED]")
            .field(
                "encrypted_write_credential",
                &self.encrypted_write_credential.as_ref().map(|_| "[REDACTED]"),
            )
            .field("pool", &self.pool)
            .field("foreign_tenant_id", &self.foreign_tenant_id)
            .finish()
    }
}

/// A row of the central tenant registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantRecord {
    pub id: String,
    pub name: String,
    pub subdomain: Option<String>,
    pub status: Option<TenantStatus>,
    pub data_source: Option<DataSourceDescriptor>,
}

/// Read-only access to the central tenant registry.
///
/// Implementations look up exactly one record by primary key. There is no
/// listing or range access.
#[async_trait]
pub trait TenantRegistry: Send + Sync {
    async fn find_record(&self, tenant_id: &str) -> Result<Option<TenantRecord>, RegistryError>;

    /// Lightweight round trip used by health checks.
    async fn ping(&self) -> Result<(), RegistryError>;

    /// Fetch the data-source descriptor of an active tenant.
    async fn fetch_descriptor(&self, tenant_id: &str) -> Result<DataSourceDescriptor, RegistryError> {
        let record = self.find_record(tenant_id).await?;
        usable_descriptor(tenant_id, record)
    }
}

/// Apply the fail-closed policy to a registry lookup. The three rejection
/// causes log differently but collapse into the same `NotFound`.
pub fn usable_descriptor(
    tenant_id: &str,
    record: Option<TenantRecord>,
) -> Result<DataSourceDescriptor, RegistryError> {
    let Some(record) = record else {
        debug!(tenant_id = %tenant_id, "registry lookup: no tenant record");
        return Err(RegistryError::NotFound);
    };

    if record.status != Some(TenantStatus::Active) {
        warn!(
            tenant_id = %tenant_id,
            status = record.status.map(|s| s.as_str()).unwrap_or("unknown"),
            "registry lookup: tenant is not active"
        );
        return Err(RegistryError::NotFound);
    }

    match record.data_source {
        Some(descriptor) if !descriptor.endpoint.trim().is_empty() => Ok(descriptor),
        _ => {
            debug!(tenant_id = %tenant_id, "registry lookup: tenant has no data source");
            Err(RegistryError::NotFound)
        }
    }
}
