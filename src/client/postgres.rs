use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use tracing::info;

use super::{ClientFactory, ConnectError, DataClient};
use crate::config::ConnectorConfig;
use crate::router::ResolvedConfig;
use crate::secrets::redact_endpoint;

/// Connection pool to one tenant data database.
#[derive(Debug, Clone)]
pub struct PgDataClient {
    pool: PgPool,
}

impl PgDataClient {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Pool for tenant-scoped queries. Always pair with the context's
    /// `TenantScope` when filtering rows.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DataClient for PgDataClient {
    async fn ping(&self) -> Result<(), ConnectError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| ConnectError(e.to_string()))
    }
}

/// Opens a sized `PgPool` per endpoint + credential pair.
#[derive(Debug, Clone)]
pub struct PgClientFactory {
    connect_timeout: Duration,
}

impl PgClientFactory {
    pub fn new(config: &ConnectorConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
        }
    }

    fn connect_options(config: &ResolvedConfig) -> Result<PgConnectOptions, ConnectError> {
        let options = PgConnectOptions::from_str(&config.endpoint)
            .map_err(|_| ConnectError(format!("invalid endpoint {}", redact_endpoint(&config.endpoint))))?;
        Ok(options.password(config.connector_credential().expose()))
    }
}

#[async_trait]
impl ClientFactory for PgClientFactory {
    type Client = PgDataClient;

    async fn connect(&self, config: &ResolvedConfig) -> Result<PgDataClient, ConnectError> {
        let options = Self::connect_options(config)?;
        let hints = config.pool.effective();

        let connecting = PgPoolOptions::new()
            .max_connections(hints.max_connections)
            .min_connections(hints.min_connections)
            .acquire_timeout(Duration::from_millis(hints.acquire_timeout_ms))
            .idle_timeout(Duration::from_secs(hints.idle_timeout_secs))
            .connect_with(options);

        // connect_with opens one connection eagerly, so an unreachable
        // endpoint fails here instead of on the first query.
        let pool = tokio::time::timeout(self.connect_timeout, connecting)
            .await
            .map_err(|_| ConnectError(format!("connect timed out after {:?}", self.connect_timeout)))?
            .map_err(|e| ConnectError(e.to_string()))?;

        info!(
            endpoint = %redact_endpoint(&config.endpoint),
            max_connections = hints.max_connections,
            "Created tenant data pool"
        );
        Ok(PgDataClient::new(pool))
    }
}
