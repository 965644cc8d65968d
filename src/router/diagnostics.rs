use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use super::error::ResolveError;
use super::resolver::{CacheStats, ConnectionResolver};
use crate::client::{ClientFactory, DataClient};
use crate::registry::EffectivePoolHints;
use crate::secrets::redact_endpoint;

/// Result of a connectivity probe against a tenant data source.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionTestReport {
    pub success: bool,
    pub response_time_ms: u64,
    pub diagnostics: TestDiagnostics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestDiagnostics {
    pub tenant_id: String,
    pub data_source_tenant_id: Option<String>,
    pub served_from_cache: bool,
    pub error_kind: Option<&'static str>,
}

/// Read-only view of a tenant's data source. Carries no credential material.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub endpoint: String,
    pub region: Option<String>,
    pub pool_hints: EffectivePoolHints,
    pub is_cached: bool,
    pub cache_expiry: Option<DateTime<Utc>>,
}

/// Operator-facing introspection over a resolver.
pub struct Diagnostics<F: ClientFactory> {
    resolver: ConnectionResolver<F>,
}

impl<F: ClientFactory> Clone for Diagnostics<F> {
    fn clone(&self) -> Self {
        Self {
            resolver: self.resolver.clone(),
        }
    }
}

impl<F: ClientFactory> Diagnostics<F> {
    pub fn new(resolver: ConnectionResolver<F>) -> Self {
        Self { resolver }
    }

    /// Resolve through the production path and make one round trip. A failed
    /// probe evicts the tenant's client handle so the next request rebuilds it.
    pub async fn test_connection(&self, tenant_id: &str) -> ConnectionTestReport {
        let started = Instant::now();

        let outcome = match self.resolver.get_client_for_tenant(tenant_id, false).await {
            Ok(connection) => {
                let probe = connection.client.ping().await.map_err(ResolveError::from);
                if probe.is_err() {
                    self.resolver.evict_client(tenant_id);
                }
                (Some(connection), probe)
            }
            Err(err) => (None, Err(err)),
        };

        let response_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let (connection, probe) = outcome;

        if let Err(err) = &probe {
            warn!(tenant_id = %tenant_id, kind = err.kind(), "Tenant connection test failed");
        }

        ConnectionTestReport {
            success: probe.is_ok(),
            response_time_ms,
            diagnostics: TestDiagnostics {
                tenant_id: tenant_id.to_string(),
                data_source_tenant_id: connection.as_ref().map(|c| c.data_source_tenant_id.clone()),
                served_from_cache: connection.as_ref().is_some_and(|c| c.from_cache),
                error_kind: probe.as_ref().err().map(ResolveError::kind),
            },
            error: probe.err().map(|e| e.to_string()),
        }
    }

    /// Endpoint, region and pool hints for a tenant. Served from the config
    /// cache when live, otherwise read from the registry without decrypting.
    pub async fn get_connection_info(&self, tenant_id: &str) -> Result<ConnectionInfo, ResolveError> {
        let client_expiry = self.resolver.cached_client_expiry(tenant_id);

        if let Some((config, config_expiry)) = self.resolver.cached_config(tenant_id) {
            return Ok(ConnectionInfo {
                endpoint: redact_endpoint(&config.endpoint),
                region: config.region,
                pool_hints: config.pool.effective(),
                is_cached: true,
                cache_expiry: client_expiry.or(Some(config_expiry)),
            });
        }

        let descriptor = self.resolver.registry().fetch_descriptor(tenant_id).await?;
        Ok(ConnectionInfo {
            endpoint: redact_endpoint(&descriptor.endpoint),
            region: descriptor.region,
            pool_hints: descriptor.pool.effective(),
            is_cached: client_expiry.is_some(),
            cache_expiry: client_expiry,
        })
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.resolver.stats()
    }

    pub fn resolver(&self) -> &ConnectionResolver<F> {
        &self.resolver
    }
}
