use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::cache::{TierStats, TtlCache};
use super::error::ResolveError;
use super::mapper::{mapped_id, TenantScope};
use super::resolved::ResolvedConfig;
use crate::client::ClientFactory;
use crate::config::CacheConfig;
use crate::registry::TenantRegistry;
use crate::secrets::{redact_endpoint, SecretDecryptor};

/// Client handles may outlive the config they were built from by at most this
/// factor, bounding how long a rotated credential stays in use.
pub const MAX_CLIENT_TTL_MULTIPLIER: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverSettings {
    config_ttl: Duration,
    client_ttl: Duration,
}

impl ResolverSettings {
    /// `client_ttl` is clamped to `config_ttl * MAX_CLIENT_TTL_MULTIPLIER`.
    pub fn new(config_ttl: Duration, client_ttl: Duration) -> Self {
        let ceiling = config_ttl.saturating_mul(MAX_CLIENT_TTL_MULTIPLIER);
        Self {
            config_ttl,
            client_ttl: client_ttl.min(ceiling),
        }
    }

    pub fn config_ttl(&self) -> Duration {
        self.config_ttl
    }

    pub fn client_ttl(&self) -> Duration {
        self.client_ttl
    }
}

impl From<&CacheConfig> for ResolverSettings {
    fn from(config: &CacheConfig) -> Self {
        Self::new(config.config_ttl(), config.client_ttl())
    }
}

/// A ready-to-use client for one tenant plus the identifier its rows carry.
pub struct TenantConnection<C> {
    pub client: Arc<C>,
    pub data_source_tenant_id: String,
    pub from_cache: bool,
}

impl<C> TenantConnection<C> {
    pub fn scope(&self) -> TenantScope {
        TenantScope::new(self.data_source_tenant_id.clone())
    }
}

impl<C> Clone for TenantConnection<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            data_source_tenant_id: self.data_source_tenant_id.clone(),
            from_cache: self.from_cache,
        }
    }
}

impl<C> fmt::Debug for TenantConnection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantConnection")
            .field("data_source_tenant_id", &self.data_source_tenant_id)
            .field("from_cache", &self.from_cache)
            .finish_non_exhaustive()
    }
}

/// Entry counts and hit rates for every resolver tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub config: TierStats,
    pub client: TierStats,
    pub connectors: TierStats,
    pub in_flight: usize,
}

struct ClientEntry<C> {
    client: Arc<C>,
    data_source_tenant_id: String,
    fingerprint: String,
}

impl<C> ClientEntry<C> {
    fn to_connection(&self, from_cache: bool) -> TenantConnection<C> {
        TenantConnection {
            client: Arc::clone(&self.client),
            data_source_tenant_id: self.data_source_tenant_id.clone(),
            from_cache,
        }
    }
}

impl<C> Clone for ClientEntry<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            data_source_tenant_id: self.data_source_tenant_id.clone(),
            fingerprint: self.fingerprint.clone(),
        }
    }
}

type Resolution<C> = Result<TenantConnection<C>, ResolveError>;
type SharedResolution<C> = Shared<BoxFuture<'static, Resolution<C>>>;

/// Generation a resolution started under. Invalidation bumps it, and results
/// from an older generation are returned to their waiters but not cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Epoch {
    global: u64,
    tenant: u64,
}

struct Flight<C> {
    id: u64,
    future: SharedResolution<C>,
}

/// Per-tenant generation, kept only while a resolution task for the tenant
/// is still running. Once none is, no captured epoch can be compared against
/// it and the slot is dropped.
#[derive(Debug, Default)]
struct TenantSlot {
    epoch: u64,
    running: usize,
}

struct FlightTable<C> {
    next_id: u64,
    global_epoch: u64,
    tenants: HashMap<String, TenantSlot>,
    flights: HashMap<String, Flight<C>>,
}

impl<C> FlightTable<C> {
    fn new() -> Self {
        Self {
            next_id: 0,
            global_epoch: 0,
            tenants: HashMap::new(),
            flights: HashMap::new(),
        }
    }

    fn epoch(&self, tenant_id: &str) -> Epoch {
        Epoch {
            global: self.global_epoch,
            tenant: self.tenants.get(tenant_id).map_or(0, |slot| slot.epoch),
        }
    }

    /// Supersede running resolutions for the tenant. Without one running
    /// there is nothing to supersede and nothing is recorded.
    fn bump(&mut self, tenant_id: &str) {
        if let Some(slot) = self.tenants.get_mut(tenant_id) {
            slot.epoch += 1;
        }
        self.flights.remove(tenant_id);
    }

    fn task_started(&mut self, tenant_id: &str) {
        self.tenants.entry(tenant_id.to_string()).or_default().running += 1;
    }

    fn task_finished(&mut self, tenant_id: &str, flight_id: u64) {
        if self.flights.get(tenant_id).is_some_and(|flight| flight.id == flight_id) {
            self.flights.remove(tenant_id);
        }
        if let Some(slot) = self.tenants.get_mut(tenant_id) {
            slot.running = slot.running.saturating_sub(1);
            if slot.running == 0 {
                self.tenants.remove(tenant_id);
            }
        }
    }
}

struct Inner<F: ClientFactory> {
    registry: Arc<dyn TenantRegistry>,
    decryptor: Arc<dyn SecretDecryptor>,
    factory: F,
    settings: ResolverSettings,
    configs: TtlCache<ResolvedConfig>,
    clients: TtlCache<ClientEntry<F::Client>>,
    connectors: TtlCache<Arc<F::Client>>,
    flights: Mutex<FlightTable<F::Client>>,
}

/// Resolves a tenant id to a cached data client.
///
/// Cheap to clone; clones share caches and the in-flight registry. Construct
/// one per process and inject it, or one per test for isolation.
pub struct ConnectionResolver<F: ClientFactory> {
    inner: Arc<Inner<F>>,
}

impl<F: ClientFactory> Clone for ConnectionResolver<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: ClientFactory> ConnectionResolver<F> {
    pub fn new(
        registry: Arc<dyn TenantRegistry>,
        decryptor: Arc<dyn SecretDecryptor>,
        factory: F,
        settings: ResolverSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                decryptor,
                factory,
                settings,
                configs: TtlCache::new(),
                clients: TtlCache::new(),
                connectors: TtlCache::new(),
                flights: Mutex::new(FlightTable::new()),
            }),
        }
    }

    /// Return the tenant's client and mapped data-source id.
    ///
    /// A live client-cache hit returns without locking. Misses for the same
    /// tenant coalesce into one resolution that runs to completion even if
    /// every caller goes away. `force_refresh` discards cached state first.
    pub async fn get_client_for_tenant(
        &self,
        tenant_id: &str,
        force_refresh: bool,
    ) -> Result<TenantConnection<F::Client>, ResolveError> {
        if !force_refresh {
            if let Some(entry) = self.inner.clients.get(tenant_id) {
                return Ok(entry.to_connection(true));
            }
        }

        let resolution = self.inner.join_or_start(tenant_id, force_refresh);
        resolution.await
    }

    /// Evict both tiers for a tenant, e.g. after a credential rotation. Any
    /// resolution already in flight will not repopulate the cache.
    pub fn invalidate(&self, tenant_id: &str) -> bool {
        let evicted = {
            let mut table = self.inner.lock_flights();
            table.bump(tenant_id);
            self.inner.evict_tenant(tenant_id)
        };
        info!(tenant_id = %tenant_id, evicted, "Invalidated tenant connection cache");
        evicted
    }

    pub fn invalidate_all(&self) {
        {
            let mut table = self.inner.lock_flights();
            table.global_epoch += 1;
            table.flights.clear();
            self.inner.configs.clear();
            self.inner.clients.clear();
            self.inner.connectors.clear();
        }
        info!("Invalidated all tenant connection caches");
    }

    /// Drop the tenant's client handle but keep its resolved config.
    pub fn evict_client(&self, tenant_id: &str) -> bool {
        match self.inner.clients.invalidate(tenant_id) {
            Some(entry) => {
                self.inner.connectors.invalidate(&entry.fingerprint);
                true
            }
            None => false,
        }
    }

    pub fn purge_expired(&self) -> usize {
        self.inner.purge_expired()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            config: self.inner.configs.stats(),
            client: self.inner.clients.stats(),
            connectors: self.inner.connectors.stats(),
            in_flight: self.inner.lock_flights().flights.len(),
        }
    }

    pub fn settings(&self) -> ResolverSettings {
        self.inner.settings
    }

    pub fn registry(&self) -> &Arc<dyn TenantRegistry> {
        &self.inner.registry
    }

    pub(crate) fn cached_config(&self, tenant_id: &str) -> Option<(ResolvedConfig, DateTime<Utc>)> {
        self.inner.configs.peek(tenant_id)
    }

    #[cfg(test)]
    pub(crate) fn tracked_tenants(&self) -> usize {
        self.inner.lock_flights().tenants.len()
    }

    pub(crate) fn cached_client_expiry(&self, tenant_id: &str) -> Option<DateTime<Utc>> {
        self.inner.clients.peek(tenant_id).map(|(_, expiry)| expiry)
    }

    /// Periodically purge expired entries. Stops once every resolver clone
    /// has been dropped.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let inner = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                let removed = inner.purge_expired();
                if removed > 0 {
                    debug!(removed, "Swept expired tenant cache entries");
                }
            }
        })
    }
}

impl<F: ClientFactory> Inner<F> {
    fn lock_flights(&self) -> MutexGuard<'_, FlightTable<F::Client>> {
        self.flights.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn join_or_start(self: &Arc<Self>, tenant_id: &str, force_refresh: bool) -> SharedResolution<F::Client> {
        let mut table = self.lock_flights();

        if force_refresh {
            table.bump(tenant_id);
            self.evict_tenant(tenant_id);
        } else {
            if let Some(flight) = table.flights.get(tenant_id) {
                debug!(tenant_id = %tenant_id, "Joining in-flight tenant resolution");
                return flight.future.clone();
            }
            // A flight may have completed between the lock-free check and here.
            if let Some((entry, _)) = self.clients.peek(tenant_id) {
                return futures::future::ready(Ok(entry.to_connection(true))).boxed().shared();
            }
        }

        table.task_started(tenant_id);
        let epoch = table.epoch(tenant_id);
        table.next_id += 1;
        let flight_id = table.next_id;

        let inner = Arc::clone(self);
        let tenant = tenant_id.to_string();
        let task = tokio::spawn(async move {
            let _guard = FlightGuard {
                inner: Arc::clone(&inner),
                tenant_id: tenant.clone(),
                flight_id,
            };
            inner.resolve(&tenant, epoch).await
        });

        let future = async move {
            match task.await {
                Ok(result) => result,
                Err(join_error) => {
                    error!(error = %join_error, "Tenant resolution task failed");
                    Err(ResolveError::ConnectError("resolution task aborted".to_string()))
                }
            }
        }
        .boxed()
        .shared();

        table.flights.insert(
            tenant_id.to_string(),
            Flight {
                id: flight_id,
                future: future.clone(),
            },
        );
        future
    }

    async fn resolve(&self, tenant_id: &str, epoch: Epoch) -> Resolution<F::Client> {
        let result = self.resolve_uncached(tenant_id, epoch).await;
        if let Err(err) = &result {
            log_failure(tenant_id, err);
        }
        result
    }

    async fn resolve_uncached(&self, tenant_id: &str, epoch: Epoch) -> Resolution<F::Client> {
        let config = match self.configs.get(tenant_id) {
            Some(config) => config,
            None => {
                let config = self.load_config(tenant_id).await?;
                self.store_if_current(tenant_id, epoch, || {
                    self.configs.set(tenant_id, config.clone(), self.settings.config_ttl)
                });
                config
            }
        };

        let fingerprint = config.fingerprint();
        let client = match self.connectors.get(&fingerprint) {
            Some(client) => client,
            None => {
                let client = Arc::new(self.factory.connect(&config).await?);
                let cached = self.store_if_current(tenant_id, epoch, || {
                    self.connectors
                        .set(fingerprint.clone(), Arc::clone(&client), self.settings.client_ttl)
                });
                info!(
                    tenant_id = %tenant_id,
                    endpoint = %redact_endpoint(&config.endpoint),
                    cached,
                    "Built tenant data connector"
                );
                client
            }
        };

        let entry = ClientEntry {
            client,
            data_source_tenant_id: mapped_id(tenant_id, config.foreign_tenant_id.as_deref()),
            fingerprint,
        };
        let cached = self.store_if_current(tenant_id, epoch, || {
            self.clients.set(tenant_id, entry.clone(), self.settings.client_ttl)
        });
        if !cached {
            debug!(tenant_id = %tenant_id, "Resolution superseded by invalidation; result not cached");
        }

        Ok(entry.to_connection(false))
    }

    async fn load_config(&self, tenant_id: &str) -> Result<ResolvedConfig, ResolveError> {
        let descriptor = self.registry.fetch_descriptor(tenant_id).await?;

        let read_credential = self.decryptor.decrypt(&descriptor.encrypted_read_credential).await?;
        let write_credential = match descriptor.encrypted_write_credential.as_deref() {
            Some(sealed) => Some(self.decryptor.decrypt(sealed).await?),
            None => None,
        };

        debug!(tenant_id = %tenant_id, "Resolved tenant data-source config");
        Ok(ResolvedConfig::new(
            descriptor,
            read_credential,
            write_credential,
            self.settings.config_ttl,
        ))
    }

    /// Run `store` only if no invalidation happened since `epoch` was taken.
    /// Holding the flight lock makes the check and the write atomic with
    /// respect to `invalidate`.
    fn store_if_current(&self, tenant_id: &str, epoch: Epoch, store: impl FnOnce()) -> bool {
        let table = self.lock_flights();
        if table.epoch(tenant_id) != epoch {
            return false;
        }
        store();
        true
    }

    fn evict_tenant(&self, tenant_id: &str) -> bool {
        let client = self.clients.invalidate(tenant_id);
        let config = self.configs.invalidate(tenant_id);
        if let Some(entry) = &client {
            self.connectors.invalidate(&entry.fingerprint);
        }
        client.is_some() || config.is_some()
    }

    fn purge_expired(&self) -> usize {
        self.configs.purge_expired() + self.clients.purge_expired() + self.connectors.purge_expired()
    }
}

/// Clears this flight's registry entry when the resolution task ends,
/// including by panic.
struct FlightGuard<F: ClientFactory> {
    inner: Arc<Inner<F>>,
    tenant_id: String,
    flight_id: u64,
}

impl<F: ClientFactory> Drop for FlightGuard<F> {
    fn drop(&mut self) {
        self.inner.lock_flights().task_finished(&self.tenant_id, self.flight_id);
    }
}

fn log_failure(tenant_id: &str, err: &ResolveError) {
    match err {
        ResolveError::NotConfigured => {
            debug!(tenant_id = %tenant_id, "Tenant has no usable data source")
        }
        err if err.is_transient() => {
            warn!(tenant_id = %tenant_id, kind = err.kind(), error = %err, "Tenant resolution failed")
        }
        err => {
            error!(tenant_id = %tenant_id, kind = err.kind(), error = %err, "Tenant resolution failed")
        }
    }
}
