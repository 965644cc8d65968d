use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use crate::client::{ClientFactory, ConnectError, DataClient};
use crate::registry::{DataSourceDescriptor, MemoryRegistry, PoolHints, TenantRecord, TenantStatus};
use crate::router::{ConnectionResolver, ResolvedConfig, ResolverSettings};
use crate::secrets::{EnvelopeDecryptor, Keyring};

pub const TEST_KEY_V1: [u8; 32] = [0x11; 32];
pub const TEST_KEY_V2: [u8; 32] = [0x22; 32];

/// Stand-in connector that remembers what it was built from.
#[derive(Debug)]
pub struct FakeClient {
    pub build_number: usize,
    pub endpoint: String,
    pub credential: String,
    unhealthy: Arc<AtomicBool>,
}

#[async_trait]
impl DataClient for FakeClient {
    async fn ping(&self) -> Result<(), ConnectError> {
        if self.unhealthy.load(Ordering::SeqCst) {
            Err(ConnectError("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Default)]
struct FactoryState {
    builds: AtomicUsize,
    refuse: AtomicBool,
    unhealthy: Arc<AtomicBool>,
    latency: RwLock<Option<Duration>>,
}

/// Counting client factory. Clones share counters.
#[derive(Debug, Clone, Default)]
pub struct FakeFactory {
    state: Arc<FactoryState>,
}

impl FakeFactory {
    pub fn builds(&self) -> usize {
        self.state.builds.load(Ordering::SeqCst)
    }

    /// Make `connect` fail, as for an unreachable endpoint.
    pub fn refuse_connections(&self, refuse: bool) {
        self.state.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Make pings on every client (existing and future) fail.
    pub fn set_unhealthy(&self, unhealthy: bool) {
        self.state.unhealthy.store(unhealthy, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.state.latency.write().unwrap_or_else(PoisonError::into_inner) = latency;
    }
}

#[async_trait]
impl ClientFactory for FakeFactory {
    type Client = FakeClient;

    async fn connect(&self, config: &ResolvedConfig) -> Result<FakeClient, ConnectError> {
        let latency = *self.state.latency.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.state.refuse.load(Ordering::SeqCst) {
            return Err(ConnectError("connection refused".to_string()));
        }

        let build_number = self.state.builds.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(FakeClient {
            build_number,
            endpoint: config.endpoint.clone(),
            credential: config.connector_credential().expose().to_string(),
            unhealthy: Arc::clone(&self.state.unhealthy),
        })
    }
}

pub fn keyring(active_key_id: &str) -> Keyring {
    Keyring::new(active_key_id)
        .with_key("v1", TEST_KEY_V1)
        .with_key("v2", TEST_KEY_V2)
}

pub fn decryptor(active_key_id: &str) -> EnvelopeDecryptor {
    EnvelopeDecryptor::new(keyring(active_key_id))
}

pub fn seal(plaintext: &str) -> String {
    decryptor("v1").seal(plaintext).expect("seal under test key")
}

pub fn active_tenant(id: &str, endpoint: &str, read_credential: &str, foreign_tenant_id: Option<&str>) -> TenantRecord {
    TenantRecord {
        id: id.to_string(),
        name: format!("Tenant {id}"),
        subdomain: Some(id.to_ascii_lowercase()),
        status: Some(TenantStatus::Active),
        data_source: Some(DataSourceDescriptor {
            endpoint: endpoint.to_string(),
            region: Some("us-east-1".to_string()),
            encrypted_read_credential: seal(read_credential),
            encrypted_write_credential: None,
            pool: PoolHints::default(),
            foreign_tenant_id: foreign_tenant_id.map(str::to_string),
        }),
    }
}

/// Resolver wired to in-memory collaborators.
pub struct Harness {
    pub registry: Arc<MemoryRegistry>,
    pub factory: FakeFactory,
    pub resolver: ConnectionResolver<FakeFactory>,
}

pub fn harness(records: impl IntoIterator<Item = TenantRecord>, settings: ResolverSettings) -> Harness {
    harness_with_decryptor(records, settings, decryptor("v1"))
}

pub fn harness_with_decryptor(
    records: impl IntoIterator<Item = TenantRecord>,
    settings: ResolverSettings,
    decryptor: EnvelopeDecryptor,
) -> Harness {
    let registry = Arc::new(MemoryRegistry::with_records(records));
    let factory = FakeFactory::default();
    let resolver = ConnectionResolver::new(registry.clone(), Arc::new(decryptor), factory.clone(), settings);
    Harness {
        registry,
        factory,
        resolver,
    }
}

pub fn default_settings() -> ResolverSettings {
    ResolverSettings::new(Duration::from_secs(60), Duration::from_secs(120))
}
