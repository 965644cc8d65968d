use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use super::{RegistryError, TenantRecord, TenantRegistry};

/// In-process registry for local development and tests.
///
/// Counts lookups so callers can assert how often the registry was hit, and
/// can simulate latency or an outage.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    records: RwLock<HashMap<String, TenantRecord>>,
    reads: AtomicUsize,
    unavailable: AtomicBool,
    latency: RwLock<Option<Duration>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = TenantRecord>) -> Self {
        let registry = Self::new();
        for record in records {
            registry.upsert(record);
        }
        registry
    }

    pub fn upsert(&self, record: TenantRecord) {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.id.clone(), record);
    }

    pub fn remove(&self, tenant_id: &str) -> Option<TenantRecord> {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(tenant_id)
    }

    /// Apply an in-place change to a stored record, e.g. a credential rotation.
    pub fn update(&self, tenant_id: &str, change: impl FnOnce(&mut TenantRecord)) -> bool {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        match records.get_mut(tenant_id) {
            Some(record) => {
                change(record);
                true
            }
            None => false,
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write().unwrap_or_else(PoisonError::into_inner) = latency;
    }

    /// Number of `find_record` calls served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TenantRegistry for MemoryRegistry {
    async fn find_record(&self, tenant_id: &str) -> Result<Option<TenantRecord>, RegistryError> {
        self.reads.fetch_add(1, Ordering::SeqCst);

        let latency = *self.latency.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RegistryError::Store("registry offline".to_string()));
        }

        Ok(self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(tenant_id)
            .cloned())
    }

    async fn ping(&self) -> Result<(), RegistryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RegistryError::Store("registry offline".to_string()));
        }
        Ok(())
    }
}
