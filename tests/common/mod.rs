#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;

use tenant_router::app::{app, AppState};
use tenant_router::auth::{generate_jwt, Claims};
use tenant_router::client::{ClientFactory, ConnectError, DataClient};
use tenant_router::registry::{DataSourceDescriptor, MemoryRegistry, PoolHints, TenantRecord, TenantStatus};
use tenant_router::router::{ConnectionResolver, ResolvedConfig, ResolverSettings};
use tenant_router::secrets::{EnvelopeDecryptor, Keyring};

pub const JWT_SECRET: &str = "integration-test-secret";

#[derive(Debug)]
pub struct FakeClient {
    pub credential: String,
    unhealthy: Arc<AtomicBool>,
}

#[async_trait]
impl DataClient for FakeClient {
    async fn ping(&self) -> Result<(), ConnectError> {
        if self.unhealthy.load(Ordering::SeqCst) {
            return Err(ConnectError("connection reset".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeFactory {
    builds: Arc<AtomicUsize>,
    unhealthy: Arc<AtomicBool>,
}

impl FakeFactory {
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn set_unhealthy(&self, unhealthy: bool) {
        self.unhealthy.store(unhealthy, Ordering::SeqCst);
    }
}

#[async_trait]
impl ClientFactory for FakeFactory {
    type Client = FakeClient;

    async fn connect(&self, config: &ResolvedConfig) -> Result<FakeClient, ConnectError> {
        // Long enough for concurrent callers to pile onto one flight.
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(FakeClient {
            credential: config.connector_credential().expose().to_string(),
            unhealthy: Arc::clone(&self.unhealthy),
        })
    }
}

pub fn decryptor() -> EnvelopeDecryptor {
    EnvelopeDecryptor::new(
        Keyring::new("v2")
            .with_key("v1", [0x5a; 32])
            .with_key("v2", [0xa5; 32]),
    )
}

pub fn tenant(id: &str, endpoint: &str, credential: &str, foreign_tenant_id: Option<&str>) -> Result<TenantRecord> {
    Ok(TenantRecord {
        id: id.to_string(),
        name: format!("Tenant {id}"),
        subdomain: None,
        status: Some(TenantStatus::Active),
        data_source: Some(DataSourceDescriptor {
            endpoint: endpoint.to_string(),
            region: Some("eu-west-1".to_string()),
            encrypted_read_credential: decryptor().seal(credential)?,
            encrypted_write_credential: None,
            pool: PoolHints {
                max_connections: Some(20),
                ..PoolHints::default()
            },
            foreign_tenant_id: foreign_tenant_id.map(str::to_string),
        }),
    })
}

pub struct TestApp {
    pub registry: Arc<MemoryRegistry>,
    pub factory: FakeFactory,
    pub resolver: ConnectionResolver<FakeFactory>,
    pub router: Router,
}

impl TestApp {
    pub fn new(records: impl IntoIterator<Item = TenantRecord>) -> Self {
        Self::build(records, true)
    }

    pub fn without_request_logging(records: impl IntoIterator<Item = TenantRecord>) -> Self {
        Self::build(records, false)
    }

    fn build(records: impl IntoIterator<Item = TenantRecord>, request_logging: bool) -> Self {
        let registry = Arc::new(MemoryRegistry::with_records(records));
        let factory = FakeFactory::default();
        let resolver = ConnectionResolver::new(
            registry.clone(),
            Arc::new(decryptor()),
            factory.clone(),
            ResolverSettings::new(Duration::from_secs(300), Duration::from_secs(900)),
        );
        let state = AppState::new(resolver.clone(), SecretString::from(JWT_SECRET.to_string()))
            .with_request_logging(request_logging);
        let router = app(state);

        Self {
            registry,
            factory,
            resolver,
            router,
        }
    }

    pub fn token(&self, tenant: &str, access: &str) -> Result<String> {
        let claims = Claims::new(tenant, "user-1", access, chrono::Duration::hours(1));
        Ok(generate_jwt(&claims, &SecretString::from(JWT_SECRET.to_string()))?)
    }

    /// Send one request through the router and decode the JSON body.
    pub async fn call(&self, method: Method, uri: &str, token: Option<&str>) -> Result<(StatusCode, Value)> {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = request.body(Body::empty())?;

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body = serde_json::from_slice(&bytes).with_context(|| format!("non-JSON body for {uri}"))?;
        Ok((status, body))
    }
}
