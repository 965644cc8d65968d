use std::sync::Arc;

use anyhow::Context;
use secrecy::ExposeSecret;
use tracing_subscriber::EnvFilter;

use tenant_router::app::{app, AppState};
use tenant_router::client::PgClientFactory;
use tenant_router::config::AppConfig;
use tenant_router::registry::PgTenantRegistry;
use tenant_router::router::{ConnectionResolver, ResolverSettings};
use tenant_router::secrets::{EnvelopeDecryptor, Keyring};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up REGISTRY_DATABASE_URL, TENANT_SECRET_KEYS, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env();
    tracing::info!(environment = ?config.environment, "Starting tenant router");

    let registry = PgTenantRegistry::connect_lazy(&config.registry).context("invalid registry configuration")?;

    let keyring = Keyring::parse(&config.secrets.active_key_id, config.secrets.keys.expose_secret())
        .context("invalid TENANT_SECRET_KEYS")?;
    if keyring.is_empty() {
        tracing::warn!("TENANT_SECRET_KEYS is empty; every tenant credential will fail to decrypt");
    }
    if config.security.jwt_secret.expose_secret().is_empty() {
        tracing::warn!("JWT_SECRET is empty; every authenticated request will be rejected");
    }

    let settings = ResolverSettings::from(&config.cache);
    tracing::info!(
        config_ttl_secs = settings.config_ttl().as_secs(),
        client_ttl_secs = settings.client_ttl().as_secs(),
        keys = keyring.len(),
        active_key = keyring.active_key_id(),
        "Connection resolver configured"
    );

    let resolver = ConnectionResolver::new(
        Arc::new(registry),
        Arc::new(EnvelopeDecryptor::new(keyring)),
        PgClientFactory::new(&config.connector),
        settings,
    );

    let sweeper = config.cache.sweep_interval().map(|interval| resolver.spawn_sweeper(interval));

    let state = AppState::new(resolver, config.security.jwt_secret.clone())
        .with_request_logging(config.api.enable_request_logging);
    let app = app(state);

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!(addr = %bind_addr, "Tenant router listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    tracing::info!("Tenant router stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
