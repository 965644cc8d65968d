use std::env;
use std::time::Duration;

use secrecy::SecretString;
use serde::Serialize;

/// Upper bound on any configured cache TTL.
const MAX_TTL_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub registry: RegistryConfig,
    pub cache: CacheConfig,
    pub connector: ConnectorConfig,
    pub secrets: SecretsConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub url: String,
    /// Overrides any password embedded in `url`.
    pub password: Option<SecretString>,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheConfig {
    pub config_ttl_secs: u64,
    pub client_ttl_secs: u64,
    /// Zero disables the background sweep; expiry is still enforced on read.
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectorConfig {
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct SecretsConfig {
    /// Version id of the key new envelopes are sealed with.
    pub active_key_id: String,
    /// `id=base64key,...`
    pub keys: SecretString,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_request_logging: bool,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub jwt_secret: SecretString,
}

impl CacheConfig {
    pub fn config_ttl(&self) -> Duration {
        Duration::from_secs(self.config_ttl_secs.min(MAX_TTL_SECS))
    }

    pub fn client_ttl(&self) -> Duration {
        Duration::from_secs(self.client_ttl_secs.min(MAX_TTL_SECS))
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source. `from_env` is the process
    /// environment; tests pass a map.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let environment = match lookup("APP_ENV").as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            Some("staging") | Some("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_overrides(lookup)
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn parsed<T: std::str::FromStr>(value: Option<String>, current: T) -> T {
            value.and_then(|v| v.trim().parse().ok()).unwrap_or(current)
        }

        // Registry
        if let Some(v) = lookup("REGISTRY_DATABASE_URL") {
            self.registry.url = v;
        }
        if let Some(v) = lookup("REGISTRY_DATABASE_PASSWORD").filter(|v| !v.is_empty()) {
            self.registry.password = Some(SecretString::from(v));
        }
        self.registry.max_connections = parsed(lookup("REGISTRY_MAX_CONNECTIONS"), self.registry.max_connections);
        self.registry.connect_timeout_secs =
            parsed(lookup("REGISTRY_CONNECT_TIMEOUT_SECS"), self.registry.connect_timeout_secs);

        // Router caches
        self.cache.config_ttl_secs = parsed(lookup("ROUTER_CONFIG_TTL_SECS"), self.cache.config_ttl_secs);
        self.cache.client_ttl_secs = parsed(lookup("ROUTER_CLIENT_TTL_SECS"), self.cache.client_ttl_secs);
        self.cache.sweep_interval_secs =
            parsed(lookup("ROUTER_SWEEP_INTERVAL_SECS"), self.cache.sweep_interval_secs);
        self.connector.connect_timeout_secs =
            parsed(lookup("ROUTER_CONNECT_TIMEOUT_SECS"), self.connector.connect_timeout_secs);

        // Secrets
        if let Some(v) = lookup("TENANT_SECRET_KEY_ID").filter(|v| !v.trim().is_empty()) {
            self.secrets.active_key_id = v.trim().to_string();
        }
        if let Some(v) = lookup("TENANT_SECRET_KEYS") {
            self.secrets.keys = SecretString::from(v);
        }

        // API
        self.api.port = parsed(lookup("API_PORT").or_else(|| lookup("PORT")), self.api.port);
        self.api.enable_request_logging =
            parsed(lookup("API_ENABLE_REQUEST_LOGGING"), self.api.enable_request_logging);

        // Security
        if let Some(v) = lookup("JWT_SECRET") {
            self.security.jwt_secret = SecretString::from(v);
        }

        self
    }

    fn base(environment: Environment) -> Self {
        Self {
            environment,
            registry: RegistryConfig {
                url: "postgres://localhost:5432/tenant_registry".to_string(),
                password: None,
                max_connections: 5,
                connect_timeout_secs: 30,
            },
            cache: CacheConfig {
                config_ttl_secs: 300,
                client_ttl_secs: 900,
                sweep_interval_secs: 60,
            },
            connector: ConnectorConfig {
                connect_timeout_secs: 10,
            },
            secrets: SecretsConfig {
                active_key_id: "v1".to_string(),
                keys: SecretString::from(String::new()),
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: true,
            },
            security: SecurityConfig {
                jwt_secret: SecretString::from(String::new()),
            },
        }
    }

    fn development() -> Self {
        let mut config = Self::base(Environment::Development);
        config.cache.config_ttl_secs = 60;
        config.cache.client_ttl_secs = 180;
        config
    }

    fn staging() -> Self {
        let mut config = Self::base(Environment::Staging);
        config.registry.max_connections = 10;
        config.registry.connect_timeout_secs = 10;
        config
    }

    fn production() -> Self {
        let mut config = Self::base(Environment::Production);
        config.registry.max_connections = 20;
        config.registry.connect_timeout_secs = 5;
        config.connector.connect_timeout_secs = 5;
        config.api.enable_request_logging = false;
        config
    }
}
