use thiserror::Error;

use crate::client::ConnectError;
use crate::registry::RegistryError;
use crate::secrets::DecryptError;

/// Why a tenant's data source could not be resolved.
///
/// `Clone` because one failed resolution is handed to every caller that
/// joined the same in-flight lookup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// No usable descriptor, or the tenant is not active. Terminal.
    #[error("tenant has no data source configured")]
    NotConfigured,

    /// Credential decryption failed. Terminal for this attempt.
    #[error("credential error: {0}")]
    CredentialError(String),

    /// Registry unreachable. Transient.
    #[error("registry error: {0}")]
    StoreError(String),

    /// Data endpoint unreachable. Transient; never cached.
    #[error("connect error: {0}")]
    ConnectError(String),
}

impl ResolveError {
    /// Stable label for diagnostics output and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ResolveError::NotConfigured => "not_configured",
            ResolveError::CredentialError(_) => "credential_error",
            ResolveError::StoreError(_) => "store_error",
            ResolveError::ConnectError(_) => "connect_error",
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, ResolveError::StoreError(_) | ResolveError::ConnectError(_))
    }
}

impl From<RegistryError> for ResolveError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound => ResolveError::NotConfigured,
            RegistryError::Store(msg) => ResolveError::StoreError(msg),
        }
    }
}

impl From<DecryptError> for ResolveError {
    fn from(err: DecryptError) -> Self {
        ResolveError::CredentialError(err.to_string())
    }
}

impl From<ConnectError> for ResolveError {
    fn from(err: ConnectError) -> Self {
        ResolveError::ConnectError(err.0)
    }
}
