pub mod envelope;

use std::fmt;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

pub use envelope::{EnvelopeDecryptor, Keyring, KeyringError};

/// Decrypted credential material for a tenant data source.
///
/// Wraps a `SecretString` so the plaintext never reaches logs, `Debug` output
/// or a serializer. There is deliberately no `Display` or `Serialize` impl.
#[derive(Clone)]
pub struct Credential(SecretString);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::from(value.into()))
    }

    /// Expose the plaintext. Only connectors and fingerprinting should call this.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

/// Errors from credential decryption. Messages never include cipher material.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecryptError {
    #[error("credential is not a sealed envelope")]
    NotAnEnvelope,

    #[error("unsupported envelope version: {0}")]
    UnsupportedVersion(String),

    #[error("credential sealed under unknown key id: {0}")]
    UnknownKey(String),

    #[error("malformed envelope: {0}")]
    Malformed(&'static str),

    #[error("credential failed authentication")]
    Authentication,

    #[error("decrypted credential is not valid utf-8")]
    InvalidUtf8,

    #[error("cipher initialization failed")]
    Cipher,
}

/// Turns at-rest-encrypted access keys into usable credentials.
///
/// Kept behind a trait so the encryption scheme (local keyring, KMS) can change
/// without touching the resolver.
#[async_trait]
pub trait SecretDecryptor: Send + Sync {
    async fn decrypt(&self, cipher_material: &str) -> Result<Credential, DecryptError>;
}

/// Strip everything secret-bearing from a data-source endpoint: userinfo,
/// query string and fragment. Unparseable endpoints are replaced wholesale.
pub fn redact_endpoint(endpoint: &str) -> String {
    let Ok(mut url) = url::Url::parse(endpoint) else {
        return "[unparseable endpoint]".to_string();
    };
    if url.cannot_be_a_base() {
        return "[unparseable endpoint]".to_string();
    }
    // Both setters only fail for cannot-be-a-base URLs, excluded above.
    let _ = url.set_username("");
    let _ = url.set_password(None);
    url.set_query(None);
    url.set_fragment(None);
    url.to_string()
}
