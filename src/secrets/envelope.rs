use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use chacha20poly1305::aead::Aead;
use chacha20poly1305::{ChaCha20Poly1305, KeyInit, Nonce};
use secrecy::{ExposeSecret, SecretBox};
use thiserror::Error;
use uuid::Uuid;

use super::{Credential, DecryptError, SecretDecryptor};

const ENVELOPE_SCHEME: &str = "enc";
const ENVELOPE_VERSION: &str = "v1";
const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyringError {
    #[error("keyring entry #{0} is not of the form id=base64key")]
    InvalidEntry(usize),

    #[error("key '{0}' is not valid base64")]
    InvalidEncoding(String),

    #[error("key '{key_id}' must be 32 bytes, got {len}")]
    InvalidLength { key_id: String, len: usize },

    #[error("key id '{0}' contains ':' or whitespace")]
    InvalidKeyId(String),

    #[error("active key id '{0}' is not present in the keyring")]
    MissingActiveKey(String),
}

/// Versioned symmetric keys. Envelopes name the key id they were sealed
/// with, so retired versions stay decryptable while they remain listed.
pub struct Keyring {
    active_key_id: String,
    keys: HashMap<String, SecretBox<[u8; KEY_LEN]>>,
}

impl Keyring {
    pub fn new(active_key_id: impl Into<String>) -> Self {
        Self {
            active_key_id: active_key_id.into(),
            keys: HashMap::new(),
        }
    }

    pub fn with_key(mut self, key_id: impl Into<String>, key: [u8; KEY_LEN]) -> Self {
        self.keys.insert(key_id.into(), SecretBox::new(Box::new(key)));
        self
    }

    /// Parse `id=base64key,id2=base64key` (url-safe or standard alphabet).
    pub fn parse(active_key_id: &str, encoded: &str) -> Result<Self, KeyringError> {
        let mut keyring = Self::new(active_key_id.trim());

        let entries = encoded.split(',').map(str::trim).filter(|e| !e.is_empty());
        for (index, entry) in entries.enumerate() {
            let (key_id, material) = entry
                .split_once('=')
                .map(|(id, key)| (id.trim(), key.trim()))
                .ok_or(KeyringError::InvalidEntry(index))?;

            if key_id.is_empty() || key_id.contains(':') || key_id.contains(char::is_whitespace) {
                return Err(KeyringError::InvalidKeyId(key_id.to_string()));
            }

            let bytes = URL_SAFE_NO_PAD
                .decode(material.as_bytes())
                .or_else(|_| STANDARD.decode(material.as_bytes()))
                .map_err(|_| KeyringError::InvalidEncoding(key_id.to_string()))?;

            let key: [u8; KEY_LEN] = bytes.as_slice().try_into().map_err(|_| KeyringError::InvalidLength {
                key_id: key_id.to_string(),
                len: bytes.len(),
            })?;

            keyring = keyring.with_key(key_id, key);
        }

        if !keyring.is_empty() && !keyring.contains(&keyring.active_key_id) {
            return Err(KeyringError::MissingActiveKey(keyring.active_key_id));
        }

        Ok(keyring)
    }

    pub fn active_key_id(&self) -> &str {
        &self.active_key_id
    }

    pub fn contains(&self, key_id: &str) -> bool {
        self.keys.contains_key(key_id)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn cipher(&self, key_id: &str) -> Result<ChaCha20Poly1305, DecryptError> {
        let key = self
            .keys
            .get(key_id)
            .ok_or_else(|| DecryptError::UnknownKey(key_id.to_string()))?;
        ChaCha20Poly1305::new_from_slice(key.expose_secret()).map_err(|_| DecryptError::Cipher)
    }
}

impl fmt::Debug for Keyring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        ids.sort_unstable();
        f.debug_struct("Keyring")
            .field("active_key_id", &self.active_key_id)
            .field("key_ids", &ids)
            .finish()
    }
}

/// ChaCha20-Poly1305 envelopes of the form
/// `enc:v1:<key_id>:<nonce_b64url>:<ciphertext_b64url>`.
///
/// There is no plaintext passthrough: anything that is not a well-formed
/// envelope sealed under a listed key is a `DecryptError`.
#[derive(Debug)]
pub struct EnvelopeDecryptor {
    keyring: Keyring,
}

impl EnvelopeDecryptor {
    pub fn new(keyring: Keyring) -> Self {
        Self { keyring }
    }

    pub fn keyring(&self) -> &Keyring {
        &self.keyring
    }

    /// Seal plaintext under the active key. Used by operator tooling to
    /// prepare registry values.
    pub fn seal(&self, plaintext: &str) -> Result<String, DecryptError> {
        let key_id = self.keyring.active_key_id();
        let cipher = self.keyring.cipher(key_id)?;

        let nonce_source = Uuid::new_v4();
        let nonce_bytes = &nonce_source.as_bytes()[..NONCE_LEN];
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(nonce_bytes), plaintext.as_bytes())
            .map_err(|_| DecryptError::Cipher)?;

        Ok(format!(
            "{ENVELOPE_SCHEME}:{ENVELOPE_VERSION}:{key_id}:{}:{}",
            URL_SAFE_NO_PAD.encode(nonce_bytes),
            URL_SAFE_NO_PAD.encode(ciphertext)
        ))
    }

    pub fn open(&self, envelope: &str) -> Result<Credential, DecryptError> {
        let mut parts = envelope.trim().split(':');
        let scheme = parts.next().unwrap_or_default();
        if scheme != ENVELOPE_SCHEME {
            return Err(DecryptError::NotAnEnvelope);
        }

        let version = parts.next().unwrap_or_default();
        if version != ENVELOPE_VERSION {
            return Err(DecryptError::UnsupportedVersion(version.to_string()));
        }

        let (Some(key_id), Some(nonce_b64), Some(ciphertext_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(DecryptError::Malformed("expected five ':' separated fields"));
        };

        let cipher = self.keyring.cipher(key_id)?;

        let nonce = URL_SAFE_NO_PAD
            .decode(nonce_b64.as_bytes())
            .map_err(|_| DecryptError::Malformed("nonce is not base64"))?;
        if nonce.len() != NONCE_LEN {
            return Err(DecryptError::Malformed("nonce length"));
        }
        let ciphertext = URL_SAFE_NO_PAD
            .decode(ciphertext_b64.as_bytes())
            .map_err(|_| DecryptError::Malformed("payload is not base64"))?;

        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce), ciphertext.as_ref())
            .map_err(|_| DecryptError::Authentication)?;

        String::from_utf8(plaintext)
            .map(Credential::new)
            .map_err(|_| DecryptError::InvalidUtf8)
    }
}

#[async_trait]
impl SecretDecryptor for EnvelopeDecryptor {
    async fn decrypt(&self, cipher_material: &str) -> Result<Credential, DecryptError> {
        self.open(cipher_material)
    }
}
