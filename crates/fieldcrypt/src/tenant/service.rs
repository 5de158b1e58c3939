//! [`TenantEncryptionService`]: per-tenant key derivation and AEAD of single values.

use std::sync::Arc;

use common::{BlobLayout, ConfigError, DecryptionError, EncryptionError};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::crypto::cipher::{self, CipherError};
use crate::crypto::kdf::KdfError;
use crate::crypto::{KdfConfig, RuntimeKey};

/// Encrypts and decrypts plaintext strings for exactly one tenant.
///
/// The derivation input is `tenant_id (hyphenated text) || runtime_key`, so
/// two tenants sharing a runtime key still derive unrelated keys and cannot
/// read each other's blobs.
///
/// Immutable after construction and safe to share across threads; keep one
/// per tenant (see [`crate::tenant::EncryptionServiceManager`]).
pub struct TenantEncryptionService {
    tenant_id: Uuid,
    runtime_key: RuntimeKey,
    kdf_config: KdfConfig,
    layout: BlobLayout,
}

impl TenantEncryptionService {
    /// Create a service for `tenant_id`. `None` selects [`KdfConfig::default`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::RuntimeKeyTooShort`] if the runtime key is
    /// shorter than 32 bytes.
    pub fn new(
        tenant_id: Uuid,
        runtime_key: RuntimeKey,
        kdf_config: Option<KdfConfig>,
    ) -> Result<Self, ConfigError> {
        runtime_key.ensure_min_len()?;
        let kdf_config = kdf_config.unwrap_or_default();
        let layout = BlobLayout::new(kdf_config.salt_length());
        Ok(Self {
            tenant_id,
            runtime_key,
            kdf_config,
            layout,
        })
    }

    pub fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    pub fn kdf_config(&self) -> &KdfConfig {
        &self.kdf_config
    }

    /// Layout of the blobs this service produces and accepts.
    pub fn layout(&self) -> BlobLayout {
        self.layout
    }

    fn derive_key(&self, salt: &[u8]) -> Result<Zeroizing<Vec<u8>>, KdfError> {
        let tenant = self.tenant_id.hyphenated().to_string();
        let mut material = Zeroizing::new(Vec::with_capacity(
            tenant.len() + self.runtime_key.len(),
        ));
        material.extend_from_slice(tenant.as_bytes());
        material.extend_from_slice(self.runtime_key.as_bytes());
        self.kdf_config.derive(&material, salt)
    }

    /// Encrypt `plaintext` into `salt || nonce || ciphertext+tag`.
    ///
    /// The empty string maps to the empty blob without touching the AEAD.
    /// Every other call draws a fresh salt and nonce, so encrypting the same
    /// value twice yields different blobs.
    ///
    /// # Errors
    ///
    /// Returns [`EncryptionError::KeyDerivation`] or [`EncryptionError::Aead`]
    /// if the backend fails.
    pub fn encrypt(&self, plaintext: &str) -> Result<Vec<u8>, EncryptionError> {
        if plaintext.is_empty() {
            return Ok(Vec::new());
        }

        let salt = cipher::random_bytes(self.layout.salt_len());
        let nonce = cipher::random_nonce();
        let key = self
            .derive_key(&salt)
            .map_err(|e| EncryptionError::KeyDerivation(e.to_string()))?;

        let sealed = cipher::seal(&key, &nonce, plaintext.as_bytes())
            .map_err(|_| EncryptionError::Aead)?;

        Ok(self.layout.assemble(&salt, &nonce, &sealed))
    }

    /// Decrypt a blob produced by [`encrypt`](Self::encrypt) for this tenant.
    ///
    /// The empty blob maps to the empty string.
    ///
    /// # Errors
    ///
    /// - [`DecryptionError::Truncated`] if the blob cannot hold salt and nonce.
    /// - [`DecryptionError::Authentication`] on tag mismatch: another tenant's
    ///   blob, a different runtime key, or corrupted bytes.
    /// - [`DecryptionError::InvalidUtf8`] if the authenticated payload is not text.
    pub fn decrypt(&self, blob: &[u8]) -> Result<String, DecryptionError> {
        if blob.is_empty() {
            return Ok(String::new());
        }

        let parts = self.layout.split(blob)?;
        let key = self
            .derive_key(parts.salt)
            .map_err(|e| DecryptionError::KeyDerivation(e.to_string()))?;

        let plaintext = cipher::open(&key, parts.nonce, parts.sealed).map_err(|e| match e {
            CipherError::AeadFailure => DecryptionError::Authentication,
            CipherError::InvalidKeyLength => DecryptionError::KeyDerivation(e.to_string()),
        })?;

        String::from_utf8(plaintext).map_err(|e| {
            // The bytes passed authentication; wipe them before dropping.
            let mut bytes = e.into_bytes();
            zeroize::Zeroize::zeroize(&mut bytes);
            DecryptionError::InvalidUtf8
        })
    }

    /// [`encrypt`](Self::encrypt) on the Tokio blocking pool.
    ///
    /// Key derivation is CPU and memory hard; call this from async code instead
    /// of blocking a runtime worker. The derivation is not cancellable: if the
    /// returned future is dropped the work still runs to completion.
    ///
    /// # Errors
    ///
    /// As [`encrypt`](Self::encrypt), plus [`EncryptionError::Task`] if the
    /// blocking task panics.
    pub async fn encrypt_async(self: &Arc<Self>, plaintext: String) -> Result<Vec<u8>, EncryptionError> {
        let svc = Arc::clone(self);
        let plaintext = Zeroizing::new(plaintext);
        tokio::task::spawn_blocking(move || svc.encrypt(&plaintext))
            .await
            .map_err(|e| EncryptionError::Task(e.to_string()))?
    }

    /// [`decrypt`](Self::decrypt) on the Tokio blocking pool.
    ///
    /// # Errors
    ///
    /// As [`decrypt`](Self::decrypt), plus [`DecryptionError::Task`] if the
    /// blocking task panics.
    pub async fn decrypt_async(self: &Arc<Self>, blob: Vec<u8>) -> Result<String, DecryptionError> {
        let svc = Arc::clone(self);
        tokio::task::spawn_blocking(move || svc.decrypt(&blob))
            .await
            .map_err(|e| DecryptionError::Task(e.to_string()))?
    }
}

impl std::fmt::Debug for TenantEncryptionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantEncryptionService")
            .field("tenant_id", &self.tenant_id)
            .field("runtime_key", &self.runtime_key)
            .field("kdf_config", &self.kdf_config)
            .finish()
    }
}
