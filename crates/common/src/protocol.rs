//! Persisted data formats.
//!
//! # Blob layout
//!
//! ```text
//! salt (salt_len bytes) || nonce (12 bytes) || ciphertext || tag (16 bytes)
//! ```
//!
//! This is the only persisted artifact of the encryption layer. It must stay
//! byte-compatible with existing stored data. The empty byte sequence is
//! reserved for the empty string and is never produced by the AEAD.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::DecryptionError;

/// Byte length of an AES-GCM nonce (12 bytes = 96 bits).
pub const NONCE_LEN: usize = 12;

/// Byte length of an AES-GCM authentication tag (16 bytes = 128 bits).
pub const TAG_LEN: usize = 16;

/// Describes the blob layout for a given salt length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobLayout {
    salt_len: usize,
}

/// Borrowed view of the three sections of a blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobParts<'a> {
    pub salt: &'a [u8],
    pub nonce: &'a [u8; NONCE_LEN],
    /// AEAD ciphertext with the tag appended.
    pub sealed: &'a [u8],
}

impl BlobLayout {
    pub const fn new(salt_len: usize) -> Self {
        Self { salt_len }
    }

    pub const fn salt_len(&self) -> usize {
        self.salt_len
    }

    /// Length of the `salt || nonce` prefix.
    pub const fn header_len(&self) -> usize {
        self.salt_len + NONCE_LEN
    }

    /// Total blob length for a plaintext of `plaintext_len` bytes.
    pub const fn blob_len(&self, plaintext_len: usize) -> usize {
        self.header_len() + plaintext_len + TAG_LEN
    }

    /// Split a blob into salt, nonce, and sealed payload.
    ///
    /// Only the header is checked here; a sealed payload shorter than the tag
    /// is left for the AEAD to reject.
    ///
    /// # Errors
    ///
    /// Returns [`DecryptionError::Truncated`] if the blob cannot hold the
    /// salt and nonce.
    pub fn split<'a>(&self, blob: &'a [u8]) -> Result<BlobParts<'a>, DecryptionError> {
        if blob.len() < self.header_len() {
            return Err(DecryptionError::Truncated {
                min: self.header_len(),
                got: blob.len(),
            });
        }
        let (salt, rest) = blob.split_at(self.salt_len);
        let (nonce, sealed) = rest.split_at(NONCE_LEN);
        let nonce: &[u8; NONCE_LEN] = nonce
            .try_into()
            .map_err(|_| DecryptionError::Truncated {
                min: self.header_len(),
                got: blob.len(),
            })?;
        Ok(BlobParts {
            salt,
            nonce,
            sealed,
        })
    }

    /// Concatenate the three sections into a persisted blob.
    pub fn assemble(&self, salt: &[u8], nonce: &[u8; NONCE_LEN], sealed: &[u8]) -> Vec<u8> {
        debug_assert_eq!(salt.len(), self.salt_len);
        let mut blob = Vec::with_capacity(self.header_len() + sealed.len());
        blob.extend_from_slice(salt);
        blob.extend_from_slice(nonce);
        blob.extend_from_slice(sealed);
        blob
    }
}

// ---------------------------------------------------------------------------
// Record dump
// ---------------------------------------------------------------------------

/// An opaque stored blob. Serialised as standard base64.
#[derive(Clone, PartialEq, Eq)]
pub struct StoredBlob(pub Vec<u8>);

impl std::fmt::Debug for StoredBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StoredBlob({} bytes)", self.0.len())
    }
}

impl Serialize for StoredBlob {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for StoredBlob {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD
            .decode(s.as_bytes())
            .map(StoredBlob)
            .map_err(serde::de::Error::custom)
    }
}

/// Persistence-ready view of a tenant-scoped model.
///
/// Encrypted attributes appear only under their storage names and only as
/// blobs; plaintext never reaches this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptedRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Storage field name (e.g. `original_address_encrypted`) to blob.
    pub encrypted: BTreeMap<String, Option<StoredBlob>>,
    /// Non-sensitive attributes, stored as-is.
    pub fields: serde_json::Map<String, serde_json::Value>,
}
