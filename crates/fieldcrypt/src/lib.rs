//! Tenant-scoped field-level encryption.
//!
//! Sensitive values are sealed with AES-256-GCM under keys derived per tenant
//! and per value from `tenant_id || runtime_key` (Argon2id by default,
//! PBKDF2-HMAC-SHA256 as a fallback). Blobs are self-describing:
//! `salt || nonce || ciphertext+tag`.
//!
//! - [`crypto`]: KDF configuration, runtime key, AEAD primitives.
//! - [`tenant`]: per-tenant services and the process-wide manager.
//! - [`field`]: explicit get/set/delete over encrypted model attributes.
//! - [`model`]: tenant-scoped records built on [`field`].

pub mod config;
pub mod crypto;
pub mod field;
pub mod model;
pub mod telemetry;
pub mod tenant;

pub use common::{ConfigError, DecryptionError, EncryptedRecord, EncryptionError, Error};
pub use crypto::{KdfAlgorithm, KdfConfig, RuntimeKey};
pub use field::{EncryptedField, FieldError, FieldSlot, FieldValue};
pub use model::{bind_from_manager, EncryptedModel, IpAddressRecord, ModelError};
pub use tenant::{EncryptionServiceManager, TenantEncryptionService};
