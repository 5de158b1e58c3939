//! Cryptographic primitives: key derivation, AES-256-GCM, and the runtime key.
//!
//! This module knows nothing about tenants or models. It is used by
//! [`crate::tenant`] to build per-tenant services.
//!
//! # Blob format
//!
//! ```text
//! salt (salt_length) || nonce (12) || ciphertext || tag (16)
//! ```
//!
//! See [`common::protocol`] for the layout helpers.

pub mod cipher;
pub mod kdf;
pub mod key;

pub use cipher::KEY_LEN;
pub use kdf::{KdfAlgorithm, KdfConfig, PBKDF2_ITERATIONS};
pub use key::{RuntimeKey, MIN_RUNTIME_KEY_LEN};
