//! Blob layout, error taxonomy, and record types shared across `fieldcrypt` crates.

pub mod error;
pub mod protocol;

pub use error::{ConfigError, DecryptionError, EncryptionError, Error};
pub use protocol::{BlobLayout, EncryptedRecord, StoredBlob, NONCE_LEN, TAG_LEN};
