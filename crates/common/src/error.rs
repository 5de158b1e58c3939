//! Error taxonomy exposed to collaborators of the encryption layer.
//!
//! Three classes:
//! - [`ConfigError`]: static misconfiguration, raised at construction, never retried.
//! - [`DecryptionError`]: data-level failure; the field accessor treats it as
//!   "no value", direct callers must handle it explicitly.
//! - [`EncryptionError`]: failures on the encrypt path (KDF or AEAD).
//!
//! None of the messages carry plaintext, key material, or blob contents.

use thiserror::Error;

/// Static misconfiguration of the KDF or runtime key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The runtime key is shorter than the required minimum.
    #[error("runtime key must be at least {min} bytes, got {got}")]
    RuntimeKeyTooShort { min: usize, got: usize },

    /// The runtime key could not be decoded from its textual form.
    #[error("runtime key is not valid base64: {0}")]
    InvalidRuntimeKey(String),

    /// The requested KDF algorithm is not one of the supported set.
    #[error("unsupported KDF algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The KDF backend rejected the configured cost parameters.
    #[error("invalid KDF parameters: {0}")]
    InvalidKdfParams(String),

    /// The derived key length does not match the cipher key size.
    #[error("derived key length must be {expected} bytes, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    /// The salt is too short for the KDF.
    #[error("salt length must be at least {min} bytes, got {got}")]
    InvalidSaltLength { min: usize, got: usize },
}

/// A blob could not be turned back into plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecryptionError {
    /// The blob is too short to contain the salt and nonce.
    #[error("blob too short: expected at least {min} bytes, got {got}")]
    Truncated { min: usize, got: usize },

    /// AEAD tag verification failed (wrong tenant, wrong key, or tampering).
    #[error("authentication failed")]
    Authentication,

    /// The authenticated plaintext is not valid UTF-8.
    #[error("decrypted payload is not valid UTF-8")]
    InvalidUtf8,

    /// Key derivation for the embedded salt failed.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// The blocking task running the decryption did not complete.
    #[error("decryption task failed: {0}")]
    Task(String),
}

/// A plaintext value could not be encrypted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncryptionError {
    /// Key derivation for the fresh salt failed.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// The AEAD primitive reported a failure.
    #[error("aead operation failed")]
    Aead,

    /// The blocking task running the encryption did not complete.
    #[error("encryption task failed: {0}")]
    Task(String),
}

/// Umbrella error for callers that handle every class in one place.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Decryption(#[from] DecryptionError),

    #[error(transparent)]
    Encryption(#[from] EncryptionError),
}

impl Error {
    /// Short machine-readable label for logs and metrics.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "config_error",
            Error::Decryption(_) => "decryption_error",
            Error::Encryption(_) => "encryption_error",
        }
    }

    /// Whether the failure is data-level and may be handled by treating the
    /// value as absent. Configuration and encryption failures are not.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Decryption(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes() {
        assert_eq!(
            Error::from(ConfigError::UnsupportedAlgorithm("scrypt".into())).code(),
            "config_error"
        );
        assert_eq!(
            Error::from(DecryptionError::Authentication).code(),
            "decryption_error"
        );
        assert_eq!(Error::from(EncryptionError::Aead).code(), "encryption_error");
    }

    #[test]
    fn only_decryption_is_recoverable() {
        assert!(Error::from(DecryptionError::InvalidUtf8).is_recoverable());
        assert!(!Error::from(ConfigError::RuntimeKeyTooShort { min: 32, got: 5 }).is_recoverable());
        assert!(!Error::from(EncryptionError::Aead).is_recoverable());
    }

    #[test]
    fn display_includes_lengths() {
        let e = ConfigError::RuntimeKeyTooShort { min: 32, got: 5 };
        assert_eq!(e.to_string(), "runtime key must be at least 32 bytes, got 5");

        let e = DecryptionError::Truncated { min: 44, got: 3 };
        assert!(e.to_string().contains("44"));
    }
}
