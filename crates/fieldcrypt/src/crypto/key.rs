//! [`RuntimeKey`]: the process-wide secret mixed into every key derivation.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::ConfigError;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::cipher::random_bytes;

/// Minimum runtime key length in bytes.
pub const MIN_RUNTIME_KEY_LEN: usize = 32;

/// Owned runtime secret.
///
/// The buffer is wiped when dropped. `Debug` never prints key material.
/// Length is not checked here; services enforce [`MIN_RUNTIME_KEY_LEN`].
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct RuntimeKey(Vec<u8>);

impl RuntimeKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Generate [`MIN_RUNTIME_KEY_LEN`] bytes from the OS CSPRNG.
    pub fn generate() -> Self {
        Self(random_bytes(MIN_RUNTIME_KEY_LEN))
    }

    /// Decode a key from standard base64.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRuntimeKey`] if `encoded` is not valid base64.
    pub fn from_base64(encoded: &str) -> Result<Self, ConfigError> {
        STANDARD
            .decode(encoded.trim())
            .map(Self)
            .map_err(|e| ConfigError::InvalidRuntimeKey(e.to_string()))
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fail unless the key meets [`MIN_RUNTIME_KEY_LEN`].
    pub(crate) fn ensure_min_len(&self) -> Result<(), ConfigError> {
        if self.0.len() < MIN_RUNTIME_KEY_LEN {
            return Err(ConfigError::RuntimeKeyTooShort {
                min: MIN_RUNTIME_KEY_LEN,
                got: self.0.len(),
            });
        }
        Ok(())
    }
}

impl From<&[u8]> for RuntimeKey {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl std::fmt::Debug for RuntimeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RuntimeKey([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_is_32_random_bytes() {
        let k1 = RuntimeKey::generate();
        let k2 = RuntimeKey::generate();
        assert_eq!(k1.len(), 32);
        assert_ne!(k1, k2);
    }

    #[test]
    fn base64_round_trip() {
        let key = RuntimeKey::generate();
        let decoded = RuntimeKey::from_base64(&key.to_base64()).unwrap();
        assert_eq!(decoded.as_bytes(), key.as_bytes());
    }

    #[test]
    fn rejects_bad_base64() {
        assert!(matches!(
            RuntimeKey::from_base64("not base64!!"),
            Err(ConfigError::InvalidRuntimeKey(_))
        ));
    }

    #[test]
    fn min_len_enforced() {
        assert!(RuntimeKey::new(vec![0u8; 32]).ensure_min_len().is_ok());
        assert_eq!(
            RuntimeKey::new(b"short".to_vec()).ensure_min_len(),
            Err(ConfigError::RuntimeKeyTooShort { min: 32, got: 5 })
        );
    }

    #[test]
    fn redacted_in_debug() {
        let key = RuntimeKey::new(vec![0x42u8; 32]);
        let rendered = format!("{key:?}");
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains("42"));
    }
}
