//! Key derivation: Argon2id (default) or PBKDF2-HMAC-SHA256.
//!
//! The algorithm set is closed and both backends are compiled in, so the only
//! way to request an unavailable KDF is by name, which fails at construction
//! with [`ConfigError::UnsupportedAlgorithm`].

use std::fmt;
use std::str::FromStr;

use argon2::{Algorithm, Argon2, Params, Version};
use common::ConfigError;
use hmac::Hmac;
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroizing;

use super::cipher::KEY_LEN;

/// Fixed PBKDF2 iteration count. Time/memory/parallelism settings do not apply.
pub const PBKDF2_ITERATIONS: u32 = 600_000;

/// Smallest salt Argon2 accepts; applied to both algorithms.
pub const MIN_SALT_LEN: usize = 8;

/// A derivation failed inside the KDF backend.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct KdfError(String);

/// Supported key-derivation algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KdfAlgorithm {
    #[default]
    Argon2id,
    Pbkdf2HmacSha256,
}

impl KdfAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            KdfAlgorithm::Argon2id => "argon2id",
            KdfAlgorithm::Pbkdf2HmacSha256 => "pbkdf2",
        }
    }
}

impl fmt::Display for KdfAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KdfAlgorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "argon2id" => Ok(KdfAlgorithm::Argon2id),
            "pbkdf2" | "pbkdf2-hmac-sha256" => Ok(KdfAlgorithm::Pbkdf2HmacSha256),
            other => Err(ConfigError::UnsupportedAlgorithm(other.to_owned())),
        }
    }
}

/// Which KDF to run and with which parameters. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KdfConfig {
    algorithm: KdfAlgorithm,
    time_cost: u32,
    memory_cost_kib: u32,
    parallelism: u32,
    salt_length: usize,
    key_length: usize,
}

impl Default for KdfConfig {
    /// Argon2id, t=3, m=64 MiB, p=1, 32-byte salt, 32-byte key.
    fn default() -> Self {
        Self {
            algorithm: KdfAlgorithm::Argon2id,
            time_cost: 3,
            memory_cost_kib: 65_536,
            parallelism: 1,
            salt_length: 32,
            key_length: KEY_LEN,
        }
    }
}

impl KdfConfig {
    /// Build a validated configuration.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidKeyLength`] unless `key_length` is the AES-256 key size.
    /// - [`ConfigError::InvalidSaltLength`] if `salt_length` is below [`MIN_SALT_LEN`].
    /// - [`ConfigError::InvalidKdfParams`] if Argon2id rejects the cost parameters.
    pub fn new(
        algorithm: KdfAlgorithm,
        time_cost: u32,
        memory_cost_kib: u32,
        parallelism: u32,
        salt_length: usize,
        key_length: usize,
    ) -> Result<Self, ConfigError> {
        let cfg = Self {
            algorithm,
            time_cost,
            memory_cost_kib,
            parallelism,
            salt_length,
            key_length,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// PBKDF2-HMAC-SHA256 with default salt and key lengths.
    pub fn pbkdf2() -> Self {
        Self {
            algorithm: KdfAlgorithm::Pbkdf2HmacSha256,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.key_length != KEY_LEN {
            return Err(ConfigError::InvalidKeyLength {
                expected: KEY_LEN,
                got: self.key_length,
            });
        }
        if self.salt_length < MIN_SALT_LEN {
            return Err(ConfigError::InvalidSaltLength {
                min: MIN_SALT_LEN,
                got: self.salt_length,
            });
        }
        if self.algorithm == KdfAlgorithm::Argon2id {
            self.argon2_params()
                .map_err(|e| ConfigError::InvalidKdfParams(e.to_string()))?;
        }
        Ok(())
    }

    pub fn algorithm(&self) -> KdfAlgorithm {
        self.algorithm
    }

    pub fn time_cost(&self) -> u32 {
        self.time_cost
    }

    pub fn memory_cost_kib(&self) -> u32 {
        self.memory_cost_kib
    }

    pub fn parallelism(&self) -> u32 {
        self.parallelism
    }

    pub fn salt_length(&self) -> usize {
        self.salt_length
    }

    pub fn key_length(&self) -> usize {
        self.key_length
    }

    fn argon2_params(&self) -> Result<Params, argon2::Error> {
        Params::new(
            self.memory_cost_kib,
            self.time_cost,
            self.parallelism,
            Some(self.key_length),
        )
    }

    /// Stretch `secret` with `salt` into a `key_length`-byte key.
    ///
    /// Deterministic for a given `(secret, salt)`. CPU and memory hard; expect
    /// tens to hundreds of milliseconds with the default parameters.
    ///
    /// # Errors
    ///
    /// Returns [`KdfError`] if the backend rejects the inputs.
    pub fn derive(&self, secret: &[u8], salt: &[u8]) -> Result<Zeroizing<Vec<u8>>, KdfError> {
        let mut out = Zeroizing::new(vec![0u8; self.key_length]);
        match self.algorithm {
            KdfAlgorithm::Argon2id => {
                let params = self.argon2_params().map_err(|e| KdfError(e.to_string()))?;
                Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
                    .hash_password_into(secret, salt, &mut out)
                    .map_err(|e| KdfError(e.to_string()))?;
            }
            KdfAlgorithm::Pbkdf2HmacSha256 => {
                pbkdf2::pbkdf2::<Hmac<Sha256>>(secret, salt, PBKDF2_ITERATIONS, &mut out)
                    .map_err(|e| KdfError(e.to_string()))?;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Argon2id with the smallest accepted cost, for fast tests.
    pub(crate) fn fast_config() -> KdfConfig {
        KdfConfig::new(KdfAlgorithm::Argon2id, 1, 64, 1, 32, 32).unwrap()
    }

    #[test]
    fn defaults_are_correct() {
        let cfg = KdfConfig::default();
        assert_eq!(cfg.algorithm(), KdfAlgorithm::Argon2id);
        assert_eq!(cfg.time_cost(), 3);
        assert_eq!(cfg.memory_cost_kib(), 65_536);
        assert_eq!(cfg.parallelism(), 1);
        assert_eq!(cfg.salt_length(), 32);
        assert_eq!(cfg.key_length(), 32);
    }

    #[test]
    fn defaults_pass_validation() {
        let d = KdfConfig::default();
        let built = KdfConfig::new(
            d.algorithm(),
            d.time_cost(),
            d.memory_cost_kib(),
            d.parallelism(),
            d.salt_length(),
            d.key_length(),
        )
        .unwrap();
        assert_eq!(built, d);
    }

    #[test]
    fn custom_pbkdf2_config() {
        let cfg = KdfConfig::new(KdfAlgorithm::Pbkdf2HmacSha256, 5, 131_072, 2, 16, 32).unwrap();
        assert_eq!(cfg.algorithm(), KdfAlgorithm::Pbkdf2HmacSha256);
        assert_eq!(cfg.time_cost(), 5);
        assert_eq!(cfg.memory_cost_kib(), 131_072);
        assert_eq!(cfg.parallelism(), 2);
        assert_eq!(cfg.salt_length(), 16);
    }

    #[test]
    fn pbkdf2_ignores_argon2_costs() {
        assert!(KdfConfig::new(KdfAlgorithm::Pbkdf2HmacSha256, 0, 0, 0, 32, 32).is_ok());
    }

    #[test]
    fn rejects_zero_memory_for_argon2() {
        let err = KdfConfig::new(KdfAlgorithm::Argon2id, 3, 0, 1, 32, 32).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidKdfParams(_)));
    }

    #[test]
    fn rejects_zero_time_cost_for_argon2() {
        let err = KdfConfig::new(KdfAlgorithm::Argon2id, 0, 65_536, 1, 32, 32).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidKdfParams(_)));
    }

    #[test]
    fn rejects_non_aes256_key_length() {
        let err = KdfConfig::new(KdfAlgorithm::Argon2id, 3, 65_536, 1, 32, 16).unwrap_err();
        assert_eq!(err, ConfigError::InvalidKeyLength { expected: 32, got: 16 });
    }

    #[test]
    fn rejects_short_salt() {
        let err = KdfConfig::new(KdfAlgorithm::Pbkdf2HmacSha256, 1, 1, 1, 4, 32).unwrap_err();
        assert_eq!(err, ConfigError::InvalidSaltLength { min: 8, got: 4 });
    }

    #[test]
    fn algorithm_from_str() {
        assert_eq!("argon2id".parse::<KdfAlgorithm>().unwrap(), KdfAlgorithm::Argon2id);
        assert_eq!(" PBKDF2 ".parse::<KdfAlgorithm>().unwrap(), KdfAlgorithm::Pbkdf2HmacSha256);
        assert_eq!(
            "scrypt".parse::<KdfAlgorithm>(),
            Err(ConfigError::UnsupportedAlgorithm("scrypt".into()))
        );
    }

    #[test]
    fn argon2_derivation_is_deterministic() {
        let cfg = fast_config();
        let salt = [7u8; 32];
        let k1 = cfg.derive(b"material", &salt).unwrap();
        let k2 = cfg.derive(b"material", &salt).unwrap();
        assert_eq!(*k1, *k2);
        assert_eq!(k1.len(), 32);
    }

    #[test]
    fn argon2_derivation_depends_on_secret_and_salt() {
        let cfg = fast_config();
        let base = cfg.derive(b"material", &[7u8; 32]).unwrap();
        assert_ne!(*base, *cfg.derive(b"material", &[8u8; 32]).unwrap());
        assert_ne!(*base, *cfg.derive(b"other", &[7u8; 32]).unwrap());
    }

    #[test]
    fn pbkdf2_derivation_is_deterministic() {
        let cfg = KdfConfig::pbkdf2();
        let salt = [1u8; 32];
        let k1 = cfg.derive(b"material", &salt).unwrap();
        let k2 = cfg.derive(b"material", &salt).unwrap();
        assert_eq!(*k1, *k2);
    }
}
