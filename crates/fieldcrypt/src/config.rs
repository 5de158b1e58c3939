//! Configuration loading and validation for the `fieldcrypt` binary.
//!
//! All values are read from `FIELDCRYPT_*` environment variables at startup.
//! The process exits with a clear error message if any required variable is
//! missing or invalid.

use std::num::NonZeroUsize;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::crypto::{KdfAlgorithm, KdfConfig, RuntimeKey};

const ENV_PREFIX: &str = "FIELDCRYPT";

/// Validated service configuration.
#[derive(Clone, Deserialize)]
pub struct Config {
    /// Base64-encoded process-wide runtime key. **Required.**
    pub runtime_key: String,

    /// Key derivation function: `argon2id` or `pbkdf2`.
    #[serde(default = "default_kdf_algorithm")]
    pub kdf_algorithm: String,

    /// Argon2id iterations.
    #[serde(default = "default_kdf_time_cost")]
    pub kdf_time_cost: u32,

    /// Argon2id memory in KiB.
    #[serde(default = "default_kdf_memory_cost_kib")]
    pub kdf_memory_cost_kib: u32,

    /// Argon2id lanes.
    #[serde(default = "default_kdf_parallelism")]
    pub kdf_parallelism: u32,

    /// Bytes of random salt per blob.
    #[serde(default = "default_kdf_salt_length")]
    pub kdf_salt_length: usize,

    /// Derived key length in bytes. Only 32 is accepted.
    #[serde(default = "default_kdf_key_length")]
    pub kdf_key_length: usize,

    /// Upper bound on cached tenant services. Unbounded when unset.
    #[serde(default)]
    pub max_cached_tenants: Option<usize>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// OTLP/gRPC endpoint for span export. Spans stay local when unset.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,
}

fn default_kdf_algorithm() -> String {
    KdfAlgorithm::Argon2id.as_str().into()
}
fn default_kdf_time_cost() -> u32 {
    3
}
fn default_kdf_memory_cost_kib() -> u32 {
    65_536
}
fn default_kdf_parallelism() -> u32 {
    1
}
fn default_kdf_salt_length() -> usize {
    32
}
fn default_kdf_key_length() -> usize {
    32
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any required variable is absent or cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::load(config::Environment::with_prefix(ENV_PREFIX))
    }

    fn load(source: config::Environment) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(source)
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Decode the runtime key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not valid base64 or is shorter than 32 bytes.
    pub fn runtime_key(&self) -> Result<RuntimeKey> {
        let key = RuntimeKey::from_base64(self.runtime_key.trim())
            .context("FIELDCRYPT_RUNTIME_KEY is not valid base64")?;
        key.ensure_min_len()
            .context("FIELDCRYPT_RUNTIME_KEY is too short")?;
        Ok(key)
    }

    /// Manager capacity; `None` means unbounded.
    pub fn max_cached_tenants(&self) -> Option<NonZeroUsize> {
        self.max_cached_tenants.and_then(NonZeroUsize::new)
    }

    /// Build the key derivation configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the algorithm is unknown or the parameters are rejected.
    pub fn kdf_config(&self) -> Result<KdfConfig> {
        let algorithm: KdfAlgorithm = self
            .kdf_algorithm
            .parse()
            .context("FIELDCRYPT_KDF_ALGORITHM is invalid")?;
        KdfConfig::new(
            algorithm,
            self.kdf_time_cost,
            self.kdf_memory_cost_kib,
            self.kdf_parallelism,
            self.kdf_salt_length,
            self.kdf_key_length,
        )
        .context("invalid key derivation parameters")
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        ensure_non_empty(&self.runtime_key, "FIELDCRYPT_RUNTIME_KEY")?;
        ensure_non_empty(&self.log_level, "FIELDCRYPT_LOG_LEVEL")?;
        if let Some(endpoint) = &self.otel_exporter_otlp_endpoint {
            ensure_non_empty(endpoint, "FIELDCRYPT_OTEL_EXPORTER_OTLP_ENDPOINT")?;
        }
        if self.max_cached_tenants == Some(0) {
            anyhow::bail!("FIELDCRYPT_MAX_CACHED_TENANTS must be > 0 when set");
        }
        self.runtime_key()?;
        self.kdf_config()?;
        Ok(())
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("runtime_key", &"[REDACTED]")
            .field("kdf_algorithm", &self.kdf_algorithm)
            .field("kdf_time_cost", &self.kdf_time_cost)
            .field("kdf_memory_cost_kib", &self.kdf_memory_cost_kib)
            .field("kdf_parallelism", &self.kdf_parallelism)
            .field("kdf_salt_length", &self.kdf_salt_length)
            .field("kdf_key_length", &self.kdf_key_length)
            .field("max_cached_tenants", &self.max_cached_tenants)
            .field("log_level", &self.log_level)
            .field("otel_exporter_otlp_endpoint", &self.otel_exporter_otlp_endpoint)
            .finish()
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} is required and must not be empty");
    }
    Ok(())
}
