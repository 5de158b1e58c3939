//! Tenant-scoped encryption services and their registry.
//!
//! # Lifecycle
//!
//! 1. At startup the host builds one [`EncryptionServiceManager`] from the
//!    runtime key and KDF configuration.
//! 2. Model instances obtain their tenant's [`TenantEncryptionService`] via
//!    [`EncryptionServiceManager::get_service`] and hold it as an `Arc`.
//! 3. Encrypt/decrypt run without further coordination; services are immutable.
//!
//! # Security invariants
//!
//! - Runtime keys and derived keys are **never** logged or included in traces.
//! - A blob produced for one tenant fails authentication under every other tenant.

pub mod manager;
pub mod service;

pub use manager::EncryptionServiceManager;
pub use service::TenantEncryptionService;
