//! Tenant-scoped models with encrypted attributes.
//!
//! A model owns one [`crate::field::FieldSlot`] per encrypted attribute and an
//! optional binding to its tenant's service. The binding is runtime state and
//! is never persisted; [`EncryptedModel::dump_encrypted`] yields the
//! persistence view, in which encrypted attributes appear only as blobs.

pub mod ip_address;

pub use ip_address::{IpAddressRecord, IpVersion};

use std::sync::Arc;

use common::{ConfigError, EncryptedRecord};
use thiserror::Error;
use uuid::Uuid;

use crate::field::FieldError;
use crate::tenant::{EncryptionServiceManager, TenantEncryptionService};

/// Errors produced while building or binding models.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    /// The service belongs to a different tenant than the record.
    #[error("service for tenant {got} cannot be bound to a record of tenant {expected}")]
    TenantMismatch { expected: Uuid, got: Uuid },

    /// The value is not a valid IP address.
    #[error("invalid IP address: {0}")]
    InvalidAddress(String),

    /// The prefix length exceeds the address width.
    #[error("prefix length {prefix} exceeds {max}")]
    PrefixOutOfRange { prefix: u8, max: u8 },

    /// A persisted record could not be decoded.
    #[error("malformed record: {0}")]
    InvalidRecord(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Field(#[from] FieldError),
}

/// A record that belongs to one tenant and carries encrypted attributes.
pub trait EncryptedModel {
    fn id(&self) -> Uuid;

    fn tenant_id(&self) -> Uuid;

    /// The service bound to this instance, if any.
    fn encryption_service(&self) -> Option<&Arc<TenantEncryptionService>>;

    /// Bind the service used by every encrypted attribute of this instance.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::TenantMismatch`] if `service` belongs to another tenant.
    fn bind_encryption_service(
        &mut self,
        service: Arc<TenantEncryptionService>,
    ) -> Result<(), ModelError>;

    /// Persistence view: blobs under their storage names, plaintext never.
    fn dump_encrypted(&self) -> EncryptedRecord;
}

/// Fail unless `service` belongs to `tenant_id`.
pub(crate) fn ensure_same_tenant(
    tenant_id: Uuid,
    service: &TenantEncryptionService,
) -> Result<(), ModelError> {
    if service.tenant_id() != tenant_id {
        return Err(ModelError::TenantMismatch {
            expected: tenant_id,
            got: service.tenant_id(),
        });
    }
    Ok(())
}

/// Bind `model` to its tenant's service from `manager`.
///
/// # Errors
///
/// Propagates [`ConfigError`] from [`EncryptionServiceManager::get_service`].
pub fn bind_from_manager<M: EncryptedModel + ?Sized>(
    model: &mut M,
    manager: &EncryptionServiceManager,
) -> Result<(), ModelError> {
    let service = manager.get_service(model.tenant_id())?;
    model.bind_encryption_service(service)
}
