//! [`EncryptedField`]: explicit get/set/delete through a tenant service.

use common::{DecryptionError, EncryptionError};
use thiserror::Error;
use tracing::warn;

use super::slot::FieldSlot;
use crate::tenant::TenantEncryptionService;

/// Errors surfaced by the field accessor.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldError {
    /// No encryption service is bound to the model instance. A wiring bug,
    /// never a data problem.
    #[error("encryption service not available for field {field}")]
    ServiceNotBound { field: &'static str },

    /// `None` was assigned to a non-nullable field.
    #[error("field {field} cannot be None")]
    NullNotAllowed { field: &'static str },

    /// The bound service failed to encrypt the value.
    #[error("failed to encrypt field {field}: {source}")]
    Encryption {
        field: &'static str,
        #[source]
        source: EncryptionError,
    },
}

/// Outcome of a tri-state read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// The field is null.
    Absent,
    /// The stored blob decrypted to this plaintext.
    Present(String),
    /// The stored blob could not be decrypted by the bound service.
    Corrupted(DecryptionError),
}

impl FieldValue {
    /// Collapse to the two-state view: corrupted data reads as absent.
    pub fn into_option(self) -> Option<String> {
        match self {
            FieldValue::Present(v) => Some(v),
            FieldValue::Absent | FieldValue::Corrupted(_) => None,
        }
    }
}

/// Declaration of one encrypted attribute: its name, the name of the storage
/// attribute that persists the blob, and nullability.
///
/// The accessor itself holds no per-instance state; it operates on the
/// [`FieldSlot`] it is given, using the service bound to the instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptedField {
    name: &'static str,
    storage_name: &'static str,
    nullable: bool,
}

impl EncryptedField {
    /// A nullable encrypted attribute persisted under `storage_name`.
    pub const fn new(name: &'static str, storage_name: &'static str) -> Self {
        Self {
            name,
            storage_name,
            nullable: true,
        }
    }

    /// A non-nullable encrypted attribute persisted under `storage_name`.
    pub const fn required(name: &'static str, storage_name: &'static str) -> Self {
        Self {
            name,
            storage_name,
            nullable: false,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub const fn storage_name(&self) -> &'static str {
        self.storage_name
    }

    pub const fn is_nullable(&self) -> bool {
        self.nullable
    }

    fn require<'s>(
        &self,
        service: Option<&'s TenantEncryptionService>,
    ) -> Result<&'s TenantEncryptionService, FieldError> {
        service.ok_or(FieldError::ServiceNotBound { field: self.name })
    }

    /// Read the plaintext, distinguishing corrupted data from a null field.
    ///
    /// A cached plaintext is returned without touching the service. A
    /// successful decryption is cached; a failed one is not.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::ServiceNotBound`] if a blob is stored but no
    /// service is bound.
    pub fn read(
        &self,
        slot: &mut FieldSlot,
        service: Option<&TenantEncryptionService>,
    ) -> Result<FieldValue, FieldError> {
        if let Some(cached) = &slot.cache {
            return Ok(FieldValue::Present(cached.clone()));
        }
        let Some(blob) = slot.storage.as_deref() else {
            return Ok(FieldValue::Absent);
        };
        let service = self.require(service)?;

        match service.decrypt(blob) {
            Ok(plaintext) => {
                slot.cache = Some(plaintext.clone());
                Ok(FieldValue::Present(plaintext))
            }
            Err(e) => Ok(FieldValue::Corrupted(e)),
        }
    }

    /// Read the plaintext; undecryptable data reads as `None`.
    ///
    /// Corrupted or foreign blobs are logged at `warn` (field name, tenant,
    /// and error kind only) and reported as absent rather than failing the
    /// caller. Use [`read`](Self::read) to tell the two apart.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::ServiceNotBound`] if a blob is stored but no
    /// service is bound.
    pub fn get(
        &self,
        slot: &mut FieldSlot,
        service: Option<&TenantEncryptionService>,
    ) -> Result<Option<String>, FieldError> {
        let value = self.read(slot, service)?;
        if let FieldValue::Corrupted(e) = &value {
            warn!(
                field = self.name,
                tenant_id = ?service.map(TenantEncryptionService::tenant_id),
                error = %e,
                "undecryptable field value treated as absent"
            );
        }
        Ok(value.into_option())
    }

    /// Encrypt and store `value`, caching the plaintext.
    ///
    /// `None` clears a nullable field.
    ///
    /// # Errors
    ///
    /// - [`FieldError::NullNotAllowed`] for `None` on a non-nullable field.
    /// - [`FieldError::ServiceNotBound`] if no service is bound.
    /// - [`FieldError::Encryption`] if the service fails.
    pub fn set(
        &self,
        slot: &mut FieldSlot,
        service: Option<&TenantEncryptionService>,
        value: Option<&str>,
    ) -> Result<(), FieldError> {
        let Some(value) = value else {
            if !self.nullable {
                return Err(FieldError::NullNotAllowed { field: self.name });
            }
            slot.clear();
            return Ok(());
        };

        let service = self.require(service)?;
        let blob = service.encrypt(value).map_err(|source| FieldError::Encryption {
            field: self.name,
            source,
        })?;
        slot.storage = Some(blob);
        slot.cache = Some(value.to_owned());
        Ok(())
    }

    /// Clear the stored blob and any cached plaintext.
    pub fn delete(&self, slot: &mut FieldSlot) {
        slot.clear();
    }
}
