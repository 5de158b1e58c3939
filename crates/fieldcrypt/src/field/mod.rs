//! Transparent field-level encryption for model attributes.
//!
//! Each encrypted attribute is declared once as an [`EncryptedField`] and
//! backed per instance by a [`FieldSlot`] holding the persisted blob and the
//! cached plaintext. Callers invoke `get`/`set`/`delete` explicitly, passing
//! the tenant service bound to the instance.

pub mod accessor;
pub mod slot;

pub use accessor::{EncryptedField, FieldError, FieldValue};
pub use slot::FieldSlot;
