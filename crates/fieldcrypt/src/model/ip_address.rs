//! [`IpAddressRecord`]: an IP address found in a device configuration, with
//! both its original and normalised text encrypted per tenant.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{EncryptedRecord, StoredBlob};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{ensure_same_tenant, EncryptedModel, ModelError};
use crate::field::{EncryptedField, FieldSlot, FieldValue};
use crate::tenant::TenantEncryptionService;

/// Address exactly as written in the source configuration.
pub const ORIGINAL_ADDRESS: EncryptedField =
    EncryptedField::new("original_address", "original_address_encrypted");

/// Canonical textual form of the address.
pub const NORMALIZED_ADDRESS: EncryptedField =
    EncryptedField::new("normalized_address", "normalized_address_encrypted");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpVersion {
    Ipv4,
    Ipv6,
}

impl IpVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            IpVersion::Ipv4 => "ipv4",
            IpVersion::Ipv6 => "ipv6",
        }
    }

    fn max_prefix(self) -> u8 {
        match self {
            IpVersion::Ipv4 => 32,
            IpVersion::Ipv6 => 128,
        }
    }
}

/// Plaintext attributes, persisted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct Metadata {
    version: IpVersion,
    prefix_length: Option<u8>,
    is_private: bool,
    is_loopback: bool,
    is_multicast: bool,
    device_id: Option<Uuid>,
    config_line_number: Option<u32>,
    context: Option<String>,
}

impl Metadata {
    /// Column view for [`EncryptedRecord::fields`]. Keys match the
    /// `Deserialize` impl used by [`IpAddressRecord::hydrate`].
    fn to_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("version".into(), self.version.as_str().into());
        fields.insert("prefix_length".into(), self.prefix_length.into());
        fields.insert("is_private".into(), self.is_private.into());
        fields.insert("is_loopback".into(), self.is_loopback.into());
        fields.insert("is_multicast".into(), self.is_multicast.into());
        fields.insert(
            "device_id".into(),
            self.device_id.map(|id| id.to_string()).into(),
        );
        fields.insert("config_line_number".into(), self.config_line_number.into());
        fields.insert("context".into(), self.context.clone().into());
        fields
    }
}

/// Normalised IP address with encrypted original and canonical text.
#[derive(Debug, Clone)]
pub struct IpAddressRecord {
    id: Uuid,
    tenant_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    meta: Metadata,
    original_address: FieldSlot,
    normalized_address: FieldSlot,
    encryption_service: Option<Arc<TenantEncryptionService>>,
}

impl IpAddressRecord {
    /// An empty, unbound record.
    pub fn new(tenant_id: Uuid, version: IpVersion) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            created_at: now,
            updated_at: now,
            meta: Metadata {
                version,
                prefix_length: None,
                is_private: false,
                is_loopback: false,
                is_multicast: false,
                device_id: None,
                config_line_number: None,
                context: None,
            },
            original_address: FieldSlot::empty(),
            normalized_address: FieldSlot::empty(),
            encryption_service: None,
        }
    }

    /// Parse `raw` (`addr` or `addr/prefix`), classify it, and encrypt both
    /// the original and the canonical text under `service`'s tenant.
    ///
    /// # Errors
    ///
    /// - [`ModelError::InvalidAddress`] if `raw` does not parse.
    /// - [`ModelError::PrefixOutOfRange`] if the prefix exceeds the address width.
    /// - [`ModelError::Field`] if encryption fails.
    pub fn from_address(
        service: Arc<TenantEncryptionService>,
        raw: &str,
    ) -> Result<Self, ModelError> {
        let trimmed = raw.trim();
        let (addr_text, prefix_text) = match trimmed.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (trimmed, None),
        };
        let addr: IpAddr = addr_text
            .parse()
            .map_err(|_| ModelError::InvalidAddress(addr_text.to_owned()))?;

        let version = match addr {
            IpAddr::V4(_) => IpVersion::Ipv4,
            IpAddr::V6(_) => IpVersion::Ipv6,
        };
        let prefix_length = prefix_text
            .map(|p| {
                p.parse::<u8>()
                    .map_err(|_| ModelError::InvalidAddress(trimmed.to_owned()))
            })
            .transpose()?;
        if let Some(prefix) = prefix_length {
            if prefix > version.max_prefix() {
                return Err(ModelError::PrefixOutOfRange {
                    prefix,
                    max: version.max_prefix(),
                });
            }
        }

        let mut record = Self::new(service.tenant_id(), version);
        record.meta.prefix_length = prefix_length;
        record.meta.is_private = is_private(&addr);
        record.meta.is_loopback = addr.is_loopback();
        record.meta.is_multicast = addr.is_multicast();
        record.bind_encryption_service(service)?;
        record.set_original_address(Some(raw))?;
        record.set_normalized_address(Some(&addr.to_string()))?;
        Ok(record)
    }

    /// Rebuild a record from its persistence view. Nothing is decrypted and
    /// no service is bound.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidRecord`] if the stored metadata is malformed.
    pub fn hydrate(record: EncryptedRecord) -> Result<Self, ModelError> {
        let EncryptedRecord {
            id,
            tenant_id,
            created_at,
            updated_at,
            mut encrypted,
            fields,
        } = record;
        let meta: Metadata = serde_json::from_value(serde_json::Value::Object(fields))
            .map_err(|e| ModelError::InvalidRecord(e.to_string()))?;

        let mut take = |field: EncryptedField| {
            FieldSlot::from_storage(
                encrypted
                    .remove(field.storage_name())
                    .flatten()
                    .map(|blob| blob.0),
            )
        };
        let original_address = take(ORIGINAL_ADDRESS);
        let normalized_address = take(NORMALIZED_ADDRESS);

        Ok(Self {
            id,
            tenant_id,
            created_at,
            updated_at,
            meta,
            original_address,
            normalized_address,
            encryption_service: None,
        })
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Last change to any attribute, encrypted or not.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn version(&self) -> IpVersion {
        self.meta.version
    }

    pub fn prefix_length(&self) -> Option<u8> {
        self.meta.prefix_length
    }

    pub fn is_private(&self) -> bool {
        self.meta.is_private
    }

    pub fn is_loopback(&self) -> bool {
        self.meta.is_loopback
    }

    pub fn is_multicast(&self) -> bool {
        self.meta.is_multicast
    }

    pub fn device_id(&self) -> Option<Uuid> {
        self.meta.device_id
    }

    pub fn config_line_number(&self) -> Option<u32> {
        self.meta.config_line_number
    }

    pub fn context(&self) -> Option<&str> {
        self.meta.context.as_deref()
    }

    /// Record where in the source configuration this address was found.
    pub fn set_source(&mut self, device_id: Option<Uuid>, line: Option<u32>, context: Option<String>) {
        self.meta.device_id = device_id;
        self.meta.config_line_number = line;
        self.meta.context = context;
        self.touch();
    }

    /// Decrypted original text; corrupted data reads as `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Field`] if a blob is stored but no service is bound.
    pub fn original_address(&mut self) -> Result<Option<String>, ModelError> {
        let service = self.encryption_service.as_deref();
        Ok(ORIGINAL_ADDRESS.get(&mut self.original_address, service)?)
    }

    /// Tri-state read of the original text.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Field`] if a blob is stored but no service is bound.
    pub fn read_original_address(&mut self) -> Result<FieldValue, ModelError> {
        let service = self.encryption_service.as_deref();
        Ok(ORIGINAL_ADDRESS.read(&mut self.original_address, service)?)
    }

    /// # Errors
    ///
    /// Returns [`ModelError::Field`] if no service is bound or encryption fails.
    pub fn set_original_address(&mut self, value: Option<&str>) -> Result<(), ModelError> {
        let service = self.encryption_service.as_deref();
        ORIGINAL_ADDRESS.set(&mut self.original_address, service, value)?;
        self.touch();
        Ok(())
    }

    pub fn delete_original_address(&mut self) {
        ORIGINAL_ADDRESS.delete(&mut self.original_address);
        self.touch();
    }

    /// Decrypted canonical text; corrupted data reads as `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Field`] if a blob is stored but no service is bound.
    pub fn normalized_address(&mut self) -> Result<Option<String>, ModelError> {
        let service = self.encryption_service.as_deref();
        Ok(NORMALIZED_ADDRESS.get(&mut self.normalized_address, service)?)
    }

    /// Tri-state read of the canonical text.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Field`] if a blob is stored but no service is bound.
    pub fn read_normalized_address(&mut self) -> Result<FieldValue, ModelError> {
        let service = self.encryption_service.as_deref();
        Ok(NORMALIZED_ADDRESS.read(&mut self.normalized_address, service)?)
    }

    /// # Errors
    ///
    /// Returns [`ModelError::Field`] if no service is bound or encryption fails.
    pub fn set_normalized_address(&mut self, value: Option<&str>) -> Result<(), ModelError> {
        let service = self.encryption_service.as_deref();
        NORMALIZED_ADDRESS.set(&mut self.normalized_address, service, value)?;
        self.touch();
        Ok(())
    }

    pub fn delete_normalized_address(&mut self) {
        NORMALIZED_ADDRESS.delete(&mut self.normalized_address);
        self.touch();
    }
}

impl EncryptedModel for IpAddressRecord {
    fn id(&self) -> Uuid {
        self.id
    }

    fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    fn encryption_service(&self) -> Option<&Arc<TenantEncryptionService>> {
        self.encryption_service.as_ref()
    }

    fn bind_encryption_service(
        &mut self,
        service: Arc<TenantEncryptionService>,
    ) -> Result<(), ModelError> {
        ensure_same_tenant(self.tenant_id, &service)?;
        self.encryption_service = Some(service);
        Ok(())
    }

    fn dump_encrypted(&self) -> EncryptedRecord {
        let mut encrypted = BTreeMap::new();
        for (field, slot) in [
            (ORIGINAL_ADDRESS, &self.original_address),
            (NORMALIZED_ADDRESS, &self.normalized_address),
        ] {
            encrypted.insert(
                field.storage_name().to_owned(),
                slot.storage().map(|b| StoredBlob(b.to_vec())),
            );
        }

        EncryptedRecord {
            id: self.id,
            tenant_id: self.tenant_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            encrypted,
            fields: self.meta.to_fields(),
        }
    }
}

fn is_private(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => v4.is_private(),
        // Unique local addresses, fc00::/7.
        IpAddr::V6(v6) => (v6.segments()[0] & 0xfe00) == 0xfc00,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::kdf::tests::fast_config;
    use crate::crypto::RuntimeKey;
    use crate::model::bind_from_manager;
    use crate::tenant::EncryptionServiceManager;

    fn manager() -> EncryptionServiceManager {
        EncryptionServiceManager::new(RuntimeKey::generate(), Some(fast_config())).unwrap()
    }

    #[test]
    fn from_address_classifies_and_encrypts() {
        let mgr = manager();
        let svc = mgr.get_service(Uuid::new_v4()).unwrap();
        let mut record = IpAddressRecord::from_address(svc, "10.0.0.1/24").unwrap();

        assert_eq!(record.version(), IpVersion::Ipv4);
        assert_eq!(record.prefix_length(), Some(24));
        assert!(record.is_private());
        assert!(!record.is_loopback());
        assert!(!record.is_multicast());
        assert_eq!(record.original_address().unwrap().as_deref(), Some("10.0.0.1/24"));
        assert_eq!(record.normalized_address().unwrap().as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn ipv6_is_normalised() {
        let mgr = manager();
        let svc = mgr.get_service(Uuid::new_v4()).unwrap();
        let mut record =
            IpAddressRecord::from_address(svc, "FD00:0000:0000:0000:0000:0000:0000:0001").unwrap();
        assert_eq!(record.version(), IpVersion::Ipv6);
        assert!(record.is_private());
        assert_eq!(record.normalized_address().unwrap().as_deref(), Some("fd00::1"));
    }

    #[test]
    fn loopback_and_multicast_flags() {
        let mgr = manager();
        let tenant = Uuid::new_v4();
        let lo = IpAddressRecord::from_address(mgr.get_service(tenant).unwrap(), "127.0.0.1").unwrap();
        assert!(lo.is_loopback());
        let mc = IpAddressRecord::from_address(mgr.get_service(tenant).unwrap(), "ff02::1").unwrap();
        assert!(mc.is_multicast());
    }

    #[test]
    fn rejects_invalid_input() {
        let mgr = manager();
        let svc = mgr.get_service(Uuid::new_v4()).unwrap();
        assert!(matches!(
            IpAddressRecord::from_address(Arc::clone(&svc), "300.1.1.1"),
            Err(ModelError::InvalidAddress(_))
        ));
        assert_eq!(
            IpAddressRecord::from_address(svc, "10.0.0.0/33").unwrap_err(),
            ModelError::PrefixOutOfRange { prefix: 33, max: 32 }
        );
    }

    #[test]
    fn dump_never_contains_plaintext() {
        let mgr = manager();
        let svc = mgr.get_service(Uuid::new_v4()).unwrap();
        let record = IpAddressRecord::from_address(svc, "192.168.1.10").unwrap();

        let dump = record.dump_encrypted();
        let json = serde_json::to_string(&dump).unwrap();
        assert!(!json.contains("192.168.1.10"));
        assert!(dump.encrypted["original_address_encrypted"].is_some());
        assert!(dump.encrypted["normalized_address_encrypted"].is_some());
        assert_eq!(dump.fields["version"], "ipv4");
        assert_eq!(dump.tenant_id, record.tenant_id());
    }

    #[test]
    fn persistence_round_trip_through_json() {
        let mgr = manager();
        let tenant = Uuid::new_v4();
        let mut record =
            IpAddressRecord::from_address(mgr.get_service(tenant).unwrap(), "10.1.2.3").unwrap();
        record.set_source(None, Some(42), Some("interface Gi0/1".into()));
        record.set_normalized_address(None).unwrap();

        let json = serde_json::to_string(&record.dump_encrypted()).unwrap();
        let stored: EncryptedRecord = serde_json::from_str(&json).unwrap();
        let mut restored = IpAddressRecord::hydrate(stored).unwrap();

        assert_eq!(restored.id(), record.id());
        assert_eq!(restored.config_line_number(), Some(42));
        assert_eq!(restored.context(), Some("interface Gi0/1"));
        assert!(restored.encryption_service().is_none());

        bind_from_manager(&mut restored, &mgr).unwrap();
        assert_eq!(restored.original_address().unwrap().as_deref(), Some("10.1.2.3"));
        assert_eq!(restored.normalized_address().unwrap(), None);
    }

    #[test]
    fn dump_carries_every_metadata_column() {
        let mgr = manager();
        let device = Uuid::new_v4();
        let mut record =
            IpAddressRecord::from_address(mgr.get_service(Uuid::new_v4()).unwrap(), "fd00::1/64")
                .unwrap();
        record.set_source(Some(device), Some(7), None);

        let fields = record.dump_encrypted().fields;
        assert_eq!(fields.len(), 8);
        assert_eq!(fields["version"], "ipv6");
        assert_eq!(fields["prefix_length"], 64);
        assert_eq!(fields["is_private"], true);
        assert_eq!(fields["is_loopback"], false);
        assert_eq!(fields["is_multicast"], false);
        assert_eq!(fields["device_id"], device.to_string());
        assert_eq!(fields["config_line_number"], 7);
        assert!(fields["context"].is_null());

        let restored = IpAddressRecord::hydrate(record.dump_encrypted()).unwrap();
        assert_eq!(restored.device_id(), Some(device));
        assert_eq!(restored.prefix_length(), Some(64));
        assert_eq!(restored.version(), IpVersion::Ipv6);
    }

    #[test]
    fn timestamps_survive_persistence_and_track_updates() {
        let mgr = manager();
        let mut record =
            IpAddressRecord::from_address(mgr.get_service(Uuid::new_v4()).unwrap(), "10.0.0.1")
                .unwrap();
        assert!(record.updated_at() >= record.created_at());

        let dump = record.dump_encrypted();
        assert_eq!(dump.created_at, record.created_at());
        assert_eq!(dump.updated_at, record.updated_at());

        let json = serde_json::to_string(&dump).unwrap();
        let mut restored = IpAddressRecord::hydrate(serde_json::from_str(&json).unwrap()).unwrap();
        assert_eq!(restored.created_at(), record.created_at());
        assert_eq!(restored.updated_at(), record.updated_at());

        let before = restored.updated_at();
        bind_from_manager(&mut restored, &mgr).unwrap();
        restored.set_original_address(Some("10.0.0.2")).unwrap();
        assert!(restored.updated_at() >= before);
        assert_eq!(restored.created_at(), record.created_at());
    }

    #[test]
    fn hydrate_rejects_malformed_metadata() {
        let mgr = manager();
        let record =
            IpAddressRecord::from_address(mgr.get_service(Uuid::new_v4()).unwrap(), "10.0.0.1")
                .unwrap();
        let mut dump = record.dump_encrypted();
        dump.fields.insert("version".into(), "ipv5".into());
        assert!(matches!(
            IpAddressRecord::hydrate(dump),
            Err(ModelError::InvalidRecord(_))
        ));
    }

    #[test]
    fn restored_record_without_binding_fails_on_read() {
        let mgr = manager();
        let record =
            IpAddressRecord::from_address(mgr.get_service(Uuid::new_v4()).unwrap(), "10.0.0.1").unwrap();
        let mut restored = IpAddressRecord::hydrate(record.dump_encrypted()).unwrap();
        assert!(matches!(restored.original_address(), Err(ModelError::Field(_))));
    }

    #[test]
    fn foreign_blob_reads_as_absent() {
        let mgr = manager();
        let record =
            IpAddressRecord::from_address(mgr.get_service(Uuid::new_v4()).unwrap(), "10.0.0.1").unwrap();

        let mut dump = record.dump_encrypted();
        let other_tenant = Uuid::new_v4();
        dump.tenant_id = other_tenant;
        let mut moved = IpAddressRecord::hydrate(dump).unwrap();
        bind_from_manager(&mut moved, &mgr).unwrap();

        assert_eq!(moved.original_address().unwrap(), None);
        assert!(matches!(
            moved.read_normalized_address().unwrap(),
            FieldValue::Corrupted(_)
        ));
    }

    #[test]
    fn binding_another_tenants_service_is_rejected() {
        let mgr = manager();
        let (t1, t2) = (Uuid::new_v4(), Uuid::new_v4());
        let mut record = IpAddressRecord::new(t1, IpVersion::Ipv4);
        let err = record
            .bind_encryption_service(mgr.get_service(t2).unwrap())
            .unwrap_err();
        assert_eq!(err, ModelError::TenantMismatch { expected: t1, got: t2 });
    }

    #[test]
    fn delete_clears_fields() {
        let mgr = manager();
        let mut record =
            IpAddressRecord::from_address(mgr.get_service(Uuid::new_v4()).unwrap(), "10.0.0.1").unwrap();
        record.delete_original_address();
        record.delete_normalized_address();
        assert_eq!(record.read_original_address().unwrap(), FieldValue::Absent);
        let dump = record.dump_encrypted();
        assert!(dump.encrypted.values().all(Option::is_none));
    }
}
