//! [`FieldSlot`]: per-instance state behind one encrypted attribute.

/// Ciphertext storage plus the cached plaintext for one model attribute.
///
/// Storage can only be supplied when hydrating from persistence
/// ([`from_storage`](Self::from_storage)) or by [`super::EncryptedField`], so
/// the cache is always either empty or the decryption of the stored blob.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct FieldSlot {
    pub(super) storage: Option<Vec<u8>>,
    pub(super) cache: Option<String>,
}

impl FieldSlot {
    /// A null field: no blob, nothing cached.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Hydrate from a persisted blob. Nothing is decrypted until first read.
    pub fn from_storage(storage: Option<Vec<u8>>) -> Self {
        Self {
            storage,
            cache: None,
        }
    }

    /// The blob to persist, verbatim.
    pub fn storage(&self) -> Option<&[u8]> {
        self.storage.as_deref()
    }

    pub fn into_storage(self) -> Option<Vec<u8>> {
        self.storage
    }

    /// Whether the field currently holds no blob.
    pub fn is_null(&self) -> bool {
        self.storage.is_none()
    }

    /// Whether a decrypted plaintext is cached.
    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }

    pub(super) fn clear(&mut self) {
        self.storage = None;
        self.cache = None;
    }
}

impl std::fmt::Debug for FieldSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print plaintext or blob bytes.
        f.debug_struct("FieldSlot")
            .field("storage_len", &self.storage.as_ref().map(Vec::len))
            .field("cached", &self.cache.is_some())
            .finish()
    }
}
