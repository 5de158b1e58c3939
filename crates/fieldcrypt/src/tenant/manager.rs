//! [`EncryptionServiceManager`]: tenant-keyed registry of encryption services.
//!
//! Reads go through an [`ArcSwap`] snapshot of the map and never block. The
//! first request for a tenant takes a write gate, re-checks the snapshot, and
//! publishes a new map containing the service, so at most one service per
//! tenant is ever visible.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use common::ConfigError;
use tracing::{debug, warn};
use uuid::Uuid;

use super::service::TenantEncryptionService;
use crate::crypto::{KdfConfig, RuntimeKey};

/// A cached service with its recency stamp and pin flag.
#[derive(Debug)]
struct Entry {
    service: Arc<TenantEncryptionService>,
    last_used: AtomicU64,
    pinned: AtomicBool,
}

impl Entry {
    fn new(service: Arc<TenantEncryptionService>, now: u64) -> Self {
        Self {
            service,
            last_used: AtomicU64::new(now),
            pinned: AtomicBool::new(false),
        }
    }
}

type ServiceMap = HashMap<Uuid, Arc<Entry>>;

/// Creates, memoizes, and optionally bounds per-tenant encryption services.
///
/// Without a capacity the map only grows. With a capacity, publishing a new
/// tenant evicts the least recently used unpinned tenants until the map fits.
/// Pinned tenants are never evicted implicitly, even if that leaves the map
/// over capacity.
///
/// Evicted services stay usable by anyone still holding the `Arc`.
#[derive(Debug)]
pub struct EncryptionServiceManager {
    runtime_key: RuntimeKey,
    kdf_config: KdfConfig,
    capacity: Option<NonZeroUsize>,
    services: ArcSwap<ServiceMap>,
    write_gate: Mutex<()>,
    clock: AtomicU64,
}

impl EncryptionServiceManager {
    /// Create an unbounded manager. `None` selects [`KdfConfig::default`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::RuntimeKeyTooShort`] if the runtime key is
    /// shorter than 32 bytes.
    pub fn new(runtime_key: RuntimeKey, kdf_config: Option<KdfConfig>) -> Result<Self, ConfigError> {
        Self::with_capacity(runtime_key, kdf_config, None)
    }

    /// Create a manager holding at most `capacity` unpinned services.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::RuntimeKeyTooShort`] if the runtime key is
    /// shorter than 32 bytes.
    pub fn with_capacity(
        runtime_key: RuntimeKey,
        kdf_config: Option<KdfConfig>,
        capacity: Option<NonZeroUsize>,
    ) -> Result<Self, ConfigError> {
        runtime_key.ensure_min_len()?;
        Ok(Self {
            runtime_key,
            kdf_config: kdf_config.unwrap_or_default(),
            capacity,
            services: ArcSwap::from_pointee(HashMap::new()),
            write_gate: Mutex::new(()),
            clock: AtomicU64::new(0),
        })
    }

    /// Generate a fresh 32-byte runtime key from the OS CSPRNG.
    pub fn generate_runtime_key() -> RuntimeKey {
        RuntimeKey::generate()
    }

    pub fn kdf_config(&self) -> &KdfConfig {
        &self.kdf_config
    }

    pub fn capacity(&self) -> Option<NonZeroUsize> {
        self.capacity
    }

    /// Number of services currently cached.
    pub fn len(&self) -> usize {
        self.services.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.load().is_empty()
    }

    pub fn contains(&self, tenant_id: Uuid) -> bool {
        self.services.load().contains_key(&tenant_id)
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Return the service for `tenant_id`, creating it on first use.
    ///
    /// Repeated and concurrent calls for the same tenant return the same
    /// instance for as long as it stays cached.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] only if service construction fails, which the
    /// checks in [`new`](Self::new) already rule out.
    pub fn get_service(&self, tenant_id: Uuid) -> Result<Arc<TenantEncryptionService>, ConfigError> {
        if let Some(entry) = self.services.load().get(&tenant_id) {
            entry.last_used.store(self.tick(), Ordering::Relaxed);
            return Ok(Arc::clone(&entry.service));
        }

        let _gate = self.write_gate.lock().unwrap_or_else(PoisonError::into_inner);

        // Another caller may have published the tenant while we waited.
        let current = self.services.load_full();
        if let Some(entry) = current.get(&tenant_id) {
            entry.last_used.store(self.tick(), Ordering::Relaxed);
            return Ok(Arc::clone(&entry.service));
        }

        let service = Arc::new(TenantEncryptionService::new(
            tenant_id,
            self.runtime_key.clone(),
            Some(self.kdf_config.clone()),
        )?);

        let mut next: ServiceMap = HashMap::clone(&current);
        next.insert(tenant_id, Arc::new(Entry::new(Arc::clone(&service), self.tick())));
        self.enforce_capacity(&mut next, tenant_id);

        let cached = next.len();
        self.services.store(Arc::new(next));
        debug!(%tenant_id, cached, "tenant encryption service created");
        Ok(service)
    }

    fn enforce_capacity(&self, map: &mut ServiceMap, keep: Uuid) {
        let Some(capacity) = self.capacity.map(NonZeroUsize::get) else {
            return;
        };
        while map.len() > capacity {
            let victim = map
                .iter()
                .filter(|(id, entry)| **id != keep && !entry.pinned.load(Ordering::Relaxed))
                .min_by_key(|(_, entry)| entry.last_used.load(Ordering::Relaxed))
                .map(|(id, _)| *id);
            match victim {
                Some(id) => {
                    map.remove(&id);
                    debug!(tenant_id = %id, "tenant encryption service evicted");
                }
                None => {
                    // capacity >= 1, so every other entry left here is pinned.
                    let pinned = map
                        .values()
                        .filter(|entry| entry.pinned.load(Ordering::Relaxed))
                        .count();
                    if pinned > 0 {
                        warn!(
                            capacity,
                            cached = map.len(),
                            pinned,
                            "pinned tenants exceed capacity"
                        );
                    }
                    break;
                }
            }
        }
    }

    /// Protect a cached tenant from capacity eviction.
    ///
    /// Returns `false` if the tenant is not cached.
    pub fn pin(&self, tenant_id: Uuid) -> bool {
        self.set_pinned(tenant_id, true)
    }

    /// Make a pinned tenant evictable again.
    ///
    /// Returns `false` if the tenant is not cached.
    pub fn unpin(&self, tenant_id: Uuid) -> bool {
        self.set_pinned(tenant_id, false)
    }

    fn set_pinned(&self, tenant_id: Uuid, pinned: bool) -> bool {
        // Under the gate so no concurrent publication reads a stale pin flag.
        let _gate = self.write_gate.lock().unwrap_or_else(PoisonError::into_inner);
        match self.services.load().get(&tenant_id) {
            Some(entry) => {
                entry.pinned.store(pinned, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Drop the cached service for `tenant_id`, pinned or not.
    ///
    /// Returns `true` if a service was removed. The next
    /// [`get_service`](Self::get_service) builds a new instance.
    pub fn evict(&self, tenant_id: Uuid) -> bool {
        let _gate = self.write_gate.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.services.load_full();
        if !current.contains_key(&tenant_id) {
            return false;
        }
        let mut next: ServiceMap = HashMap::clone(&current);
        next.remove(&tenant_id);
        self.services.store(Arc::new(next));
        debug!(%tenant_id, "tenant encryption service evicted");
        true
    }
}
