//! Host cache — bounded, shared map from address to host tracker.
//!
//! One instance is built at startup and handed to every packet worker. The map
//! sits behind a single lock. On the packet path (`add_host`, `find`,
//! `add_service`) it is held for O(1) work: hashing the key, one LRU lookup or
//! insert, and cloning an `Arc`. Resolver calls, service updates and the final
//! drop of displaced trackers all happen outside it.
//!
//! Eviction is least-recently-used. Both `find` and `add_host` count as a use;
//! `contains`, `hosts` and `snapshot` do not.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hosttrack_core::config::{CacheConfig, ConfigError};
use hosttrack_core::{AddressKey, BuildKeyHasher, Port, Protocol, ServiceEntry};
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::host::{HostSnapshot, HostTracker};
use crate::protocol::ProtocolResolver;

type HostMap = LruCache<AddressKey, Arc<HostTracker>, BuildKeyHasher>;

/// The host cache shared between packet workers.
pub type SharedHostCache = Arc<HostCache>;

pub struct HostCache {
    hosts: Mutex<HostMap>,
    resolver: Arc<dyn ProtocolResolver>,
    counters: Counters,
}

/// Counter snapshot returned by [`HostCache::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub lookups: u64,
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    /// Inserts that displaced a tracker already filed under the same key.
    pub replaced: u64,
    /// Trackers dropped to stay within capacity.
    pub evictions: u64,
    pub removed: u64,
}

#[derive(Default)]
struct Counters {
    lookups: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    replaced: AtomicU64,
    evictions: AtomicU64,
    removed: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            lookups: self.lookups.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            replaced: self.replaced.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
        }
    }
}

impl HostCache {
    pub fn new(capacity: NonZeroUsize, resolver: Arc<dyn ProtocolResolver>) -> Self {
        Self {
            hosts: Mutex::new(LruCache::with_hasher(capacity, BuildKeyHasher::default())),
            resolver,
            counters: Counters::default(),
        }
    }

    pub fn from_config(
        config: &CacheConfig,
        resolver: Arc<dyn ProtocolResolver>,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(config.capacity()?, resolver))
    }

    /// File a tracker under its address, replacing any tracker already there.
    ///
    /// When a new key arrives at a full cache, the least recently used host is
    /// evicted first. Holders of the evicted tracker keep a valid handle.
    pub fn add_host(&self, host: Arc<HostTracker>) {
        let key = host.key();
        let displaced = self.hosts.lock().push(key, host);
        Counters::bump(&self.counters.inserts);

        match displaced {
            Some((old_key, _)) if old_key == key => {
                Counters::bump(&self.counters.replaced);
                tracing::debug!(%key, "host tracker replaced");
            }
            Some((old_key, _)) => {
                Counters::bump(&self.counters.evictions);
                tracing::debug!(evicted = %old_key, inserted = %key, "host cache full, evicted lru host");
            }
            None => tracing::trace!(%key, "host added"),
        }
    }

    /// Share `host` with the cache and hand back the caller's handle.
    pub fn add_host_tracker(&self, host: HostTracker) -> Arc<HostTracker> {
        let host = Arc::new(host);
        self.add_host(Arc::clone(&host));
        host
    }

    /// Look a host up and mark it recently used.
    pub fn find(&self, ip: impl Into<AddressKey>) -> Option<Arc<HostTracker>> {
        let key = ip.into();
        let found = self.hosts.lock().get(&key).cloned();

        Counters::bump(&self.counters.lookups);
        if found.is_some() {
            Counters::bump(&self.counters.hits);
        } else {
            Counters::bump(&self.counters.misses);
        }
        found
    }

    /// Is the host resident? Does not affect eviction order.
    pub fn contains(&self, ip: impl Into<AddressKey>) -> bool {
        self.hosts.lock().contains(&ip.into())
    }

    /// Record a service seen on a known host.
    ///
    /// Returns true only when the host is in the cache and had nothing yet on
    /// (protocol, port). Never creates a host.
    pub fn add_service(
        &self,
        ip: impl Into<AddressKey>,
        protocol: Protocol,
        port: Port,
        protocol_name: &str,
    ) -> bool {
        let key = ip.into();
        let app_id = self.resolver.resolve(protocol_name);

        let Some(host) = self.find(key) else {
            tracing::trace!(%key, protocol, port, "service on unknown host ignored");
            return false;
        };

        let added = host.add_service(ServiceEntry::new(protocol, port, app_id));
        if added {
            tracing::trace!(%key, protocol, port, app_id, protocol_name, "service recorded");
        }
        added
    }

    /// Drop the cache's handle on a host.
    pub fn remove(&self, ip: impl Into<AddressKey>) -> Option<Arc<HostTracker>> {
        let removed = self.hosts.lock().pop(&ip.into());
        if removed.is_some() {
            Counters::bump(&self.counters.removed);
        }
        removed
    }

    /// Drop every host. Trackers still held elsewhere stay valid.
    pub fn clear(&self) {
        // allocate the empty map before taking the lock
        let mut fresh: HostMap = LruCache::with_hasher(self.capacity(), BuildKeyHasher::default());
        let old = {
            let mut hosts = self.hosts.lock();
            if fresh.cap() != hosts.cap() {
                fresh.resize(hosts.cap());
            }
            std::mem::replace(&mut *hosts, fresh)
        };
        tracing::debug!(hosts = old.len(), "host cache cleared");
    }

    /// Change the bound, evicting least recently used hosts if it shrinks.
    pub fn set_capacity(&self, capacity: NonZeroUsize) {
        let evicted = {
            let mut hosts = self.hosts.lock();
            let mut evicted = Vec::with_capacity(hosts.len().saturating_sub(capacity.get()));
            while hosts.len() > capacity.get() {
                match hosts.pop_lru() {
                    Some(entry) => evicted.push(entry),
                    None => break,
                }
            }
            hosts.resize(capacity);
            evicted
        };

        if !evicted.is_empty() {
            self.counters
                .evictions
                .fetch_add(evicted.len() as u64, Ordering::Relaxed);
        }
        tracing::debug!(capacity = capacity.get(), evicted = evicted.len(), "host cache resized");
    }

    pub fn capacity(&self) -> NonZeroUsize {
        self.hosts.lock().cap()
    }

    pub fn len(&self) -> usize {
        self.hosts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.lock().is_empty()
    }

    /// Resident trackers, most recently used first.
    ///
    /// Walks the whole map under the lock; meant for status dumps, not the
    /// packet path.
    pub fn hosts(&self) -> Vec<Arc<HostTracker>> {
        self.hosts
            .lock()
            .iter()
            .map(|(_, host)| Arc::clone(host))
            .collect()
    }

    /// Copies of every resident tracker, most recently used first.
    pub fn snapshot(&self) -> Vec<HostSnapshot> {
        self.hosts().iter().map(|host| host.snapshot()).collect()
    }

    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }
}
