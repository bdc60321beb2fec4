//! Host trackers — what has been learned about one address.
//!
//! A tracker is shared as `Arc<HostTracker>` between the cache and whoever
//! looked it up. Its service set has its own lock, so recording a service on
//! one host never waits on another host.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv6Addr};

use hosttrack_core::{AddressKey, Port, Protocol, ServiceEntry};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Services discovered on a single host.
#[derive(Debug)]
pub struct HostTracker {
    /// Address as observed, not the normalized key.
    ip_addr: IpAddr,
    services: RwLock<HashMap<(Protocol, Port), ServiceEntry>>,
}

/// Point-in-time copy of a tracker, for dumps and status output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSnapshot {
    pub ip_addr: IpAddr,
    /// Ordered by (protocol, port).
    pub services: Vec<ServiceEntry>,
}

impl Default for HostTracker {
    fn default() -> Self {
        Self::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED))
    }
}

impl HostTracker {
    pub fn new(ip_addr: IpAddr) -> Self {
        Self {
            ip_addr,
            services: RwLock::new(HashMap::new()),
        }
    }

    /// Set the address. Only possible while the tracker is exclusively owned,
    /// i.e. before it is handed to the cache.
    pub fn set_ip_addr(&mut self, ip_addr: IpAddr) {
        self.ip_addr = ip_addr;
    }

    pub fn ip_addr(&self) -> IpAddr {
        self.ip_addr
    }

    /// The cache key this tracker is filed under.
    pub fn key(&self) -> AddressKey {
        AddressKey::from(self.ip_addr)
    }

    /// Record a service. Returns false, leaving the existing entry alone, if
    /// the host already has one for the same (protocol, port).
    pub fn add_service(&self, entry: ServiceEntry) -> bool {
        match self.services.write().entry(entry.slot()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(entry);
                true
            }
        }
    }

    pub fn find_service(&self, protocol: Protocol, port: Port) -> Option<ServiceEntry> {
        self.services.read().get(&(protocol, port)).copied()
    }

    pub fn service_count(&self) -> usize {
        self.services.read().len()
    }

    /// All recorded services, ordered by (protocol, port).
    pub fn services(&self) -> Vec<ServiceEntry> {
        let mut services: Vec<ServiceEntry> = self.services.read().values().copied().collect();
        services.sort_unstable_by_key(ServiceEntry::slot);
        services
    }

    pub fn snapshot(&self) -> HostSnapshot {
        HostSnapshot {
            ip_addr: self.ip_addr,
            services: self.services(),
        }
    }
}
