//! Protocol registry — maps application protocol names to numeric ids.
//!
//! The cache only ever sees a `ProtocolResolver`. `ProtocolReferences` is the
//! registry the pipeline normally hands it; tests usually pass a closure.

use std::sync::atomic::{AtomicI32, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use hosttrack_core::config::ProtocolConfig;
use hosttrack_core::{AppId, UNKNOWN_APP_ID};

/// Resolves a protocol name to its application id.
///
/// Must be a pure function of the name for the life of the process, and must
/// answer every name (with `UNKNOWN_APP_ID` if nothing better applies).
pub trait ProtocolResolver: Send + Sync {
    fn resolve(&self, name: &str) -> AppId;
}

impl<F> ProtocolResolver for F
where
    F: Fn(&str) -> AppId + Send + Sync,
{
    fn resolve(&self, name: &str) -> AppId {
        self(name)
    }
}

/// Registry that hands out ids on first reference, starting at 1.
///
/// Ids are never reused or reassigned. Once `max_references` names are held,
/// new names resolve to `UNKNOWN_APP_ID` and are not recorded.
pub struct ProtocolReferences {
    ids: DashMap<String, AppId>,
    next: AtomicI32,
    max_references: u16,
}

impl Default for ProtocolReferences {
    fn default() -> Self {
        Self::new(ProtocolConfig::default().max_references)
    }
}

impl ProtocolReferences {
    pub fn new(max_references: u16) -> Self {
        Self {
            ids: DashMap::new(),
            next: AtomicI32::new(1),
            max_references: max_references.min(AppId::MAX as u16),
        }
    }

    pub fn from_config(config: &ProtocolConfig) -> Self {
        Self::new(config.max_references)
    }

    /// Id for `name`, registering it if this is the first reference.
    pub fn add_reference(&self, name: &str) -> AppId {
        if name.is_empty() {
            return UNKNOWN_APP_ID;
        }
        if let Some(id) = self.ids.get(name) {
            return *id;
        }
        match self.ids.entry(name.to_owned()) {
            Entry::Occupied(e) => *e.get(),
            Entry::Vacant(v) => {
                // the shard lock is held, so only one thread gets here per name
                let max = i32::from(self.max_references);
                let Ok(id) = self.next.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                    (n <= max).then_some(n + 1)
                }) else {
                    tracing::warn!(
                        protocol = name,
                        max = self.max_references,
                        "protocol registry full"
                    );
                    return UNKNOWN_APP_ID;
                };
                let id = id as AppId;
                v.insert(id);
                tracing::debug!(protocol = name, app_id = id, "protocol registered");
                id
            }
        }
    }

    /// Id for `name` if it has been registered. Never registers.
    pub fn find(&self, name: &str) -> Option<AppId> {
        self.ids.get(name).map(|id| *id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl ProtocolResolver for ProtocolReferences {
    fn resolve(&self, name: &str) -> AppId {
        self.add_reference(name)
    }
}
