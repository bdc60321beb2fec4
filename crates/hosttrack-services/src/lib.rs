//! hosttrack-services — the concurrent host cache and the trackers it holds.

pub mod cache;
pub mod host;
pub mod protocol;

pub use cache::{CacheStats, HostCache, SharedHostCache};
pub use host::{HostSnapshot, HostTracker};
pub use protocol::{ProtocolReferences, ProtocolResolver};
