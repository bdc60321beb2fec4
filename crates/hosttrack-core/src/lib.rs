//! hosttrack-core — address keys, key hashing, service entries and config.
//! The cache in hosttrack-services is built on these types.

pub mod config;
pub mod key;
pub mod service;

pub use key::{hash_key, AddressKey, BuildKeyHasher, KeyHasher};
pub use service::{AppId, Port, Protocol, ServiceEntry, UNKNOWN_APP_ID};
