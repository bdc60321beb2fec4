//! Address keys — the fixed-width identity every cache lookup is made with.
//!
//! Every observed address, IPv4 or IPv6, is normalized into 16 bytes:
//!
//! - 16-byte input is taken verbatim.
//! - 4-byte input is IPv4 and lands in the IPv4-mapped range `::ffff:a.b.c.d`.
//! - Any other length is truncated or zero-padded to 16 bytes.
//!
//! Normalization never fails. A caller handing over a 7-byte "address" gets a
//! deterministic key back, not an error.

use std::fmt;
use std::hash::{BuildHasherDefault, Hash, Hasher};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

// ── Key ───────────────────────────────────────────────────────────────────────

/// Normalized 16-byte address. The default key is all-zero (`::`).
///
/// Equality is byte-for-byte; two keys are equal iff they normalize the same
/// address.
#[derive(Clone, Copy, Default, PartialEq, Eq, AsBytes, FromBytes, FromZeroes)]
#[repr(C)]
pub struct AddressKey {
    bytes: [u8; 16],
}

assert_eq_size!(AddressKey, [u8; 16]);

impl AddressKey {
    /// Wrap 16 already-normalized bytes.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self { bytes }
    }

    /// Normalize a raw address of any length. See the module docs for the rules.
    pub fn from_slice(raw: &[u8]) -> Self {
        if let Ok(v4) = <[u8; 4]>::try_from(raw) {
            return Self::from(Ipv4Addr::from(v4));
        }
        if let Some(key) = Self::read_from(raw) {
            return key;
        }
        let mut bytes = [0u8; 16];
        let n = raw.len().min(bytes.len());
        bytes[..n].copy_from_slice(&raw[..n]);
        Self { bytes }
    }

    pub fn octets(&self) -> [u8; 16] {
        self.bytes
    }

    /// The address this key stands for. IPv4-mapped keys come back as IPv4.
    pub fn to_ip_addr(&self) -> IpAddr {
        let v6 = Ipv6Addr::from(self.bytes);
        match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        }
    }
}

impl From<[u8; 16]> for AddressKey {
    fn from(bytes: [u8; 16]) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for AddressKey {
    fn from(raw: &[u8]) -> Self {
        Self::from_slice(raw)
    }
}

impl From<Ipv4Addr> for AddressKey {
    fn from(ip: Ipv4Addr) -> Self {
        Self::new(ip.to_ipv6_mapped().octets())
    }
}

impl From<Ipv6Addr> for AddressKey {
    fn from(ip: Ipv6Addr) -> Self {
        Self::new(ip.octets())
    }
}

impl From<IpAddr> for AddressKey {
    fn from(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(v4) => v4.into(),
            IpAddr::V6(v6) => v6.into(),
        }
    }
}

impl From<&IpAddr> for AddressKey {
    fn from(ip: &IpAddr) -> Self {
        (*ip).into()
    }
}

impl From<&AddressKey> for AddressKey {
    fn from(key: &AddressKey) -> Self {
        *key
    }
}

impl PartialEq<[u8; 16]> for AddressKey {
    fn eq(&self, other: &[u8; 16]) -> bool {
        self.bytes == *other
    }
}

// Feed the raw 16 bytes in a single write, with no length prefix, so that
// hashing through `BuildKeyHasher` matches `hash_key` exactly.
impl Hash for AddressKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write(self.as_bytes());
    }
}

impl fmt::Display for AddressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_ip_addr(), f)
    }
}

impl fmt::Debug for AddressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AddressKey({})", self.to_ip_addr())
    }
}

// ── Hashing ───────────────────────────────────────────────────────────────────

/// Hasher used to index the host cache.
///
/// Input is consumed in 8-byte little-endian words (the tail zero-padded);
/// each word is added to the running state and pushed through the MurmurHash3
/// 64-bit finalizer. The result is stable across runs and platforms.
///
/// Fixed vector: the key
/// `0a ff 12 00 00 00 00 00 0b 00 56 00 00 00 00 00` hashes to
/// `3460608711875772609`. The all-zero key hashes to `0`.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyHasher {
    state: u64,
}

impl Hasher for KeyHasher {
    fn write(&mut self, bytes: &[u8]) {
        for chunk in bytes.chunks(8) {
            let mut word = [0u8; 8];
            word[..chunk.len()].copy_from_slice(chunk);
            self.state = fmix64(self.state.wrapping_add(u64::from_le_bytes(word)));
        }
    }

    fn finish(&self) -> u64 {
        self.state
    }
}

pub type BuildKeyHasher = BuildHasherDefault<KeyHasher>;

/// Hash a key. Identical to hashing it through `BuildKeyHasher`.
pub fn hash_key(key: &AddressKey) -> u64 {
    let mut hasher = KeyHasher::default();
    hasher.write(key.as_bytes());
    hasher.finish()
}

/// XOR of the two little-endian 64-bit halves of the key.
///
/// This is the bucket value older deployments stored. Only useful when
/// matching such a layout; IPv4-mapped keys fold with their low 16 bits
/// always zero, so it is not used to index the cache.
pub fn legacy_fold(key: &AddressKey) -> u64 {
    let (lo, hi) = key.bytes.split_at(8);
    let mut lo_word = [0u8; 8];
    let mut hi_word = [0u8; 8];
    lo_word.copy_from_slice(lo);
    hi_word.copy_from_slice(hi);
    u64::from_le_bytes(lo_word) ^ u64::from_le_bytes(hi_word)
}

const fn fmix64(mut k: u64) -> u64 {
    k ^= k >> 33;
    k = k.wrapping_mul(0xff51_afd7_ed55_8ccd);
    k ^= k >> 33;
    k = k.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    k ^= k >> 33;
    k
}

// ── Tests ─────────────────────────────────────────────────────────────────────
