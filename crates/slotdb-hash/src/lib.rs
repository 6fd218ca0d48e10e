//! Key hashing for slotdb store files
//!
//! Every slot table in a store file is addressed by the same seeded hash:
//! MurmurHash3 x86-32 with [`KEY_HASH_SEED`], masked to 31 bits. Writers and
//! readers must agree on both, so the seed is part of the file format.
//!
//! # Examples
//!
//! ```
//! use slotdb_hash::{hash_key, Murmur3, KEY_HASH_SEED};
//!
//! let probe_seed = hash_key(b"user:1234");
//! assert!(probe_seed <= 0x7fff_ffff);
//!
//! let mut hasher = Murmur3::new(KEY_HASH_SEED);
//! hasher.update(b"user:");
//! hasher.update(b"1234");
//! assert_eq!(hasher.finish() & 0x7fff_ffff, probe_seed);
//! ```

#![warn(missing_docs)]

pub mod murmur3;

pub use murmur3::Murmur3;

/// Seed shared by every writer and reader of the store format.
///
/// Changing it invalidates all previously written files.
pub const KEY_HASH_SEED: u32 = 42;

/// Mask that keeps a hash non-negative when read as a signed 32-bit value
pub const NON_NEGATIVE_MASK: u32 = 0x7fff_ffff;

/// Hash a key into the probe seed used for slot addressing
pub fn hash_key(key: &[u8]) -> u32 {
    Murmur3::hash(key, KEY_HASH_SEED) & NON_NEGATIVE_MASK
}
