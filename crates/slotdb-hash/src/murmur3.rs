//! MurmurHash3 (x86, 32-bit) with an incremental interface
//!
//! The hash is Austin Appleby's `MurmurHash3_x86_32`. Input may be fed in any
//! number of `update` calls; the result only depends on the concatenated bytes
//! and the seed, so a split update hashes the same as a single-shot one.

const C1: u32 = 0xcc9e_2d51;
const C2: u32 = 0x1b87_3593;

/// Incremental MurmurHash3 x86-32 state
#[derive(Debug, Clone)]
pub struct Murmur3 {
    seed: u32,
    h1: u32,
    length: u32,
    /// Bytes of the current, not yet complete, 4-byte block
    partial: u32,
    partial_len: u8,
}

impl Murmur3 {
    /// Create a hasher with the given seed
    pub const fn new(seed: u32) -> Self {
        Self {
            seed,
            h1: seed,
            length: 0,
            partial: 0,
            partial_len: 0,
        }
    }

    /// Hash `data` in one call
    ///
    /// # Examples
    ///
    /// ```
    /// use slotdb_hash::Murmur3;
    ///
    /// assert_eq!(Murmur3::hash(b"", 1), 0x514e_28b7);
    /// ```
    pub fn hash(data: &[u8], seed: u32) -> u32 {
        let mut hasher = Self::new(seed);
        hasher.update(data);
        hasher.finish()
    }

    /// Seed this hasher was created with
    pub const fn seed(&self) -> u32 {
        self.seed
    }

    /// Feed a single byte
    pub fn update_byte(&mut self, byte: u8) {
        self.partial |= u32::from(byte) << (8 * u32::from(self.partial_len));
        self.partial_len += 1;
        if self.partial_len == 4 {
            self.apply_block(self.partial);
            self.partial = 0;
            self.partial_len = 0;
        }
        self.length = self.length.wrapping_add(1);
    }

    /// Feed a slice of bytes
    pub fn update(&mut self, mut data: &[u8]) {
        // Complete a block left over from a previous call first
        while self.partial_len != 0 {
            let Some((&byte, rest)) = data.split_first() else {
                return;
            };
            self.update_byte(byte);
            data = rest;
        }

        let mut blocks = data.chunks_exact(4);
        for block in &mut blocks {
            self.apply_block(u32::from_le_bytes([block[0], block[1], block[2], block[3]]));
            self.length = self.length.wrapping_add(4);
        }

        for &byte in blocks.remainder() {
            self.update_byte(byte);
        }
    }

    /// Finalize the hash of everything fed so far
    ///
    /// The state is left untouched, more input may follow.
    pub fn finish(&self) -> u32 {
        let mut h = self.h1;
        if self.partial_len > 0 {
            h ^= scramble(self.partial);
        }
        h ^= self.length;
        fmix(h)
    }

    /// Forget all input, keeping the seed
    pub fn reset(&mut self) {
        self.h1 = self.seed;
        self.length = 0;
        self.partial = 0;
        self.partial_len = 0;
    }

    fn apply_block(&mut self, k1: u32) {
        self.h1 ^= scramble(k1);
        self.h1 = self.h1.rotate_left(13);
        self.h1 = self.h1.wrapping_mul(5).wrapping_add(0xe654_6b64);
    }
}

fn scramble(k1: u32) -> u32 {
    k1.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2)
}

/// Final avalanche
fn fmix(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_murmur3_reference_vectors() {
        let test_cases: Vec<(&[u8], u32, u32)> = vec![
            (b"", 0, 0),
            (b"", 1, 0x514e_28b7),
            (b"", 0xffff_ffff, 0x81f1_6f39),
            (b"\0\0\0\0", 0, 0x2362_f9de),
            (b"abc", 0, 0xb3dd_93fa),
            (b"aaaa", 0x9747_b28c, 0x5a97_808a),
            (b"Hello, world!", 0x9747_b28c, 0x2488_4cba),
            (
                b"The quick brown fox jumps over the lazy dog",
                0x9747_b28c,
                0x2fa8_26cd,
            ),
        ];

        for (data, seed, expected) in test_cases {
            let result = Murmur3::hash(data, seed);
            assert_eq!(
                result,
                expected,
                "{:?} seed 0x{seed:08x}: got 0x{result:08x}, want 0x{expected:08x}",
                String::from_utf8_lossy(data),
            );
        }
    }

    #[test]
    fn test_murmur3_split_updates() {
        let data = b"The quick brown fox jumps over the lazy dog";
        let expected = Murmur3::hash(data, 42);

        for split in 0..data.len() {
            let mut hasher = Murmur3::new(42);
            hasher.update(&data[..split]);
            hasher.update(&data[split..]);
            assert_eq!(hasher.finish(), expected, "split at {split}");
        }

        let mut hasher = Murmur3::new(42);
        for &byte in data {
            hasher.update_byte(byte);
        }
        assert_eq!(hasher.finish(), expected);
    }

    #[test]
    fn test_murmur3_reset() {
        let mut hasher = Murmur3::new(42);
        hasher.update(b"foo");
        let first = hasher.finish();

        hasher.update(b"bar");
        assert_ne!(hasher.finish(), first);

        hasher.reset();
        hasher.update(b"foo");
        assert_eq!(hasher.finish(), first);
        assert_eq!(hasher.seed(), 42);
    }

    #[test]
    fn test_murmur3_finish_is_repeatable() {
        let mut hasher = Murmur3::new(7);
        hasher.update(b"abcde");
        assert_eq!(hasher.finish(), hasher.finish());
    }
}
