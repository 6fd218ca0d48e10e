//! Open-addressing slot tables
//!
//! Each key length gets one table of `slot_count` fixed-size slots:
//!
//! ```text
//! slot = [key bytes (key_length)][varint offset, zero padded (max_offset_width)]
//! ```
//!
//! A slot whose offset decodes to 0 is empty, which is why every data file
//! starts with a sentinel byte. Keys are placed by linear probing from
//! `hash_key(key) mod slot_count`.

use crate::bucket::StagedLength;
use crate::error::{StoreError, StoreResult};
use crate::varint;
use memmap2::{MmapMut, MmapOptions};
use slotdb_hash::hash_key;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Outcome of building one slot table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStats {
    /// Key length the table serves
    pub key_length: usize,
    /// Keys placed
    pub key_count: u64,
    /// Slots in the table
    pub slot_count: usize,
    /// Bytes per slot
    pub slot_size: usize,
    /// Keys that did not land in their home slot
    pub collisions: u64,
    /// Built table file
    pub path: PathBuf,
}

impl IndexStats {
    /// Table size in bytes
    pub fn byte_len(&self) -> u64 {
        (self.slot_count as u64) * (self.slot_size as u64)
    }
}

/// Build the slot table for one staged key length into `out_dir`
///
/// The staged `temp_index{len}.dat` file is deleted once the table is built.
pub fn build_index(
    staged: &StagedLength,
    load_factor: f64,
    out_dir: &Path,
) -> StoreResult<IndexStats> {
    let key_length = staged.key_length;
    let slot_size = staged.slot_size();
    let slot_count = staged.slot_count(load_factor);
    let path = out_dir.join(format!("index{key_length}.dat"));

    let table_len = slot_count.checked_mul(slot_size).ok_or_else(|| {
        StoreError::FormatLimit(format!(
            "slot table for key length {key_length} overflows"
        ))
    })?;

    debug!(
        "Building index for key length {}: {} keys, {} slots of {} bytes",
        key_length, staged.key_count, slot_count, slot_size
    );

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&path)?;
    file.set_len(table_len as u64)?;

    let collisions = if table_len == 0 {
        0
    } else {
        #[allow(unsafe_code)]
        let mut map: MmapMut = unsafe { MmapOptions::new().map_mut(&file)? };
        let collisions = fill_table(staged, &mut map, slot_count, slot_size)?;
        map.flush()?;
        collisions
    };
    drop(file);

    fs::remove_file(&staged.index_path)?;

    info!(
        "Built index for key length {} with {} collisions",
        key_length, collisions
    );

    Ok(IndexStats {
        key_length,
        key_count: staged.key_count,
        slot_count,
        slot_size,
        collisions,
        path,
    })
}

fn fill_table(
    staged: &StagedLength,
    table: &mut [u8],
    slot_count: usize,
    slot_size: usize,
) -> StoreResult<u64> {
    let key_length = staged.key_length;
    let mut reader = BufReader::new(File::open(&staged.index_path)?);
    let mut key = vec![0u8; key_length];
    let mut collisions = 0u64;

    for _ in 0..staged.key_count {
        reader.read_exact(&mut key)?;
        let offset = varint::unpack_long(&mut reader)?;

        let home = hash_key(&key) as usize;
        let mut placed = false;
        let mut collided = false;

        for probe in 0..slot_count {
            let start = ((home + probe) % slot_count) * slot_size;
            let slot = &mut table[start..start + slot_size];

            let (existing, _) = varint::unpack_long_at(slot, key_length)?;
            if existing == 0 {
                slot[..key_length].copy_from_slice(&key);
                varint::pack_long_at(slot, key_length, offset)?;
                placed = true;
                break;
            }
            if slot[..key_length] == key[..] {
                return Err(StoreError::DuplicateKey {
                    key_length,
                    key: key.clone(),
                });
            }
            collided = true;
        }

        if !placed {
            return Err(StoreError::TableFull {
                key_length,
                slot_count,
            });
        }
        if collided {
            collisions += 1;
        }
    }

    // Anything left means the staged file and the counters disagree
    let mut trailing = [0u8; 1];
    match reader.read(&mut trailing) {
        Ok(0) => {}
        Ok(_) => {
            return Err(StoreError::FormatLimit(format!(
                "staged index for key length {key_length} holds more than {} records",
                staged.key_count
            )));
        }
        Err(e) if e.kind() == ErrorKind::Interrupted => {}
        Err(e) => return Err(e.into()),
    }

    Ok(collisions)
}

/// Read-only view over a built slot table
#[derive(Debug, Clone, Copy)]
pub struct SlotTable<'a> {
    bytes: &'a [u8],
    key_length: usize,
    slot_size: usize,
}

impl<'a> SlotTable<'a> {
    /// Wrap `bytes` as a table of `slot_size` byte slots
    pub fn new(bytes: &'a [u8], key_length: usize, slot_size: usize) -> StoreResult<Self> {
        if slot_size <= key_length || bytes.len() % slot_size != 0 {
            return Err(StoreError::FormatLimit(format!(
                "{} bytes is not a table of {slot_size} byte slots for key length {key_length}",
                bytes.len()
            )));
        }
        Ok(Self {
            bytes,
            key_length,
            slot_size,
        })
    }

    /// Number of slots
    pub fn slot_count(&self) -> usize {
        self.bytes.len() / self.slot_size
    }

    /// Raw bytes of slot `index`
    pub fn slot(&self, index: usize) -> Option<&'a [u8]> {
        let start = index.checked_mul(self.slot_size)?;
        self.bytes.get(start..start + self.slot_size)
    }

    /// Data offset stored for `key`, following the build probe sequence
    pub fn find(&self, key: &[u8]) -> StoreResult<Option<u64>> {
        let slot_count = self.slot_count();
        if key.len() != self.key_length || slot_count == 0 {
            return Ok(None);
        }

        let home = hash_key(key) as usize;
        for probe in 0..slot_count {
            let start = ((home + probe) % slot_count) * self.slot_size;
            let slot = &self.bytes[start..start + self.slot_size];

            let (offset, _) = varint::unpack_long_at(slot, self.key_length)?;
            if offset == 0 {
                return Ok(None);
            }
            if &slot[..self.key_length] == key {
                return Ok(Some(offset.unsigned_abs()));
            }
        }

        Ok(None)
    }

    /// Occupied slots in table order
    pub fn entries(&self) -> impl Iterator<Item = StoreResult<(&'a [u8], u64)>> + '_ {
        let key_length = self.key_length;
        (0..self.slot_count())
            .filter_map(move |i| self.slot(i))
            .filter_map(move |slot| match varint::unpack_long_at(slot, key_length) {
                Ok((0, _)) => None,
                Ok((offset, _)) => Some(Ok((&slot[..key_length], offset.unsigned_abs()))),
                Err(e) => Some(Err(e.into())),
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::bucket::KeyLengthBucket;

    fn stage(dir: &Path, key_length: usize, pairs: &[(&[u8], &[u8])]) -> StagedLength {
        let mut bucket = KeyLengthBucket::create(dir, key_length).unwrap();
        for (key, value) in pairs {
            bucket.put(key, value).unwrap();
        }
        bucket.finish().unwrap()
    }

    #[test]
    fn test_build_and_find() {
        let dir = tempfile::tempdir().unwrap();
        let staged = stage(
            dir.path(),
            2,
            &[(b"aa", b"one"), (b"bb", b"two"), (b"cc", b"two"), (b"dd", b"x")],
        );

        let stats = build_index(&staged, 0.75, dir.path()).unwrap();
        assert_eq!(stats.key_count, 4);
        assert_eq!(stats.slot_count, 5);
        assert_eq!(stats.slot_size, 3);
        assert!(!staged.index_path.exists());

        let bytes = fs::read(&stats.path).unwrap();
        assert_eq!(bytes.len() as u64, stats.byte_len());

        let table = SlotTable::new(&bytes, 2, stats.slot_size).unwrap();
        assert_eq!(table.find(b"aa").unwrap(), Some(1));
        assert_eq!(table.find(b"bb").unwrap(), Some(5));
        // Shares the copy written for "bb"
        assert_eq!(table.find(b"cc").unwrap(), Some(5));
        assert_eq!(table.find(b"dd").unwrap(), Some(9));
        assert_eq!(table.find(b"zz").unwrap(), None);
        assert_eq!(table.find(b"a").unwrap(), None);
        assert_eq!(table.entries().count(), 4);
    }

    #[test]
    fn test_every_slot_has_fixed_width() {
        let dir = tempfile::tempdir().unwrap();
        let big = vec![0xEEu8; 300];
        let staged = stage(dir.path(), 1, &[(&[1], &big), (&[2], b"y"), (&[3], b"z")]);
        assert_eq!(staged.max_offset_width, 2);

        let stats = build_index(&staged, 0.5, dir.path()).unwrap();
        assert_eq!(stats.slot_size, 3);
        assert_eq!(stats.slot_count, 6);

        let bytes = fs::read(&stats.path).unwrap();
        assert_eq!(bytes.len(), 18);

        let table = SlotTable::new(&bytes, 1, 3).unwrap();
        assert_eq!(table.find(&[1]).unwrap(), Some(1));
        assert_eq!(table.find(&[2]).unwrap(), Some(303));
        assert_eq!(table.find(&[3]).unwrap(), Some(305));
    }

    #[test]
    fn test_duplicate_key_detected_at_build() {
        let dir = tempfile::tempdir().unwrap();
        let staged = stage(dir.path(), 3, &[(b"key", b"a"), (b"key", b"b")]);

        let err = build_index(&staged, 0.75, dir.path()).unwrap_err();
        assert!(matches!(
            err,
            StoreError::DuplicateKey { key_length: 3, ref key } if key == b"key"
        ));
    }

    #[test]
    fn test_collisions_counted_once_per_key() {
        let dir = tempfile::tempdir().unwrap();
        let keys: Vec<[u8; 1]> = (0u8..=200).map(|b| [b]).collect();
        let pairs: Vec<(&[u8], &[u8])> = keys.iter().map(|k| (&k[..], &k[..])).collect();
        let staged = stage(dir.path(), 1, &pairs);

        let stats = build_index(&staged, 0.95, dir.path()).unwrap();
        assert!(stats.collisions > 0);
        assert!(stats.collisions < stats.key_count);

        let bytes = fs::read(&stats.path).unwrap();
        let table = SlotTable::new(&bytes, 1, stats.slot_size).unwrap();
        for key in &keys {
            assert!(table.find(key).unwrap().is_some());
        }
        assert_eq!(table.entries().count(), keys.len());
    }

    #[test]
    fn test_slot_table_rejects_bad_geometry() {
        assert!(SlotTable::new(&[0u8; 7], 1, 3).is_err());
        assert!(SlotTable::new(&[0u8; 6], 3, 3).is_err());

        let empty = SlotTable::new(&[], 2, 3).unwrap();
        assert_eq!(empty.slot_count(), 0);
        assert_eq!(empty.find(b"ab").unwrap(), None);
    }
}
