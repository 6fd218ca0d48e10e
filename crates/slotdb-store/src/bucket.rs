//! Per key length staging
//!
//! Keys are partitioned by length; each length gets a [`KeyLengthBucket`]
//! holding two scratch files:
//!
//! ```text
//! temp_index{len}.dat   [key bytes][varint data offset] ...
//! data{len}.dat         [0x00][varint value length][value bytes] ...
//! ```
//!
//! Byte 0 of every data file is a sentinel so that offset 0 can mean "empty
//! slot" in the final index. A value equal to the previous value of the same
//! length is not written again; its key points at the earlier copy.

use crate::error::{StoreError, StoreResult};
use crate::varint;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Staging state for one key length
pub(crate) struct KeyLengthBucket {
    key_length: usize,
    index_path: PathBuf,
    data_path: PathBuf,
    index_writer: BufWriter<File>,
    data_writer: BufWriter<File>,
    key_count: u64,
    value_count: u64,
    /// Running size of the data file, and offset of the next value
    data_length: u64,
    max_offset_width: usize,
    /// Last distinct value written and its encoded size (prefix + payload)
    last_value: Option<Vec<u8>>,
    last_value_size: u64,
}

impl KeyLengthBucket {
    /// Open the scratch files for `key_length` inside `scratch_dir`
    pub(crate) fn create(scratch_dir: &Path, key_length: usize) -> StoreResult<Self> {
        let index_path = scratch_dir.join(format!("temp_index{key_length}.dat"));
        let data_path = scratch_dir.join(format!("data{key_length}.dat"));

        let index_writer = BufWriter::new(File::create(&index_path)?);
        let mut data_writer = BufWriter::new(File::create(&data_path)?);

        // Reserve offset 0
        data_writer.write_all(&[0u8])?;

        debug!("Created staging files for key length {}", key_length);

        Ok(Self {
            key_length,
            index_path,
            data_path,
            index_writer,
            data_writer,
            key_count: 0,
            value_count: 0,
            data_length: 1,
            max_offset_width: 0,
            last_value: None,
            last_value_size: 0,
        })
    }

    /// Stage one key/value pair
    ///
    /// Returns `true` when the value was written to the data file, `false`
    /// when it repeated the previous value and was shared.
    pub(crate) fn put(&mut self, key: &[u8], value: &[u8]) -> StoreResult<bool> {
        debug_assert_eq!(key.len(), self.key_length);

        // Every fallible check runs before the first staged byte
        let same_value = self.last_value.as_deref() == Some(value);
        let (offset, value_len) = if same_value {
            (self.data_length - self.last_value_size, None)
        } else {
            (self.data_length, Some(value_length_prefix(value.len())?))
        };
        let offset = i64::try_from(offset)
            .map_err(|_| StoreError::FormatLimit(format!("data offset {offset} overflows")))?;

        self.index_writer.write_all(key)?;
        let width = varint::pack_long(&mut self.index_writer, offset)?;
        self.max_offset_width = self.max_offset_width.max(width);
        self.key_count += 1;

        if let Some(value_len) = value_len {
            let prefix_size = varint::pack_int(&mut self.data_writer, value_len)?;
            self.data_writer.write_all(value)?;

            let encoded_size = (prefix_size + value.len()) as u64;
            self.data_length += encoded_size;
            self.last_value = Some(value.to_vec());
            self.last_value_size = encoded_size;
            self.value_count += 1;
        }

        Ok(!same_value)
    }

    /// Flush and close both scratch files
    pub(crate) fn finish(self) -> StoreResult<StagedLength> {
        let Self {
            key_length,
            index_path,
            data_path,
            index_writer,
            data_writer,
            key_count,
            value_count,
            data_length,
            max_offset_width,
            ..
        } = self;

        // into_inner flushes; the files close when dropped here
        index_writer.into_inner().map_err(|e| e.into_error())?;
        data_writer.into_inner().map_err(|e| e.into_error())?;

        Ok(StagedLength {
            key_length,
            key_count,
            value_count,
            data_length,
            max_offset_width,
            index_path,
            data_path,
        })
    }
}

/// Length prefix for a value of `len` bytes
fn value_length_prefix(len: usize) -> StoreResult<i32> {
    i32::try_from(len)
        .map_err(|_| StoreError::FormatLimit(format!("value of {len} bytes is too large")))
}

/// A key length whose puts are complete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedLength {
    /// Length shared by every key in this group
    pub key_length: usize,
    /// Number of keys
    pub key_count: u64,
    /// Number of distinct values written to the data file
    pub value_count: u64,
    /// Size of the data file including the sentinel byte
    pub data_length: u64,
    /// Widest encoded offset seen
    pub max_offset_width: usize,
    /// Staged `(key, offset)` records
    pub index_path: PathBuf,
    /// Data file
    pub data_path: PathBuf,
}

impl StagedLength {
    /// Size of one slot: key bytes plus the widest offset
    pub fn slot_size(&self) -> usize {
        self.key_length + self.max_offset_width
    }

    /// Number of slots for `load_factor`
    #[allow(clippy::cast_precision_loss)]
    pub fn slot_count(&self, load_factor: f64) -> usize {
        (self.key_count as f64 / load_factor).round() as usize
    }
}
