//! Store metadata block
//!
//! The metadata block opens every store file. All fixed-width integers are
//! big-endian; strings are a `u16` byte length followed by UTF-8 bytes.
//!
//! ```text
//! format_version       utf        "SLOTDB_V1"
//! created_at           i64        epoch milliseconds
//! key_count            i32
//! key_length_count     i32
//! max_key_length       i32        0 for an empty store
//! descriptors          28 bytes per key length, ascending
//! serializer count     i32
//!   value_type         utf
//!   serializer         utf
//! index_section_offset i32        absolute
//! data_section_offset  i64        absolute
//! ```

use crate::bucket::StagedLength;
use crate::error::{StoreError, StoreResult};
use crate::serializer::SerializerDescriptor;
use binrw::{BinRead, BinWrite};
use std::io::{self, Cursor, Read, Seek, Write};
use std::ops::Range;

/// Version tag written at the start of every store
pub const FORMAT_VERSION: &str = "SLOTDB_V1";

/// Encoded size of a [`KeyLengthDescriptor`]
pub const DESCRIPTOR_SIZE: usize = 28;

/// Fixed fields following the version tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(big)]
struct MetadataHeader {
    created_at: i64,
    key_count: i32,
    key_length_count: i32,
    max_key_length: i32,
}

/// Trailer locating the index and data sections
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(big)]
struct SectionOffsets {
    index_section_offset: i32,
    data_section_offset: i64,
}

/// Geometry of one key length
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(big)]
pub struct KeyLengthDescriptor {
    /// Key length in bytes
    pub key_length: i32,
    /// Keys of this length
    pub key_count: i32,
    /// Slots in the table
    pub slot_count: i32,
    /// Bytes per slot
    pub slot_size: i32,
    /// Table start, relative to the index section
    pub index_offset: i32,
    /// Data file start, relative to the data section
    pub data_offset: i64,
}

impl KeyLengthDescriptor {
    /// Table size in bytes
    pub fn index_len(&self) -> u64 {
        u64::try_from(i64::from(self.slot_count) * i64::from(self.slot_size)).unwrap_or(0)
    }
}

/// Decoded metadata block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreMetadata {
    /// Format version tag
    pub format_version: String,
    /// Creation time in epoch milliseconds
    pub created_at: i64,
    /// Total number of keys
    pub key_count: i32,
    /// Number of distinct key lengths
    pub key_length_count: i32,
    /// Longest key length, 0 when empty
    pub max_key_length: i32,
    /// Per key length geometry, ascending by length
    pub descriptors: Vec<KeyLengthDescriptor>,
    /// Registered value serializers
    pub serializers: Vec<SerializerDescriptor>,
    /// Absolute offset of the index section
    pub index_section_offset: i32,
    /// Absolute offset of the data section
    pub data_section_offset: i64,
}

impl StoreMetadata {
    /// Lay out metadata for staged key lengths
    ///
    /// `staged` must be sorted by ascending key length.
    pub fn build(
        created_at: i64,
        staged: &[StagedLength],
        load_factor: f64,
        serializers: Vec<SerializerDescriptor>,
    ) -> StoreResult<Self> {
        let mut descriptors = Vec::with_capacity(staged.len());
        let mut index_offset = 0u64;
        let mut data_offset = 0u64;
        let mut key_count = 0u64;

        for length in staged {
            let slot_count = length.slot_count(load_factor);
            let slot_size = length.slot_size();

            descriptors.push(KeyLengthDescriptor {
                key_length: to_i32(length.key_length, "key length")?,
                key_count: to_i32(length.key_count, "key count")?,
                slot_count: to_i32(slot_count, "slot count")?,
                slot_size: to_i32(slot_size, "slot size")?,
                index_offset: to_i32(index_offset, "index offset")?,
                data_offset: to_i64(data_offset, "data offset")?,
            });

            index_offset += (slot_count as u64) * (slot_size as u64);
            data_offset += length.data_length;
            key_count += length.key_count;
        }

        let max_key_length = staged.last().map_or(0, |l| l.key_length);

        let mut metadata = Self {
            format_version: FORMAT_VERSION.to_string(),
            created_at,
            key_count: to_i32(key_count, "key count")?,
            key_length_count: to_i32(staged.len(), "key length count")?,
            max_key_length: to_i32(max_key_length, "max key length")?,
            descriptors,
            serializers,
            index_section_offset: 0,
            data_section_offset: 0,
        };

        let metadata_len = metadata.encoded_len();
        metadata.index_section_offset = to_i32(metadata_len, "index section offset")?;
        metadata.data_section_offset = to_i64(metadata_len + index_offset, "data section offset")?;

        Ok(metadata)
    }

    /// Size of the encoded block
    pub fn encoded_len(&self) -> u64 {
        let utf = |s: &str| 2 + s.len() as u64;
        let serializers: u64 = self
            .serializers
            .iter()
            .map(|s| utf(&s.value_type) + utf(&s.serializer))
            .sum();

        utf(&self.format_version)
            + 20
            + (self.descriptors.len() * DESCRIPTOR_SIZE) as u64
            + 4
            + serializers
            + 12
    }

    /// Total size of the index section
    pub fn index_section_len(&self) -> u64 {
        self.descriptors.iter().map(KeyLengthDescriptor::index_len).sum()
    }

    /// Descriptor for `key_length`, if present
    pub fn descriptor(&self, key_length: usize) -> Option<&KeyLengthDescriptor> {
        let key_length = i32::try_from(key_length).ok()?;
        self.descriptors
            .binary_search_by_key(&key_length, |d| d.key_length)
            .ok()
            .map(|i| &self.descriptors[i])
    }

    /// Absolute byte range of a slot table
    pub fn index_range(&self, descriptor: &KeyLengthDescriptor) -> Range<u64> {
        let start = offset_sum(
            i64::from(self.index_section_offset),
            i64::from(descriptor.index_offset),
        );
        start..start + descriptor.index_len()
    }

    /// Absolute offset of a key length's data file, sentinel included
    pub fn data_start(&self, descriptor: &KeyLengthDescriptor) -> u64 {
        offset_sum(self.data_section_offset, descriptor.data_offset)
    }

    /// Encode into a byte vector
    pub fn to_bytes(&self) -> StoreResult<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::with_capacity(self.encoded_len() as usize));

        write_utf(&mut cursor, &self.format_version)?;
        MetadataHeader {
            created_at: self.created_at,
            key_count: self.key_count,
            key_length_count: self.key_length_count,
            max_key_length: self.max_key_length,
        }
        .write(&mut cursor)?;

        for descriptor in &self.descriptors {
            descriptor.write(&mut cursor)?;
        }

        let count = to_i32(self.serializers.len(), "serializer count")?;
        cursor.write_all(&count.to_be_bytes())?;
        for entry in &self.serializers {
            write_utf(&mut cursor, &entry.value_type)?;
            write_utf(&mut cursor, &entry.serializer)?;
        }

        SectionOffsets {
            index_section_offset: self.index_section_offset,
            data_section_offset: self.data_section_offset,
        }
        .write(&mut cursor)?;

        Ok(cursor.into_inner())
    }

    /// Encode into `writer`, returning the bytes written
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> StoreResult<u64> {
        let bytes = self.to_bytes()?;
        writer.write_all(&bytes)?;
        Ok(bytes.len() as u64)
    }

    /// Decode a metadata block from the start of `reader`
    pub fn read<R: Read + Seek>(reader: &mut R) -> StoreResult<Self> {
        let format_version = read_utf(reader)?;
        if format_version != FORMAT_VERSION {
            return Err(StoreError::UnsupportedVersion(format_version));
        }

        let header = MetadataHeader::read(reader)?;
        let length_count = from_i32(header.key_length_count, "key length count")?;

        let mut descriptors = Vec::with_capacity(length_count.min(1024));
        for _ in 0..length_count {
            descriptors.push(KeyLengthDescriptor::read(reader)?);
        }

        let mut count = [0u8; 4];
        reader.read_exact(&mut count)?;
        let serializer_count = from_i32(i32::from_be_bytes(count), "serializer count")?;

        let mut serializers = Vec::with_capacity(serializer_count.min(1024));
        for _ in 0..serializer_count {
            let value_type = read_utf(reader)?;
            let serializer = read_utf(reader)?;
            serializers.push(SerializerDescriptor {
                value_type,
                serializer,
            });
        }

        let offsets = SectionOffsets::read(reader)?;

        Ok(Self {
            format_version,
            created_at: header.created_at,
            key_count: header.key_count,
            key_length_count: header.key_length_count,
            max_key_length: header.max_key_length,
            descriptors,
            serializers,
            index_section_offset: offsets.index_section_offset,
            data_section_offset: offsets.data_section_offset,
        })
    }
}

fn write_utf<W: Write>(writer: &mut W, value: &str) -> StoreResult<()> {
    let len = u16::try_from(value.len()).map_err(|_| {
        StoreError::FormatLimit(format!("string of {} bytes exceeds 65535", value.len()))
    })?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

fn read_utf<R: Read>(reader: &mut R) -> StoreResult<String> {
    let mut len = [0u8; 2];
    reader.read_exact(&mut len)?;
    let mut bytes = vec![0u8; usize::from(u16::from_be_bytes(len))];
    reader.read_exact(&mut bytes)?;
    String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e).into())
}

fn to_i32<T: TryInto<i32> + Copy + std::fmt::Display>(value: T, what: &str) -> StoreResult<i32> {
    value
        .try_into()
        .map_err(|_| StoreError::FormatLimit(format!("{what} {value} does not fit in 32 bits")))
}

fn to_i64<T: TryInto<i64> + Copy + std::fmt::Display>(value: T, what: &str) -> StoreResult<i64> {
    value
        .try_into()
        .map_err(|_| StoreError::FormatLimit(format!("{what} {value} does not fit in 64 bits")))
}

fn from_i32(value: i32, what: &str) -> StoreResult<usize> {
    usize::try_from(value).map_err(|_| StoreError::FormatLimit(format!("negative {what}: {value}")))
}

fn offset_sum(base: i64, relative: i64) -> u64 {
    u64::try_from(base.saturating_add(relative)).unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn staged(key_length: usize, key_count: u64, width: usize, data_length: u64) -> StagedLength {
        StagedLength {
            key_length,
            key_count,
            value_count: key_count,
            data_length,
            max_offset_width: width,
            index_path: PathBuf::new(),
            data_path: PathBuf::new(),
        }
    }

    #[test]
    fn test_layout_of_two_lengths() {
        let lengths = [staged(1, 1, 1, 4), staged(2, 3, 2, 300)];
        let metadata = StoreMetadata::build(1_700_000_000_000, &lengths, 0.75, Vec::new()).unwrap();

        assert_eq!(metadata.key_count, 4);
        assert_eq!(metadata.key_length_count, 2);
        assert_eq!(metadata.max_key_length, 2);
        assert_eq!(
            metadata.descriptors,
            vec![
                KeyLengthDescriptor {
                    key_length: 1,
                    key_count: 1,
                    slot_count: 1,
                    slot_size: 2,
                    index_offset: 0,
                    data_offset: 0,
                },
                KeyLengthDescriptor {
                    key_length: 2,
                    key_count: 3,
                    slot_count: 4,
                    slot_size: 4,
                    index_offset: 2,
                    data_offset: 4,
                },
            ]
        );

        // 11 version + 20 header + 56 descriptors + 4 registry + 12 trailer
        assert_eq!(metadata.encoded_len(), 103);
        assert_eq!(metadata.index_section_offset, 103);
        assert_eq!(metadata.index_section_len(), 18);
        assert_eq!(metadata.data_section_offset, 121);

        let bytes = metadata.to_bytes().unwrap();
        assert_eq!(bytes.len(), 103);
        assert_eq!(&bytes[..11], b"\x00\x09SLOTDB_V1");
        assert_eq!(&bytes[91..95], &103i32.to_be_bytes());
        assert_eq!(&bytes[95..], &121i64.to_be_bytes());

        let second = metadata.descriptor(2).unwrap();
        assert_eq!(metadata.index_range(second), 105..121);
        assert_eq!(metadata.data_start(second), 125);
        assert!(metadata.descriptor(3).is_none());
    }

    #[test]
    fn test_empty_store_metadata() {
        let metadata = StoreMetadata::build(0, &[], 0.75, Vec::new()).unwrap();
        assert_eq!(metadata.key_count, 0);
        assert_eq!(metadata.key_length_count, 0);
        assert_eq!(metadata.max_key_length, 0);
        assert_eq!(i64::from(metadata.index_section_offset), metadata.data_section_offset);
    }

    #[test]
    fn test_read_back() {
        let serializers = vec![SerializerDescriptor {
            value_type: "geo.Point".to_string(),
            serializer: "point-v1".to_string(),
        }];
        let lengths = [staged(4, 10, 3, 5000)];
        let metadata = StoreMetadata::build(42, &lengths, 0.5, serializers).unwrap();

        let bytes = metadata.to_bytes().unwrap();
        assert_eq!(bytes.len() as u64, metadata.encoded_len());

        let decoded = StoreMetadata::read(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(decoded, metadata);
    }

    #[test]
    fn test_rejects_unknown_version() {
        let mut bytes = Vec::new();
        write_utf(&mut bytes, "OTHERDB_V9").unwrap();
        bytes.extend_from_slice(&[0u8; 32]);

        let err = StoreMetadata::read(&mut Cursor::new(&bytes)).unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedVersion(v) if v == "OTHERDB_V9"));
    }

    #[test]
    fn test_truncated_metadata() {
        let metadata = StoreMetadata::build(0, &[staged(1, 1, 1, 2)], 0.75, Vec::new()).unwrap();
        let bytes = metadata.to_bytes().unwrap();

        assert!(StoreMetadata::read(&mut Cursor::new(&bytes[..bytes.len() - 3])).is_err());
    }
}
