//! Store metadata reports

use serde::Serialize;
use slotdb_store::StoreMetadata;
use std::fmt;

/// Per key length section of a report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LengthReport {
    /// Key length
    pub key_length: i32,
    /// Keys of this length
    pub key_count: i32,
    /// Slots in the table
    pub slot_count: i32,
    /// Bytes per slot
    pub slot_size: i32,
    /// Share of occupied slots
    pub load: f64,
    /// Absolute start of the slot table
    pub index_start: u64,
    /// Absolute start of the data file
    pub data_start: u64,
}

/// Registered serializer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SerializerReport {
    /// Value type
    pub value_type: String,
    /// Serializer name
    pub serializer: String,
}

/// Summary of a store's metadata block
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreReport {
    /// Format version tag
    pub format_version: String,
    /// Creation time, epoch milliseconds
    pub created_at: i64,
    /// Total keys
    pub key_count: i32,
    /// Distinct key lengths
    pub key_length_count: i32,
    /// Longest key
    pub max_key_length: i32,
    /// Metadata block size
    pub metadata_size: u64,
    /// Absolute offset of the index section
    pub index_section_offset: i32,
    /// Absolute offset of the data section
    pub data_section_offset: i64,
    /// Per key length tables
    pub lengths: Vec<LengthReport>,
    /// Registered serializers
    pub serializers: Vec<SerializerReport>,
}

impl From<&StoreMetadata> for StoreReport {
    #[allow(clippy::cast_precision_loss)]
    fn from(metadata: &StoreMetadata) -> Self {
        let lengths = metadata
            .descriptors
            .iter()
            .map(|d| LengthReport {
                key_length: d.key_length,
                key_count: d.key_count,
                slot_count: d.slot_count,
                slot_size: d.slot_size,
                load: if d.slot_count > 0 {
                    f64::from(d.key_count) / f64::from(d.slot_count)
                } else {
                    0.0
                },
                index_start: metadata.index_range(d).start,
                data_start: metadata.data_start(d),
            })
            .collect();

        let serializers = metadata
            .serializers
            .iter()
            .map(|s| SerializerReport {
                value_type: s.value_type.clone(),
                serializer: s.serializer.clone(),
            })
            .collect();

        Self {
            format_version: metadata.format_version.clone(),
            created_at: metadata.created_at,
            key_count: metadata.key_count,
            key_length_count: metadata.key_length_count,
            max_key_length: metadata.max_key_length,
            metadata_size: metadata.encoded_len(),
            index_section_offset: metadata.index_section_offset,
            data_section_offset: metadata.data_section_offset,
            lengths,
            serializers,
        }
    }
}

impl fmt::Display for StoreReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Format version:   {}", self.format_version)?;
        writeln!(f, "Created at:       {} ms", self.created_at)?;
        writeln!(f, "Keys:             {}", self.key_count)?;
        writeln!(f, "Key lengths:      {}", self.key_length_count)?;
        writeln!(f, "Max key length:   {}", self.max_key_length)?;
        writeln!(f, "Metadata size:    {} bytes", self.metadata_size)?;
        writeln!(f, "Index section at: {}", self.index_section_offset)?;
        writeln!(f, "Data section at:  {}", self.data_section_offset)?;

        if !self.lengths.is_empty() {
            writeln!(f)?;
            writeln!(
                f,
                "{:>8} {:>10} {:>10} {:>9} {:>6} {:>12} {:>12}",
                "length", "keys", "slots", "slot size", "load", "index at", "data at"
            )?;
            for l in &self.lengths {
                writeln!(
                    f,
                    "{:>8} {:>10} {:>10} {:>9} {:>6.2} {:>12} {:>12}",
                    l.key_length,
                    l.key_count,
                    l.slot_count,
                    l.slot_size,
                    l.load,
                    l.index_start,
                    l.data_start
                )?;
            }
        }

        for s in &self.serializers {
            writeln!(f, "Serializer:       {} => {}", s.value_type, s.serializer)?;
        }

        Ok(())
    }
}
