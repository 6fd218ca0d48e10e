//! Error types for store writing

use crate::varint::VarIntError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while writing or inspecting a store file
///
/// Every error is fatal to the write session that raised it.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Writer configuration rejected at construction
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Settings lookup failed
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// I/O error on a scratch file or the output stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Two puts supplied the same key bytes
    #[error("Duplicate key of length {key_length}: {key:02x?}")]
    DuplicateKey {
        /// Length of the duplicated key
        key_length: usize,
        /// Key bytes
        key: Vec<u8>,
    },

    /// The finished store would not fit comfortably on disk
    #[error("Insufficient disk space: store needs {required} bytes, {usable} bytes usable")]
    InsufficientDiskSpace {
        /// Total size of the store file
        required: u64,
        /// Usable free space at the scratch location
        usable: u64,
    },

    /// Varint encode or decode failure
    #[error("Varint error: {0}")]
    VarInt(#[from] VarIntError),

    /// A count or offset does not fit its on-disk field
    #[error("Format limit exceeded: {0}")]
    FormatLimit(String),

    /// No empty slot left while building an index
    #[error("Slot table full for key length {key_length} ({slot_count} slots)")]
    TableFull {
        /// Key length of the table
        key_length: usize,
        /// Number of slots in the table
        slot_count: usize,
    },

    /// Metadata written by an unknown format version
    #[error("Unsupported format version: {0}")]
    UnsupportedVersion(String),

    /// Metadata could not be decoded
    #[error("Metadata error: {0}")]
    Metadata(#[from] binrw::Error),

    /// An earlier put failed, so staged state can no longer be trusted
    #[error("Writer failed on an earlier put; no further puts or close")]
    WriterFailed,

    /// Output could not be moved into place
    #[error("Failed to persist store file {path}: {source}")]
    Persist {
        /// Destination path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by [`Configuration`](crate::Configuration) lookups
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required key not set
    #[error("Missing configuration key: {0}")]
    MissingKey(String),

    /// Value present but not parsable as the requested type
    #[error("Invalid value for '{key}': '{value}' is not a valid {expected}")]
    InvalidValue {
        /// Configuration key
        key: String,
        /// Raw value
        value: String,
        /// Requested type
        expected: &'static str,
    },

    /// Settings document could not be parsed
    #[error("Invalid settings document: {0}")]
    Parse(#[from] serde_json::Error),
}
