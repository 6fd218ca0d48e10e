//! Bulk writer for immutable slotdb key-value files
//!
//! A store is written once, in a single pass, and never modified. Keys are
//! arbitrary byte strings grouped by length; each length gets its own
//! open-addressing slot table pointing into a de-duplicated data section.
//!
//! # File layout
//!
//! ```text
//! [metadata][index section][data section]
//! ```
//!
//! See [`metadata`] for the header fields, [`index`] for slot tables and
//! [`varint`] for the integer encoding used inside slots and value prefixes.
//!
//! # Example
//!
//! ```no_run
//! use slotdb_store::{Configuration, StoreWriter};
//!
//! # fn main() -> Result<(), slotdb_store::StoreError> {
//! let mut writer = StoreWriter::create("words.slotdb", Configuration::default())?;
//! writer.put(b"apple", b"fruit")?;
//! writer.put(b"carrot", b"vegetable")?;
//! let summary = writer.close()?;
//! println!("{} keys in {} bytes", summary.key_count, summary.bytes_written);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![allow(clippy::cast_possible_truncation)] // Offsets and counts are range checked before narrowing
#![allow(clippy::cast_precision_loss)] // Slot sizing and space ratios

mod bucket;
pub mod config;
pub mod error;
pub mod index;
pub mod metadata;
pub mod serializer;
pub mod space;
pub mod varint;
pub mod writer;

pub use bucket::StagedLength;
pub use config::Configuration;
pub use error::{ConfigError, StoreError, StoreResult};
pub use index::{IndexStats, SlotTable, build_index};
pub use metadata::{FORMAT_VERSION, KeyLengthDescriptor, StoreMetadata};
pub use serializer::{SerializerDescriptor, SerializerRegistry, ValueSerializer};
pub use space::{FixedSpace, FsSpaceProbe, SpaceProbe, check_free_space};
pub use writer::{PendingStoreFile, StoreWriter, WriteSummary};
