//! Store writer
//!
//! [`StoreWriter`] accepts key/value pairs in any order, stages them per key
//! length in a scratch directory and, on [`close`](StoreWriter::close), lays
//! out the final file:
//!
//! ```text
//! [metadata][index section: one slot table per key length][data section]
//! ```
//!
//! The scratch directory is removed when the writer closes, fails, or is
//! dropped.

use crate::bucket::{KeyLengthBucket, StagedLength};
use crate::config::{Configuration, DEFAULT_LOAD_FACTOR, LOAD_FACTOR, TEMP_DIR};
use crate::error::{StoreError, StoreResult};
use crate::index::{IndexStats, build_index};
use crate::metadata::StoreMetadata;
use crate::serializer::SerializerDescriptor;
use crate::space::{FsSpaceProbe, SpaceProbe, check_free_space};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, info, warn};

/// Copy buffer size for the final merge
const MERGE_BUFFER_SIZE: usize = 8 * 1024;

/// Prefix of the scratch directory name
const SCRATCH_PREFIX: &str = "slotdb-writer";

/// Outcome of a successful close
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    /// Keys written
    pub key_count: u64,
    /// Distinct values written after de-duplication
    pub value_count: u64,
    /// Keys displaced from their home slot, over all lengths
    pub collisions: u64,
    /// Bytes written to the output
    pub bytes_written: u64,
    /// Per key length table statistics, ascending by length
    pub lengths: Vec<IndexStats>,
}

/// Bulk writer for one immutable store
pub struct StoreWriter<W: Write> {
    load_factor: f64,
    serializers: Vec<SerializerDescriptor>,
    // Declared before `scratch` so open scratch files close before the
    // directory is removed on drop
    buckets: BTreeMap<usize, KeyLengthBucket>,
    scratch: TempDir,
    output: W,
    commit: Option<fn(W) -> StoreResult<()>>,
    space_probe: Box<dyn SpaceProbe>,
    key_count: u64,
    value_count: u64,
    /// Set once a put fails part way
    failed: bool,
}

impl<W: Write> StoreWriter<W> {
    /// Create a writer that emits the store into `output` on close
    pub fn new(config: Configuration, output: W) -> StoreResult<Self> {
        let load_factor = config.get_f64_or(LOAD_FACTOR, DEFAULT_LOAD_FACTOR)?;
        let in_range = load_factor > 0.0 && load_factor < 1.0;
        if !in_range {
            return Err(StoreError::InvalidConfiguration(format!(
                "{LOAD_FACTOR} must be in (0, 1), got {load_factor}"
            )));
        }

        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRATCH_PREFIX);
        let scratch = match config.get_path(TEMP_DIR) {
            Some(parent) => builder.tempdir_in(parent)?,
            None => builder.tempdir()?,
        };

        info!(
            "Opened store writer with load factor {} in {}",
            load_factor,
            scratch.path().display()
        );

        Ok(Self {
            load_factor,
            serializers: config.serializers().descriptors(),
            buckets: BTreeMap::new(),
            scratch,
            output,
            commit: None,
            space_probe: Box::new(FsSpaceProbe),
            key_count: 0,
            value_count: 0,
            failed: false,
        })
    }

    /// Replace the free space source used before the merge
    #[must_use]
    pub fn with_space_probe(mut self, probe: impl SpaceProbe + 'static) -> Self {
        self.space_probe = Box::new(probe);
        self
    }

    /// Scratch directory holding staged files
    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    /// Keys accepted so far
    pub fn key_count(&self) -> u64 {
        self.key_count
    }

    /// Load factor applied to every table
    pub fn load_factor(&self) -> f64 {
        self.load_factor
    }

    /// Add one key/value pair
    ///
    /// Duplicate keys are accepted here and reported by [`close`](Self::close).
    /// After any error the writer refuses further puts and `close` fails with
    /// [`StoreError::WriterFailed`].
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        if self.failed {
            return Err(StoreError::WriterFailed);
        }
        let result = self.stage(key, value);
        if result.is_err() {
            self.failed = true;
        }
        result
    }

    fn stage(&mut self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        let bucket = match self.buckets.entry(key.len()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                entry.insert(KeyLengthBucket::create(self.scratch.path(), key.len())?)
            }
        };

        if bucket.put(key, value)? {
            self.value_count += 1;
        }
        self.key_count += 1;
        Ok(())
    }

    /// Add every pair from `entries`, in order
    pub fn put_all<I, K, V>(&mut self, entries: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        for (key, value) in entries {
            self.put(key.as_ref(), value.as_ref())?;
        }
        Ok(())
    }

    /// Write the store and release the scratch directory
    pub fn close(self) -> StoreResult<WriteSummary> {
        let commit = self.commit;
        let (output, summary) = self.close_into()?;
        if let Some(commit) = commit {
            commit(output)?;
        }
        Ok(summary)
    }

    /// Like [`close`](Self::close), but hand the output back
    pub fn close_into(self) -> StoreResult<(W, WriteSummary)> {
        let Self {
            load_factor,
            serializers,
            buckets,
            scratch,
            output,
            space_probe,
            failed,
            ..
        } = self;

        let result = if failed {
            drop(buckets);
            Err(StoreError::WriterFailed)
        } else {
            write_store(
                buckets,
                scratch.path(),
                load_factor,
                serializers,
                space_probe.as_ref(),
                output,
            )
        };

        let scratch_path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            warn!(
                "Failed to remove scratch directory {}: {}",
                scratch_path.display(),
                e
            );
        }

        result
    }
}

impl StoreWriter<PendingStoreFile> {
    /// Create a writer for the file at `path`
    ///
    /// Output goes to a temporary file in the same directory, which replaces
    /// `path` only when [`close`](Self::close) succeeds.
    pub fn create(path: impl AsRef<Path>, config: Configuration) -> StoreResult<Self> {
        let mut writer = Self::new(config, PendingStoreFile::new(path.as_ref())?)?;
        writer.commit = Some(PendingStoreFile::commit);
        Ok(writer)
    }
}

impl<W: Write> fmt::Debug for StoreWriter<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreWriter")
            .field("load_factor", &self.load_factor)
            .field("scratch", &self.scratch.path())
            .field("key_lengths", &self.buckets.keys().collect::<Vec<_>>())
            .field("key_count", &self.key_count)
            .field("value_count", &self.value_count)
            .field("failed", &self.failed)
            .finish_non_exhaustive()
    }
}

fn write_store<W: Write>(
    buckets: BTreeMap<usize, KeyLengthBucket>,
    scratch: &Path,
    load_factor: f64,
    serializers: Vec<SerializerDescriptor>,
    space_probe: &dyn SpaceProbe,
    output: W,
) -> StoreResult<(W, WriteSummary)> {
    let staged = buckets
        .into_values()
        .map(KeyLengthBucket::finish)
        .collect::<StoreResult<Vec<StagedLength>>>()?;

    let metadata = StoreMetadata::build(now_millis(), &staged, load_factor, serializers)?;
    let metadata_len = metadata.encoded_len();
    debug!(
        "Metadata is {} bytes for {} key lengths",
        metadata_len,
        staged.len()
    );

    let mut lengths = Vec::with_capacity(staged.len());
    for length in &staged {
        lengths.push(build_index(length, load_factor, scratch)?);
    }

    let index_bytes: u64 = lengths.iter().map(IndexStats::byte_len).sum();
    let data_bytes: u64 = staged.iter().map(|s| s.data_length).sum();
    let total = metadata_len + index_bytes + data_bytes;

    check_free_space(space_probe, scratch, total)?;

    let mut out = BufWriter::with_capacity(MERGE_BUFFER_SIZE, output);
    let mut bytes_written = metadata.write_to(&mut out)?;

    let index_paths = lengths.iter().map(|l| l.path.as_path());
    let data_paths = staged.iter().map(|s| s.data_path.as_path());
    for path in index_paths.chain(data_paths) {
        bytes_written += append_file(path, &mut out)?;
    }

    out.flush()?;
    let output = out.into_inner().map_err(|e| e.into_error())?;

    if bytes_written != total {
        return Err(StoreError::FormatLimit(format!(
            "merged {bytes_written} bytes, expected {total}"
        )));
    }

    let key_count = staged.iter().map(|s| s.key_count).sum();
    let value_count = staged.iter().map(|s| s.value_count).sum();
    let collisions = lengths.iter().map(|l| l.collisions).sum();

    info!(
        "Wrote store: {} keys, {} values, {} key lengths, {} collisions, {} bytes",
        key_count,
        value_count,
        lengths.len(),
        collisions,
        bytes_written
    );

    Ok((
        output,
        WriteSummary {
            key_count,
            value_count,
            collisions,
            bytes_written,
            lengths,
        },
    ))
}

fn append_file<W: Write>(path: &Path, out: &mut W) -> StoreResult<u64> {
    let mut file = File::open(path)?;
    let copied = io::copy(&mut file, out)?;
    debug!("Merged {} ({} bytes)", path.display(), copied);
    Ok(copied)
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

/// Output file that only appears at its final path once committed
///
/// Dropping it uncommitted deletes the temporary file.
#[derive(Debug)]
pub struct PendingStoreFile {
    file: NamedTempFile,
    path: PathBuf,
}

impl PendingStoreFile {
    /// Open a temporary file next to `path`
    pub fn new(path: &Path) -> StoreResult<Self> {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Ok(Self {
            file: NamedTempFile::new_in(parent)?,
            path: path.to_path_buf(),
        })
    }

    /// Final destination
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sync and move the file to its final path
    pub fn commit(self) -> StoreResult<()> {
        self.file.as_file().sync_all()?;
        let Self { file, path } = self;
        file.persist(&path).map_err(|e| StoreError::Persist {
            path: path.clone(),
            source: e.error,
        })?;
        info!("Persisted store file {}", path.display());
        Ok(())
    }
}

impl Write for PendingStoreFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}
