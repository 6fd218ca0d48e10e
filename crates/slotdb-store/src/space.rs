//! Free disk space checks
//!
//! The final merge copies every scratch file into the output, so the writer
//! refuses to start it when the store would take up too much of the usable
//! space at the scratch location.

use crate::error::{StoreError, StoreResult};
use std::io;
use std::path::Path;
use tracing::info;

/// Largest share of usable space a store file may take
pub const DISK_SPACE_SAFETY_RATIO: f64 = 0.66;

/// Source of usable free space figures
pub trait SpaceProbe: Send + Sync {
    /// Bytes available to an unprivileged writer on the filesystem holding `path`
    fn usable_space(&self, path: &Path) -> io::Result<u64>;
}

/// Queries the filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSpaceProbe;

impl SpaceProbe for FsSpaceProbe {
    #[cfg(unix)]
    #[allow(unsafe_code, clippy::useless_conversion)]
    fn usable_space(&self, path: &Path) -> io::Result<u64> {
        use std::ffi::CString;

        let c_path = CString::new(path.as_os_str().as_encoded_bytes())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        // SAFETY: statvfs only writes into the zeroed struct we own, and the
        // path pointer stays valid for the duration of the call.
        let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
        if unsafe { libc::statvfs(c_path.as_ptr(), &raw mut stat) } != 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(u64::from(stat.f_bavail).saturating_mul(u64::from(stat.f_frsize)))
    }

    #[cfg(not(unix))]
    fn usable_space(&self, _path: &Path) -> io::Result<u64> {
        Ok(u64::MAX)
    }
}

/// Reports a fixed amount of usable space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedSpace(pub u64);

impl SpaceProbe for FixedSpace {
    fn usable_space(&self, _path: &Path) -> io::Result<u64> {
        Ok(self.0)
    }
}

/// Fail with [`StoreError::InsufficientDiskSpace`] when `required` bytes would
/// take [`DISK_SPACE_SAFETY_RATIO`] or more of the usable space at `path`
#[allow(clippy::cast_precision_loss)]
pub fn check_free_space(probe: &dyn SpaceProbe, path: &Path, required: u64) -> StoreResult<()> {
    let usable = probe.usable_space(path)?;

    info!(
        "Total expected store size is {:.1} MiB, usable free space is {:.1} MiB",
        required as f64 / (1024.0 * 1024.0),
        usable as f64 / (1024.0 * 1024.0)
    );

    if usable == 0 || required as f64 / usable as f64 >= DISK_SPACE_SAFETY_RATIO {
        return Err(StoreError::InsufficientDiskSpace { required, usable });
    }

    Ok(())
}
