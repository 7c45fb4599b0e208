//! Filesystem space for the root volume.
//!
//! Disk usage is not part of the hardware snapshot; the poller queries it
//! directly each cycle.

use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

/// Bytes per published megabyte.
pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// Space on one filesystem, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskUsage {
    pub total: u64,
    pub used: u64,
    pub free: u64,
}

impl DiskUsage {
    pub fn used_mb(&self) -> u64 {
        self.used / BYTES_PER_MB
    }

    pub fn free_mb(&self) -> u64 {
        self.free / BYTES_PER_MB
    }
}

/// Reports space for a filesystem path.
pub trait DiskProbe: Send {
    fn usage(&self, path: &Path) -> io::Result<DiskUsage>;
}

/// [`DiskProbe`] backed by `statvfs(3)`.
///
/// `free` is the space available to unprivileged users and `used` excludes
/// reserved blocks, matching `df`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatvfsProbe;

impl DiskProbe for StatvfsProbe {
    fn usage(&self, path: &Path) -> io::Result<DiskUsage> {
        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        // SAFETY: statvfs is plain old data; all-zero is a valid value.
        let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
        // SAFETY: c_path is NUL-terminated and stat is a valid out pointer.
        let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }

        let fragment = stat.f_frsize as u64;
        let blocks = stat.f_blocks as u64;
        let free_blocks = stat.f_bfree as u64;
        let available_blocks = stat.f_bavail as u64;

        Ok(DiskUsage {
            total: blocks * fragment,
            used: blocks.saturating_sub(free_blocks) * fragment,
            free: available_blocks * fragment,
        })
    }
}
