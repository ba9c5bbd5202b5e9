pub mod procfs;

use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use crate::common::buffer::QueryBuffer;
use crate::common::errors::{FileUserError, Result};
use crate::common::types::QueryStatus;
use crate::enumerate::DirEntryInfo;
use crate::owners::OwnerQuery;

use self::procfs::{ExcludedFd, FileId};

pub const CASE_INSENSITIVE_NAMES: bool = false;

/// Owner lookup backed by `/proc`.
pub struct LinuxOwnerQuery {
    _private: (),
}

/// An `O_PATH` descriptor: no content access and no lock interaction.
pub struct LinuxHandle {
    file: File,
    id: FileId,
}

impl LinuxOwnerQuery {
    pub fn new() -> Result<Self> {
        if !procfs::proc_available() {
            return Err(FileUserError::OsSupportMissing("/proc/self/fd"));
        }
        Ok(Self { _private: () })
    }
}

impl OwnerQuery for LinuxOwnerQuery {
    type Handle = LinuxHandle;

    fn open_path(&self, path: &Path) -> io::Result<LinuxHandle> {
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_PATH | libc::O_CLOEXEC)
            .open(path)?;
        let id = FileId::from_meta(&file.metadata()?);
        Ok(LinuxHandle { file, id })
    }

    fn query_process_ids(&self, handle: &LinuxHandle, buffer: &mut QueryBuffer) -> QueryStatus {
        let exclude = ExcludedFd {
            pid: std::process::id(),
            fd: handle.file.as_raw_fd(),
        };
        match procfs::holders_of(handle.id, Some(exclude)) {
            Ok(pids) => buffer.write_ids(&pids),
            Err(err) => {
                log::debug!("scan of /proc failed: {err}");
                QueryStatus::from_io_error(&err)
            }
        }
    }

    fn process_image_name(&self, pid: u64, capacity: usize) -> Option<String> {
        match procfs::image_path(pid) {
            Ok(path) => Some(
                path.to_string_lossy()
                    .chars()
                    .take(capacity.saturating_sub(1))
                    .collect(),
            ),
            Err(err) => {
                log::debug!("image path of pid {pid} unavailable: {err}");
                None
            }
        }
    }
}

pub fn list_directory(dir: &Path) -> io::Result<Vec<DirEntryInfo>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let is_dir = entry.file_type().map(|kind| kind.is_dir()).unwrap_or(false);
        entries.push(DirEntryInfo {
            name: entry.file_name(),
            is_dir,
        });
    }
    Ok(entries)
}

pub type PlatformOwnerQuery = LinuxOwnerQuery;
