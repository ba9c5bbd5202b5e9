pub mod win32;

use std::io;
use std::path::Path;

use crate::common::buffer::QueryBuffer;
use crate::common::errors::{FileUserError, Result};
use crate::common::types::QueryStatus;
use crate::owners::OwnerQuery;

use self::win32::{HandleGuard, NativeEntryPoints};

pub use self::win32::list_directory;

pub const CASE_INSENSITIVE_NAMES: bool = true;

/// Owner lookup through `NtQueryInformationFile`.
pub struct WindowsOwnerQuery {
    entry_points: NativeEntryPoints,
}

impl WindowsOwnerQuery {
    pub fn new() -> Result<Self> {
        let entry_points = NativeEntryPoints::load().ok_or(FileUserError::OsSupportMissing(
            "NtQueryInformationFile and QueryFullProcessImageNameW",
        ))?;
        if !win32::enable_backup_privilege() {
            log::debug!("continuing without backup privilege");
        }
        Ok(Self { entry_points })
    }
}

impl OwnerQuery for WindowsOwnerQuery {
    type Handle = HandleGuard;

    fn open_path(&self, path: &Path) -> io::Result<HandleGuard> {
        win32::open_for_attributes(path)
    }

    fn query_process_ids(&self, handle: &HandleGuard, buffer: &mut QueryBuffer) -> QueryStatus {
        win32::query_file_process_ids(&self.entry_points, handle, buffer)
    }

    fn process_image_name(&self, pid: u64, capacity: usize) -> Option<String> {
        let process = win32::open_process_for_query(pid)?;
        win32::process_image_name(&self.entry_points, &process, capacity)
    }
}

pub type PlatformOwnerQuery = WindowsOwnerQuery;
