use std::io::{self, Write};
use std::path::Path;

use crate::common::buffer::QueryBuffer;
use crate::common::types::{OwnerRecord, PathOutcome, QueryStatus};

/// Native primitives needed to find the holders of a file.
///
/// `Handle` must release the underlying OS handle when dropped; the resolver
/// relies on scope exit to close it on every path.
pub trait OwnerQuery {
    type Handle;

    /// Opens `path` for attribute access only, sharing read, write and delete
    /// with everyone else. Directories must open as well.
    fn open_path(&self, path: &Path) -> io::Result<Self::Handle>;

    /// Fills `buffer` with the count-prefixed list of holder process IDs.
    fn query_process_ids(&self, handle: &Self::Handle, buffer: &mut QueryBuffer) -> QueryStatus;

    /// Full image path of `pid`, at most `capacity - 1` characters. `None`
    /// when the process is gone or cannot be opened for query access.
    fn process_image_name(&self, pid: u64, capacity: usize) -> Option<String>;
}

pub fn resolve_path<Q: OwnerQuery>(
    query: &Q,
    path: &Path,
    buffer: &mut QueryBuffer,
    name_capacity: usize,
) -> PathOutcome {
    let handle = match query.open_path(path) {
        Ok(handle) => handle,
        Err(err) => {
            log::debug!("open of {} failed: {err}", path.display());
            return PathOutcome::OpenFailed(err);
        }
    };

    let status = query.query_process_ids(&handle, buffer);
    if !status.is_success() {
        log::debug!("query of {} returned {status}", path.display());
        return PathOutcome::QueryFailed(status);
    }

    let ids = match buffer.process_ids() {
        Ok(ids) => ids,
        Err(status) => return PathOutcome::QueryFailed(status),
    };

    let owners = ids
        .iter()
        .map(|pid| {
            let image_name = query.process_image_name(pid, name_capacity);
            if image_name.is_none() {
                log::debug!("no image name for pid {pid}");
            }
            OwnerRecord { pid, image_name }
        })
        .collect();
    drop(handle);
    PathOutcome::Resolved(owners)
}

/// Renders outcomes: owner lines to `out`, per-path diagnostics to `err`.
pub struct Reporter<O: Write, E: Write> {
    out: O,
    err: E,
}

impl<O: Write, E: Write> Reporter<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self { out, err }
    }

    pub fn report(&mut self, path: &Path, outcome: &PathOutcome) -> io::Result<()> {
        match outcome {
            PathOutcome::Resolved(owners) => {
                for owner in owners {
                    writeln!(self.out, "{:>10} {}", owner.pid, owner.display_name())?;
                }
            }
            PathOutcome::OpenFailed(err) => {
                writeln!(
                    self.err,
                    "fileuser: open of {} failed: {}",
                    path.display(),
                    os_error_text(err)
                )?;
            }
            PathOutcome::QueryFailed(status) => {
                writeln!(
                    self.err,
                    "fileuser: query of {} failed: {status}",
                    path.display()
                )?;
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()?;
        self.err.flush()
    }

    pub fn into_inner(self) -> (O, E) {
        (self.out, self.err)
    }
}

/// The OS message for `err` without the trailing `(os error N)`.
pub fn os_error_text(err: &io::Error) -> String {
    let text = err.to_string();
    match err.raw_os_error() {
        Some(code) => text
            .strip_suffix(&format!(" (os error {code})"))
            .map(str::to_owned)
            .unwrap_or(text),
        None => text,
    }
}
