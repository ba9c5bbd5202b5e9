use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::os::fd::RawFd;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

const PROC_ROOT: &str = "/proc";

/// Identity of an open file as seen through `stat`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FileId {
    pub dev: u64,
    pub ino: u64,
}

impl FileId {
    pub fn from_meta(meta: &fs::Metadata) -> Self {
        Self {
            dev: meta.dev(),
            ino: meta.ino(),
        }
    }
}

/// A descriptor to leave out of the scan, normally the querying one.
#[derive(Copy, Clone, Debug)]
pub struct ExcludedFd {
    pub pid: u32,
    pub fd: RawFd,
}

pub fn proc_available() -> bool {
    Path::new(PROC_ROOT).join("self").join("fd").is_dir()
}

fn process_ids() -> io::Result<Vec<u32>> {
    let mut pids = Vec::new();
    for entry in fs::read_dir(PROC_ROOT)? {
        let entry = entry?;
        if let Some(pid) = entry.file_name().to_str().and_then(|name| name.parse().ok()) {
            pids.push(pid);
        }
    }
    pids.sort_unstable();
    Ok(pids)
}

/// Processes referring to `target` through a descriptor, their working
/// directory, their executable or a memory mapping, in ascending pid order. Processes that vanish or deny access mid-scan
/// are skipped.
pub fn holders_of(target: FileId, exclude: Option<ExcludedFd>) -> io::Result<Vec<u64>> {
    let mut holders = Vec::new();
    for pid in process_ids()? {
        if process_holds(pid, target, exclude) {
            holders.push(pid as u64);
        }
    }
    Ok(holders)
}

fn process_holds(pid: u32, target: FileId, exclude: Option<ExcludedFd>) -> bool {
    let base = Path::new(PROC_ROOT).join(pid.to_string());
    if refers_to(&base.join("cwd"), target) || refers_to(&base.join("exe"), target) {
        return true;
    }
    if maps_contain(&base.join("maps"), target) {
        return true;
    }

    let entries = match fs::read_dir(base.join("fd")) {
        Ok(entries) => entries,
        Err(err) => {
            log::trace!("cannot read descriptors of pid {pid}: {err}");
            return false;
        }
    };
    for entry in entries.flatten() {
        let fd: Option<RawFd> = entry.file_name().to_str().and_then(|name| name.parse().ok());
        let Some(fd) = fd else {
            continue;
        };
        if let Some(excluded) = exclude {
            if excluded.pid == pid && excluded.fd == fd {
                continue;
            }
        }
        if refers_to(&entry.path(), target) {
            return true;
        }
    }
    false
}

fn refers_to(link: &Path, target: FileId) -> bool {
    fs::metadata(link)
        .map(|meta| FileId::from_meta(&meta) == target)
        .unwrap_or(false)
}

/// Scans a `maps` table for a mapping backed by `target`. Each line reads
/// `start-end perms offset major:minor inode [path]`, device numbers in hex.
fn maps_contain(maps: &Path, target: FileId) -> bool {
    let file = match File::open(maps) {
        Ok(file) => file,
        Err(err) => {
            log::trace!("cannot read {}: {err}", maps.display());
            return false;
        }
    };
    BufReader::new(file)
        .lines()
        .map_while(|line| line.ok())
        .any(|line| map_line_id(&line) == Some(target))
}

fn map_line_id(line: &str) -> Option<FileId> {
    let mut fields = line.split_whitespace().skip(3);
    let (major, minor) = fields.next()?.split_once(':')?;
    let ino: u64 = fields.next()?.parse().ok()?;
    if ino == 0 {
        return None;
    }
    let major = u32::from_str_radix(major, 16).ok()?;
    let minor = u32::from_str_radix(minor, 16).ok()?;
    Some(FileId {
        dev: libc::makedev(major, minor),
        ino,
    })
}

pub fn image_path(pid: u64) -> io::Result<PathBuf> {
    fs::read_link(Path::new(PROC_ROOT).join(pid.to_string()).join("exe"))
}
