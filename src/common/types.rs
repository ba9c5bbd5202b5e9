use std::fmt;
use std::io;

/// Bytes reserved for the process ID query, allocated once per run.
pub const QUERY_BUFFER_CAPACITY: usize = 16 * 1024;

/// Characters available for a resolved process image path, terminator included.
pub const IMAGE_NAME_CAPACITY: usize = 300;

/// `FILE_INFORMATION_CLASS::FileProcessIdsUsingFileInformation`.
pub const FILE_PROCESS_IDS_USING_FILE_INFORMATION: u32 = 47;

/// Raw status reported by an owner query. Zero is success; every other value
/// is an NTSTATUS-style code and is printed as eight hex digits.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct QueryStatus(pub u32);

impl QueryStatus {
    pub const SUCCESS: QueryStatus = QueryStatus(0);
    pub const UNSUCCESSFUL: QueryStatus = QueryStatus(0xC000_0001);
    pub const INFO_LENGTH_MISMATCH: QueryStatus = QueryStatus(0xC000_0004);
    pub const ACCESS_DENIED: QueryStatus = QueryStatus(0xC000_0022);
    pub const OBJECT_NAME_NOT_FOUND: QueryStatus = QueryStatus(0xC000_0034);

    pub fn from_raw(status: i32) -> Self {
        QueryStatus(status as u32)
    }

    pub fn is_success(self) -> bool {
        self.0 == 0
    }

    /// Maps a user-space failure onto the closest kernel status so both
    /// backends report through the same channel.
    pub fn from_io_error(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => QueryStatus::ACCESS_DENIED,
            io::ErrorKind::NotFound => QueryStatus::OBJECT_NAME_NOT_FOUND,
            _ => QueryStatus::UNSUCCESSFUL,
        }
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// A process holding a handle to the queried file. The image name is absent
/// when the process exited or could not be opened for query access.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OwnerRecord {
    pub pid: u64,
    pub image_name: Option<String>,
}

impl OwnerRecord {
    pub fn display_name(&self) -> &str {
        self.image_name.as_deref().unwrap_or("")
    }
}

#[derive(Debug)]
pub enum PathOutcome {
    Resolved(Vec<OwnerRecord>),
    OpenFailed(io::Error),
    QueryFailed(QueryStatus),
}

/// Controls how a command line argument is turned into candidate paths.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct MatchFlags {
    /// Apply the final pattern in every subdirectory.
    pub recursive: bool,
    /// Honor only `*` and `?`; braces and sets are literal.
    pub basic_expansion: bool,
}
