use std::ffi::{c_void, OsStr, OsString};
use std::io;
use std::os::windows::ffi::{OsStrExt, OsStringExt};
use std::path::Path;

use windows_sys::Win32::Foundation::{
    CloseHandle, GetLastError, BOOL, ERROR_NOT_ALL_ASSIGNED, HANDLE, HMODULE, INVALID_HANDLE_VALUE,
    LUID,
};
use windows_sys::Win32::Security::{
    AdjustTokenPrivileges, LookupPrivilegeValueW, LUID_AND_ATTRIBUTES, SE_PRIVILEGE_ENABLED,
    TOKEN_ADJUST_PRIVILEGES, TOKEN_PRIVILEGES,
};
use windows_sys::Win32::Storage::FileSystem::{
    CreateFileW, FindClose, FindFirstFileW, FindNextFileW, FILE_ATTRIBUTE_DIRECTORY,
    FILE_ATTRIBUTE_NORMAL, FILE_ATTRIBUTE_REPARSE_POINT, FILE_FLAG_BACKUP_SEMANTICS,
    FILE_READ_ATTRIBUTES, FILE_SHARE_DELETE, FILE_SHARE_READ, FILE_SHARE_WRITE, OPEN_EXISTING,
    WIN32_FIND_DATAW,
};
use windows_sys::Win32::System::LibraryLoader::{GetModuleHandleW, GetProcAddress};
use windows_sys::Win32::System::Threading::{
    GetCurrentProcess, OpenProcess, OpenProcessToken, PROCESS_QUERY_LIMITED_INFORMATION,
};

use crate::common::buffer::QueryBuffer;
use crate::common::types::{QueryStatus, FILE_PROCESS_IDS_USING_FILE_INFORMATION};
use crate::enumerate::DirEntryInfo;

#[allow(dead_code)]
#[repr(C)]
struct IoStatusBlock {
    status: usize,
    information: usize,
}

type NtQueryInformationFileFn = unsafe extern "system" fn(
    file: HANDLE,
    io_status: *mut IoStatusBlock,
    information: *mut c_void,
    length: u32,
    class: u32,
) -> i32;

type QueryFullProcessImageNameWFn =
    unsafe extern "system" fn(process: HANDLE, flags: u32, name: *mut u16, size: *mut u32) -> BOOL;

/// Entry points that older systems lack, resolved at startup.
pub struct NativeEntryPoints {
    nt_query_information_file: NtQueryInformationFileFn,
    query_full_process_image_name: QueryFullProcessImageNameWFn,
}

impl NativeEntryPoints {
    pub fn load() -> Option<Self> {
        let ntdll = module_handle("ntdll.dll")?;
        let kernel32 = module_handle("kernel32.dll")?;
        let query_file = unsafe { GetProcAddress(ntdll, b"NtQueryInformationFile\0".as_ptr()) }?;
        let query_name =
            unsafe { GetProcAddress(kernel32, b"QueryFullProcessImageNameW\0".as_ptr()) }?;
        unsafe {
            Some(Self {
                nt_query_information_file: std::mem::transmute::<
                    unsafe extern "system" fn() -> isize,
                    NtQueryInformationFileFn,
                >(query_file),
                query_full_process_image_name: std::mem::transmute::<
                    unsafe extern "system" fn() -> isize,
                    QueryFullProcessImageNameWFn,
                >(query_name),
            })
        }
    }
}

fn module_handle(name: &str) -> Option<HMODULE> {
    let wide = os_str_to_wide(OsStr::new(name));
    let module = unsafe { GetModuleHandleW(wide.as_ptr()) };
    if module == 0 {
        None
    } else {
        Some(module)
    }
}

/// Closes the wrapped handle on drop.
pub struct HandleGuard(HANDLE);

impl HandleGuard {
    fn new(handle: HANDLE) -> Option<Self> {
        if handle == 0 || handle == INVALID_HANDLE_VALUE {
            None
        } else {
            Some(Self(handle))
        }
    }

    pub fn raw(&self) -> HANDLE {
        self.0
    }
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        unsafe {
            CloseHandle(self.0);
        }
    }
}

pub fn os_str_to_wide(value: &OsStr) -> Vec<u16> {
    value.encode_wide().chain(std::iter::once(0)).collect()
}

fn wide_until_nul(name: &[u16]) -> &[u16] {
    let nul = name.iter().position(|c| *c == 0).unwrap_or(name.len());
    &name[..nul]
}

fn last_error() -> io::Error {
    io::Error::from_raw_os_error(unsafe { GetLastError() } as i32)
}

/// Attribute-only open that shares everything and accepts directories.
pub fn open_for_attributes(path: &Path) -> io::Result<HandleGuard> {
    let wide = os_str_to_wide(path.as_os_str());
    let handle = unsafe {
        CreateFileW(
            wide.as_ptr(),
            FILE_READ_ATTRIBUTES,
            FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE,
            std::ptr::null_mut(),
            OPEN_EXISTING,
            FILE_ATTRIBUTE_NORMAL | FILE_FLAG_BACKUP_SEMANTICS,
            0,
        )
    };
    HandleGuard::new(handle).ok_or_else(last_error)
}

pub fn query_file_process_ids(
    entry_points: &NativeEntryPoints,
    file: &HandleGuard,
    buffer: &mut QueryBuffer,
) -> QueryStatus {
    let mut io_status = IoStatusBlock {
        status: 0,
        information: 0,
    };
    let length = buffer.len_bytes().min(u32::MAX as usize) as u32;
    let status = unsafe {
        (entry_points.nt_query_information_file)(
            file.raw(),
            &mut io_status,
            buffer.as_mut_ptr() as *mut c_void,
            length,
            FILE_PROCESS_IDS_USING_FILE_INFORMATION,
        )
    };
    QueryStatus::from_raw(status)
}

pub fn open_process_for_query(pid: u64) -> Option<HandleGuard> {
    let pid = u32::try_from(pid).ok()?;
    let handle = unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid) };
    let guard = HandleGuard::new(handle);
    if guard.is_none() {
        log::debug!("OpenProcess failed for pid {pid} (error {})", unsafe { GetLastError() });
    }
    guard
}

/// Image path of `process` using a fixed buffer of `capacity` characters.
/// Names that do not fit are dropped rather than retried.
pub fn process_image_name(
    entry_points: &NativeEntryPoints,
    process: &HandleGuard,
    capacity: usize,
) -> Option<String> {
    let mut name = vec![0u16; capacity.max(1)];
    let mut size = name.len().min(u32::MAX as usize) as u32;
    let ok = unsafe {
        (entry_points.query_full_process_image_name)(process.raw(), 0, name.as_mut_ptr(), &mut size)
    };
    if ok == 0 {
        log::debug!("QueryFullProcessImageNameW failed with error {}", unsafe { GetLastError() });
        return None;
    }
    name.truncate(size as usize);
    Some(OsString::from_wide(&name).to_string_lossy().into_owned())
}

pub fn list_directory(dir: &Path) -> io::Result<Vec<DirEntryInfo>> {
    let pattern = dir.join("*");
    let pattern_wide = os_str_to_wide(pattern.as_os_str());

    let mut find_data: WIN32_FIND_DATAW = unsafe { std::mem::zeroed() };
    let handle = unsafe { FindFirstFileW(pattern_wide.as_ptr(), &mut find_data) };
    if handle == INVALID_HANDLE_VALUE {
        return Err(last_error());
    }

    let mut entries = Vec::new();
    let mut keep_going = true;
    while keep_going {
        let name = wide_until_nul(&find_data.cFileName);
        let attrs = find_data.dwFileAttributes;
        entries.push(DirEntryInfo {
            name: OsString::from_wide(name),
            is_dir: attrs & FILE_ATTRIBUTE_DIRECTORY != 0
                && attrs & FILE_ATTRIBUTE_REPARSE_POINT == 0,
        });
        keep_going = unsafe { FindNextFileW(handle, &mut find_data) } != 0;
    }

    unsafe {
        FindClose(handle);
    }
    Ok(entries)
}

/// Lets administrators open objects their ACLs would otherwise hide.
/// Failure leaves the token unchanged and is not an error.
pub fn enable_backup_privilege() -> bool {
    let mut token: HANDLE = 0;
    let ok = unsafe { OpenProcessToken(GetCurrentProcess(), TOKEN_ADJUST_PRIVILEGES, &mut token) };
    if ok == 0 {
        log::debug!("OpenProcessToken failed with error {}", unsafe { GetLastError() });
        return false;
    }
    let Some(token) = HandleGuard::new(token) else {
        return false;
    };

    let privilege = os_str_to_wide(OsStr::new("SeBackupPrivilege"));
    let mut luid = LUID {
        LowPart: 0,
        HighPart: 0,
    };
    if unsafe { LookupPrivilegeValueW(std::ptr::null(), privilege.as_ptr(), &mut luid) } == 0 {
        log::debug!("LookupPrivilegeValueW failed with error {}", unsafe { GetLastError() });
        return false;
    }

    let privileges = TOKEN_PRIVILEGES {
        PrivilegeCount: 1,
        Privileges: [LUID_AND_ATTRIBUTES {
            Luid: luid,
            Attributes: SE_PRIVILEGE_ENABLED,
        }],
    };
    let ok = unsafe {
        AdjustTokenPrivileges(
            token.raw(),
            0,
            &privileges,
            std::mem::size_of::<TOKEN_PRIVILEGES>() as u32,
            std::ptr::null_mut(),
            std::ptr::null_mut(),
        )
    };
    let error = unsafe { GetLastError() };
    if ok == 0 || error == ERROR_NOT_ALL_ASSIGNED {
        log::debug!("backup privilege not enabled (error {error})");
        return false;
    }
    true
}
