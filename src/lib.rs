mod common;
pub mod config;
pub mod enumerate;
pub mod logging;
pub mod owners;
pub mod session;

#[cfg(target_os = "windows")]
mod windows_native;
#[cfg(target_os = "windows")]
pub use windows_native::{list_directory, PlatformOwnerQuery, CASE_INSENSITIVE_NAMES};

#[cfg(target_os = "linux")]
pub mod linux_native;
#[cfg(target_os = "linux")]
pub use linux_native::{list_directory, PlatformOwnerQuery, CASE_INSENSITIVE_NAMES};

#[cfg(not(any(target_os = "windows", target_os = "linux")))]
compile_error!("fileuser only supports Windows and Linux targets.");

pub use crate::common::buffer::{ProcessIdList, QueryBuffer};
pub use crate::common::errors::{FileUserError, Result};
pub use crate::common::types::*;
