//! The run-scoped query buffer and the decoded view over its contents.
//!
//! The kernel writes a 32-bit count followed by an array of pointer-width
//! process IDs. The array starts at the first pointer-aligned offset, so the
//! header occupies one word. Backends that compute the list in user space
//! write the same layout through [`QueryBuffer::write_ids`].

use std::mem::size_of;

use crate::common::errors::{FileUserError, Result};
use crate::common::types::QueryStatus;

const WORD: usize = size_of::<usize>();
const HEADER_BYTES: usize = WORD;

pub struct QueryBuffer {
    words: Vec<usize>,
}

impl QueryBuffer {
    /// Allocates the buffer. Capacity is rounded down to whole words and is
    /// never changed afterwards.
    pub fn with_capacity(bytes: usize) -> Result<Self> {
        if bytes < HEADER_BYTES {
            return Err(FileUserError::BufferTooSmall {
                capacity: bytes,
                header: HEADER_BYTES,
            });
        }
        let len = bytes / WORD;
        let mut words = Vec::new();
        words
            .try_reserve_exact(len)
            .map_err(|_| FileUserError::BufferAllocation(bytes))?;
        words.resize(len, 0);
        Ok(Self { words })
    }

    pub fn len_bytes(&self) -> usize {
        self.words.len() * WORD
    }

    /// Number of process IDs that fit after the header.
    pub fn id_capacity(&self) -> usize {
        (self.len_bytes() - HEADER_BYTES) / WORD
    }

    pub fn as_bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.words.as_ptr() as *const u8, self.len_bytes()) }
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        let len = self.len_bytes();
        unsafe { std::slice::from_raw_parts_mut(self.words.as_mut_ptr() as *mut u8, len) }
    }

    /// Pointer handed to the kernel; pointer-aligned for the ID array.
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.words.as_mut_ptr() as *mut u8
    }

    pub fn write_ids(&mut self, ids: &[u64]) -> QueryStatus {
        if ids.len() > self.id_capacity() || ids.len() > u32::MAX as usize {
            return QueryStatus::INFO_LENGTH_MISMATCH;
        }
        let bytes = self.as_bytes_mut();
        bytes[..4].copy_from_slice(&(ids.len() as u32).to_ne_bytes());
        for (index, id) in ids.iter().enumerate() {
            let start = HEADER_BYTES + index * WORD;
            bytes[start..start + WORD].copy_from_slice(&(*id as usize).to_ne_bytes());
        }
        QueryStatus::SUCCESS
    }

    pub fn process_ids(&self) -> std::result::Result<ProcessIdList<'_>, QueryStatus> {
        ProcessIdList::decode(self.as_bytes())
    }
}

/// Bounds-checked view of a count-prefixed process ID array.
#[derive(Clone, Copy, Debug)]
pub struct ProcessIdList<'a> {
    count: usize,
    entries: &'a [u8],
}

impl<'a> ProcessIdList<'a> {
    pub fn decode(bytes: &'a [u8]) -> std::result::Result<Self, QueryStatus> {
        if bytes.len() < HEADER_BYTES {
            return Err(QueryStatus::INFO_LENGTH_MISMATCH);
        }
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&bytes[..4]);
        let count = u32::from_ne_bytes(raw) as usize;
        let needed = count
            .checked_mul(WORD)
            .ok_or(QueryStatus::INFO_LENGTH_MISMATCH)?;
        let entries = bytes[HEADER_BYTES..]
            .get(..needed)
            .ok_or(QueryStatus::INFO_LENGTH_MISMATCH)?;
        Ok(Self { count, entries })
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn get(&self, index: usize) -> Option<u64> {
        if index >= self.count {
            return None;
        }
        let mut raw = [0u8; WORD];
        raw.copy_from_slice(&self.entries[index * WORD..(index + 1) * WORD]);
        Some(usize::from_ne_bytes(raw) as u64)
    }

    /// IDs in the order the kernel returned them.
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        (0..self.count).filter_map(move |index| self.get(index))
    }
}
