//! Blocks: runs of capacity units on the disk map
//!
//! A block is either a file run carrying a stable file ID or a free run.

use serde::{Deserialize, Serialize};

/// File identifier, assigned in input order starting from 0
pub type FileId = u64;

/// A contiguous run of same-occupancy units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Owning file, `None` for free space
    pub id: Option<FileId>,
    /// Number of units in the run
    pub size: u64,
}

impl Block {
    pub fn file(id: FileId, size: u64) -> Self {
        Block { id: Some(id), size }
    }

    pub fn free(size: u64) -> Self {
        Block { id: None, size }
    }

    /// Check if this block holds file data
    pub fn is_occupied(&self) -> bool {
        self.id.is_some()
    }

    pub fn is_free(&self) -> bool {
        self.id.is_none()
    }

    /// Check if this block belongs to the given file
    pub fn holds(&self, id: FileId) -> bool {
        self.id == Some(id)
    }

    /// Glyph used when expanding the block unit by unit
    ///
    /// File units show the low hex digit of their ID, free units show `.`.
    pub fn glyph(&self) -> char {
        match self.id {
            Some(id) => char::from_digit((id % 16) as u32, 16).unwrap_or('?'),
            None => '.',
        }
    }
}

/// A contiguous range of units on the expanded disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extent {
    /// First unit position
    pub start: u64,
    /// Number of contiguous units
    pub length: u64,
}

impl Extent {
    pub fn new(start: u64, length: u64) -> Self {
        Extent { start, length }
    }

    /// One past the last unit position
    pub fn end(&self) -> u64 {
        self.start + self.length
    }

    /// Check if this extent touches another with no gap between them
    pub fn is_adjacent(&self, other: &Extent) -> bool {
        self.end() == other.start || other.end() == self.start
    }
}
